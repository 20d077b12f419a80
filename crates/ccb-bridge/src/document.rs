//! Sandbox document construction
//!
//! The document wraps the chart's stylesheet, its escaped script text and a
//! relay shim. The shim evaluates the chart module, forwards `render`,
//! `resize` and `buildQuery` messages from the parent window to the module's
//! exported functions, and posts `moduleLoaded`, `queryLoaded` (echoing
//! `requestId`) and `moduleError` back.

use crate::escape::escape_script;

const HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
html, body { margin: 0; padding: 0; width: 100%; height: 100%; overflow: hidden; }
#chart-root { width: 100%; height: 100%; }
</style>
<style>
"#;

const BODY: &str = r#"
</style>
</head>
<body>
<div id="chart-root"></div>
<script>
(function () {
  var root = document.getElementById('chart-root');
  var post = function (message) { window.parent.postMessage(message, '*'); };
  var fail = function (error) {
    post({ type: 'moduleError', error: String((error && error.message) || error) });
  };
  var chartSource = `"#;

const SHIM: &str = r#"`;
  var chart;
  try {
    var module = { exports: {} };
    new Function('module', 'exports', chartSource)(module, module.exports);
    chart = module.exports;
  } catch (error) {
    fail(error);
    return;
  }
  window.addEventListener('message', function (event) {
    if (event.source !== window.parent) {
      return;
    }
    var message = event.data || {};
    try {
      switch (message.type) {
        case 'render':
          if (typeof chart.render === 'function') {
            chart.render(Object.assign({ container: root }, message.data));
          }
          break;
        case 'resize':
          if (typeof chart.resize === 'function') {
            chart.resize(Object.assign({ container: root }, message.data));
          }
          break;
        case 'buildQuery':
          var query = typeof chart.buildQuery === 'function'
            ? chart.buildQuery({ slots: message.slots, slotConfigurations: message.slotConfigurations })
            : null;
          post({ type: 'queryLoaded', query: query || null, requestId: message.requestId });
          break;
      }
    } catch (error) {
      fail(error);
    }
  });
  post({ type: 'moduleLoaded' });
})();
</script>
</body>
</html>
"#;

/// HTML document for one sandbox instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxDocument {
    html: String,
}

impl SandboxDocument {
    /// Build the document from raw script and stylesheet text
    ///
    /// The script is escaped here; callers pass it exactly as fetched.
    #[must_use]
    pub fn new(script: &str, style: &str) -> Self {
        let script = escape_script(script);
        // end tags match case-insensitively, so no `</` survives in the style text
        let style = style.replace("</", "<\\/");

        let mut html =
            String::with_capacity(HEAD.len() + style.len() + BODY.len() + script.len() + SHIM.len());
        html.push_str(HEAD);
        html.push_str(&style);
        html.push_str(BODY);
        html.push_str(&script);
        html.push_str(SHIM);

        Self { html }
    }

    /// Document text
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Consume into the document text
    #[must_use]
    pub fn into_html(self) -> String {
        self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_escaped_script_and_style() {
        let document = SandboxDocument::new(
            "module.exports.render = () => `${1}`;",
            ".bar { fill: red; }",
        );
        let html = document.html();

        assert!(html.contains(".bar { fill: red; }"));
        assert!(html.contains(r"module.exports.render = () => \`\${1}\`;"));
        assert!(html.contains("type: 'moduleLoaded'"));
    }

    #[test]
    fn hostile_script_cannot_close_the_tag() {
        let document = SandboxDocument::new("</script><script>alert(1)</script>", "</style><b>");
        let html = document.html();

        assert_eq!(html.matches("</script>").count(), 1);
        assert_eq!(html.matches("</style>").count(), 2);
    }

    #[test]
    fn style_end_tag_in_any_case_stays_inside_style() {
        let baseline = SandboxDocument::new("", "").into_html().to_lowercase();
        let expected = baseline.matches("</style").count();

        for style in ["</STYLE><script>alert(1)</script>", "</sTyLe><b>", "a::after { content: '</' }"] {
            let html = SandboxDocument::new("", style).into_html();
            assert_eq!(html.to_lowercase().matches("</style").count(), expected, "{style}");
            assert_eq!(html.to_lowercase().matches("</script").count(), baseline.matches("</script").count());
            assert!(!html.contains(style));
        }
    }

    #[test]
    fn shim_echoes_request_id() {
        let html = SandboxDocument::new("", "").into_html();
        assert!(html.contains("requestId: message.requestId"));
        assert!(html.contains("event.source !== window.parent"));
    }
}

//! Script text escaping for embedding in a document
//!
//! Chart code is embedded verbatim inside a backtick-delimited script
//! literal of the sandbox document. The escaped text evaluates back to the
//! original string in that literal and in single- or double-quoted ones.
//! Backslash is escaped first so later steps are never double-escaped;
//! `</` is broken up so the text cannot close the enclosing `<script>`.

/// Escape script text for a JavaScript string literal inside HTML
#[must_use]
pub fn escape_script(script: &str) -> String {
    let mut out = String::with_capacity(script.len() + script.len() / 8);
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '<' if chars.peek() == Some(&'/') => {
                chars.next();
                out.push_str("<\\/");
            }
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Evaluate the escapes a JavaScript literal would resolve
    fn unescape(escaped: &str) -> String {
        let mut out = String::with_capacity(escaped.len());
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn escapes_each_special_character() {
        assert_eq!(escape_script(r"a\b"), r"a\\b");
        assert_eq!(escape_script("`${x}`"), r"\`\${x}\`");
        assert_eq!(escape_script(r#"'single' "double""#), r#"\'single\' \"double\""#);
    }

    #[test]
    fn backslash_is_not_double_escaped() {
        assert_eq!(escape_script(r"\`"), r"\\\`");
        assert_eq!(escape_script(r"\$"), r"\\\$");
    }

    #[test]
    fn closing_script_tag_is_broken_up() {
        let escaped = escape_script("document.write('</script>')");
        assert!(!escaped.contains("</script"));
        assert_eq!(unescape(&escaped), "document.write('</script>')");
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(escape_script("const a = 1 < 2;"), "const a = 1 < 2;");
    }

    proptest! {
        #[test]
        fn prop_round_trip(script in "\\PC*") {
            prop_assert_eq!(unescape(&escape_script(&script)), script);
        }

        #[test]
        fn prop_no_unescaped_delimiters(script in "[`$'\"\\\\</a-z]{0,40}") {
            let escaped = escape_script(&script);
            prop_assert!(!escaped.contains("</"));

            let mut preceding_backslashes = 0usize;
            for c in escaped.chars() {
                if matches!(c, '`' | '$' | '\'' | '"') {
                    prop_assert_eq!(preceding_backslashes % 2, 1);
                }
                preceding_backslashes = if c == '\\' { preceding_backslashes + 1 } else { 0 };
            }
        }
    }
}

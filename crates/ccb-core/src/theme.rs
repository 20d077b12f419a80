//! Chart themes and appearance mode
//!
//! The catalog holds the built-in themes passed to the chart as
//! `options.theme`. The appearance mode picks between the light and dark
//! defaults; `auto` follows the host system's preference.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Light/dark selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppearanceMode {
    /// Follow the system preference
    #[default]
    Auto,
    /// Always light
    Light,
    /// Always dark
    Dark,
}

impl AppearanceMode {
    /// Name of the theme this mode selects
    #[must_use]
    pub fn effective_theme(self, prefers_dark: bool) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Auto if prefers_dark => "dark",
            Self::Auto => "light",
        }
    }
}

impl fmt::Display for AppearanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Light => f.write_str("light"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for AppearanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown appearance mode: {other}")),
        }
    }
}

/// A named chart theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartTheme {
    /// Catalog key
    pub name: String,
    /// Display label
    pub label: String,
    /// Theme object passed to the chart
    pub theme: Value,
}

/// Ordered set of themes; the first entry is the fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeCatalog {
    themes: Vec<ChartTheme>,
}

impl ThemeCatalog {
    /// Catalog from explicit themes
    ///
    /// Returns `None` for an empty list, which would have no fallback.
    #[must_use]
    pub fn new(themes: Vec<ChartTheme>) -> Option<Self> {
        if themes.is_empty() {
            None
        } else {
            Some(Self { themes })
        }
    }

    /// The built-in `light`, `dark`, `royale` and `urban` themes
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            themes: vec![light(), dark(), royale(), urban()],
        }
    }

    /// All themes in order
    #[must_use]
    pub fn themes(&self) -> &[ChartTheme] {
        &self.themes
    }

    /// Theme by name, or the first theme when unknown
    #[must_use]
    pub fn resolve(&self, name: &str) -> &ChartTheme {
        self.themes
            .iter()
            .find(|t| t.name == name)
            .unwrap_or(&self.themes[0])
    }

    /// Whether a theme with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.themes.iter().any(|t| t.name == name)
    }
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn default_borders() -> Value {
    json!({
        "border-color": "rgba(216,216,216,1)",
        "border-style": "none",
        "border-radius": "12px",
        "border-top-width": "0px",
        "border-left-width": "0px",
        "border-right-width": "0px",
        "border-bottom-width": "0px"
    })
}

fn default_title() -> Value {
    json!({ "align": "left", "bold": false, "italic": false, "underline": false, "border": false })
}

fn default_font() -> Value {
    json!({ "fontFamily": "Lato", "font-style": "normal", "font-weight": 400, "fontSize": 15 })
}

fn light() -> ChartTheme {
    ChartTheme {
        name: "light".to_string(),
        label: "Default (light)".to_string(),
        theme: json!({
            "background": "rgb(245,245,245)",
            "itemsBackground": "rgb(255,255,255)",
            "boxShadow": { "size": "none", "color": "rgb(0, 0, 0)" },
            "title": default_title(),
            "font": default_font(),
            "colors": [
                "rgb(68,52,255)", "rgb(143,133,255)", "rgb(218,214,255)",
                "rgb(191,5,184)", "rgb(217,105,212)", "rgb(242,205,241)",
                "rgb(248,194,12)", "rgb(251,218,109)", "rgb(254,243,206)",
                "rgb(9,203,120)", "rgb(107,224,174)", "rgb(206,245,228)",
                "rgb(122,112,112)", "rgb(175,169,169)", "rgb(228,226,226)"
            ],
            "borders": default_borders(),
            "margins": [16, 16],
            "mainColor": "rgb(68,52,255)",
            "axis": {},
            "legend": { "type": "circle" },
            "tooltip": { "background": "rgb(38,38,38)", "opacity": 1 },
            "itemSpecific": { "rounding": 8, "padding": 4 }
        }),
    }
}

fn dark() -> ChartTheme {
    ChartTheme {
        name: "dark".to_string(),
        label: "Default (dark)".to_string(),
        theme: json!({
            "background": "rgb(61,61,61)",
            "itemsBackground": "rgb(38,38,38)",
            "boxShadow": { "size": "none", "color": "rgb(0, 0, 0)" },
            "title": default_title(),
            "font": default_font(),
            "colors": [
                "rgb(123,144,255)", "rgb(48,36,179)", "rgb(199,194,255)",
                "rgb(134,4,129)", "rgb(204,55,198)", "rgb(236,180,234)",
                "rgb(220,141,0)", "rgb(249,206,61)", "rgb(253,237,182)",
                "rgb(6,142,84)", "rgb(58,213,147)", "rgb(181,239,215)",
                "rgb(85,78,78)", "rgb(149,141,141)", "rgb(215,212,212)"
            ],
            "borders": default_borders(),
            "margins": [16, 16],
            "mainColor": "rgb(123,144,255)",
            "axis": {},
            "legend": { "type": "circle" },
            "tooltip": { "background": "rgb(248,248,248)", "opacity": 1 },
            "itemSpecific": { "rounding": 8, "padding": 4 }
        }),
    }
}

fn royale() -> ChartTheme {
    ChartTheme {
        name: "royale".to_string(),
        label: "Royale".to_string(),
        theme: json!({
            "background": "#0A2747",
            "itemsBackground": "#111e2f",
            "boxShadow": { "size": "S", "color": "rgb(0,0,0)" },
            "title": { "align": "center", "bold": false, "italic": false, "underline": false, "border": true },
            "borders": { "border-radius": "3px" },
            "margins": [10, 10],
            "mainColor": "#f4a92c",
            "axis": {},
            "legend": { "type": "circle" },
            "tooltip": { "background": "rgb(248,248,248)", "opacity": 1 },
            "colors": ["#feeaa1", "#e6cc85", "#ceaf6a", "#b79350", "#9f7738", "#885d20", "#704308"],
            "font": { "fontFamily": "Exo", "fontSize": 13 }
        }),
    }
}

fn urban() -> ChartTheme {
    ChartTheme {
        name: "urban".to_string(),
        label: "Urban".to_string(),
        theme: json!({
            "background": "#42403c",
            "itemsBackground": "#e4dbcd",
            "boxShadow": { "size": "none", "color": "rgb(0,0,0)" },
            "title": { "align": "center", "bold": false, "italic": false, "underline": false, "border": true },
            "borders": {},
            "margins": [5, 5],
            "mainColor": "#33b59e",
            "axis": {},
            "legend": { "type": "circle" },
            "tooltip": { "background": "rgb(248,248,248)", "opacity": 1 },
            "colors": [
                "#33b59e", "#453d30", "#ffffff", "#237869", "#165e4e",
                "#b89f76", "#7a6138", "#543c13", "#8a9c98", "#44524f"
            ],
            "font": { "fontFamily": "Open Sans", "fontSize": 13 }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appearance_resolution() {
        assert_eq!(AppearanceMode::Dark.effective_theme(false), "dark");
        assert_eq!(AppearanceMode::Light.effective_theme(true), "light");
        assert_eq!(AppearanceMode::Auto.effective_theme(true), "dark");
        assert_eq!(AppearanceMode::Auto.effective_theme(false), "light");
    }

    #[test]
    fn unknown_theme_falls_back_to_first() {
        let catalog = ThemeCatalog::builtin();
        assert_eq!(catalog.resolve("neon").name, "light");
        assert_eq!(catalog.resolve("urban").theme["mainColor"], "#33b59e");
        assert_eq!(catalog.themes().len(), 4);
    }

    #[test]
    fn empty_catalog_is_refused() {
        assert!(ThemeCatalog::new(Vec::new()).is_none());
    }

    #[test]
    fn appearance_parses() {
        assert_eq!("dark".parse::<AppearanceMode>(), Ok(AppearanceMode::Dark));
        assert!("sepia".parse::<AppearanceMode>().is_err());
    }
}

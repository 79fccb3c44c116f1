/// Configuration schema and defaults for dwellscope.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[data_api]`, `[timeline]`, `[detection]`, `[highlight]`, `[charts]`,
/// `[web]`, and `[logging]`.
///
/// Every field has a sensible built-in default. Users only need to set the
/// values they want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level dwellscope configuration.
///
/// Maps directly to the `~/.dwellscope/config.toml` and `.dwellscope.toml`
/// file schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellConfig {
    pub data_api: DataApiConfig,
    pub timeline: TimelineConfig,
    pub detection: DetectionConfig,
    pub highlight: HighlightConfig,
    pub charts: ChartsConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [data_api]
// ---------------------------------------------------------------------------

/// Where session and element data is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataApiConfig {
    /// Base URL of the data server.
    pub url: String,
    /// Per-request timeout (milliseconds).
    pub timeout_ms: u64,
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [timeline]
// ---------------------------------------------------------------------------

/// Fixed layout constants for the timeline canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Padding around the plot area (pixels).
    pub pad: f64,
    /// Height of one `domID` row (pixels).
    pub row_height: f64,
    /// Horizontal pixels per elapsed second.
    pub px_per_second: f64,
    /// Minimum canvas width (pixels).
    pub min_width: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            pad: 60.0,
            row_height: 30.0,
            px_per_second: 60.0,
            min_width: 900.0,
        }
    }
}

// ---------------------------------------------------------------------------
// [detection]
// ---------------------------------------------------------------------------

/// Rules that mark an element as an ad / special-interest element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Substrings that flag an element when found in its text.
    pub markers: Vec<String>,
    /// Exact class names that flag an element. `sample-popup-ad` is always
    /// included, whatever this list says.
    pub ad_classes: Vec<String>,
    /// Regular expressions matched against the element text.
    pub patterns: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            markers: vec!["광고".to_string(), "[AD]".to_string()],
            ad_classes: vec!["sample-popup-ad".to_string()],
            patterns: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// [highlight]
// ---------------------------------------------------------------------------

/// How the reference image is laid out in its container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Image stretched to its rendered box; absolute page coordinates.
    #[default]
    Stretch,
    /// Aspect-preserving fit centered in the container.
    Contain,
}

impl std::fmt::Display for FitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stretch => write!(f, "stretch"),
            Self::Contain => write!(f, "contain"),
        }
    }
}

/// Overlay highlight settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// How long a highlight stays visible (milliseconds).
    pub ttl_ms: u64,
    /// Default coordinate frame for the reference image.
    pub fit: FitMode,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 3000,
            fit: FitMode::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// [charts]
// ---------------------------------------------------------------------------

/// Bar coloring strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartMode {
    /// One palette color per `domID`, cycling by index.
    #[default]
    Palette,
    /// Two colors: flagged vs. everything else.
    Flagging,
}

impl std::fmt::Display for ChartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Palette => write!(f, "palette"),
            Self::Flagging => write!(f, "flagging"),
        }
    }
}

/// Chart colors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub mode: ChartMode,
    /// Cycled per `domID` in palette mode and for selected pie slices.
    pub palette: Vec<String>,
    pub flagged_color: String,
    pub default_color: String,
    /// Pie slice color for `domID`s that are not selected.
    pub unselected_color: String,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            mode: ChartMode::default(),
            palette: [
                "#A3E4D7", "#F7DC6F", "#F5B7B1", "#AED6F1", "#D7BDE2", "#F9E79F", "#85C1E9",
                "#F1948A", "#82E0AA", "#D2B4DE",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            flagged_color: "#F1948A".to_string(),
            default_color: "#AED6F1".to_string(),
            unselected_color: "#eee".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Embedded dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address.
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9750".to_string(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether activity events are recorded.
    pub enabled: bool,
    /// Path to the JSONL activity log. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.dwellscope/activity.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML
// ---------------------------------------------------------------------------

impl DwellConfig {
    /// The annotated default config written by `dwellscope config init`.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG_TOML
    }
}

const DEFAULT_CONFIG_TOML: &str = r##"# dwellscope configuration
#
# Layers (later wins): built-in defaults, this file, ./.dwellscope.toml,
# then DWELLSCOPE_* environment variables.

[data_api]
# Base URL of the data server (sessions, elements, heatmaps).
url = "http://127.0.0.1:5000"
timeout_ms = 10000

[timeline]
pad = 60.0
row_height = 30.0
px_per_second = 60.0
min_width = 900.0

[detection]
# Text substrings that flag an element as an ad.
markers = ["광고", "[AD]"]
# Class names that flag an element. "sample-popup-ad" is always enforced.
ad_classes = ["sample-popup-ad"]
# Regular expressions matched against element text.
patterns = []

[highlight]
ttl_ms = 3000
# "stretch" (absolute page frame) or "contain" (letterboxed, centered).
fit = "stretch"

[charts]
# "palette" (one color per domID) or "flagging" (flagged vs. default).
mode = "palette"
palette = ["#A3E4D7", "#F7DC6F", "#F5B7B1", "#AED6F1", "#D7BDE2", "#F9E79F", "#85C1E9", "#F1948A", "#82E0AA", "#D2B4DE"]
flagged_color = "#F1948A"
default_color = "#AED6F1"
unselected_color = "#eee"

[web]
addr = "127.0.0.1:9750"
open_browser = true

[logging]
enabled = true
path = "~/.dwellscope/activity.jsonl"
"##;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_to_defaults() {
        let parsed: DwellConfig = toml::from_str(DwellConfig::default_toml()).unwrap();
        let defaults = DwellConfig::default();
        assert_eq!(parsed.data_api.url, defaults.data_api.url);
        assert_eq!(parsed.timeline, defaults.timeline);
        assert_eq!(parsed.detection.markers, defaults.detection.markers);
        assert_eq!(parsed.highlight.ttl_ms, 3000);
        assert_eq!(parsed.charts.palette, defaults.charts.palette);
        assert_eq!(parsed.web.addr, defaults.web.addr);
    }

    #[test]
    fn partial_toml_fills_missing_sections() {
        let parsed: DwellConfig = toml::from_str(
            r#"
[highlight]
fit = "contain"
"#,
        )
        .unwrap();
        assert_eq!(parsed.highlight.fit, FitMode::Contain);
        assert_eq!(parsed.highlight.ttl_ms, 3000);
        assert_eq!(parsed.timeline.pad, 60.0);
        assert_eq!(parsed.charts.mode, ChartMode::Palette);
    }

    #[test]
    fn chart_mode_uses_kebab_case() {
        let parsed: DwellConfig = toml::from_str(
            r#"
[charts]
mode = "flagging"
"#,
        )
        .unwrap();
        assert_eq!(parsed.charts.mode, ChartMode::Flagging);
        assert_eq!(parsed.charts.mode.to_string(), "flagging");
    }
}

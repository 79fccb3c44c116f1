//! Ad / special-interest element detection.
//!
//! An element is *flagged* when any configured predicate matches it:
//!
//! - its text contains one of the marker substrings,
//! - its class name equals one of the ad classes,
//! - its text matches one of the regex patterns.
//!
//! `sample-popup-ad` is a built-in ad class that is always enforced, even if
//! the user's `[detection] ad_classes` list drops it. The highlight mapper
//! refuses to highlight elements carrying an ad class.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::schema::DetectionConfig;
use crate::model::InteractionElement;

/// Class names that always count as ads.
const BUILTIN_AD_CLASSES: &[&str] = &["sample-popup-ad"];

/// Which predicate flagged an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagReason {
    AdClass(String),
    Marker(String),
    Pattern(String),
}

impl std::fmt::Display for FlagReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdClass(c) => write!(f, "class {c}"),
            Self::Marker(m) => write!(f, "marker {m:?}"),
            Self::Pattern(p) => write!(f, "pattern /{p}/"),
        }
    }
}

/// Compiled set of flagging predicates.
#[derive(Debug, Clone)]
pub struct FlagDetector {
    markers: Vec<String>,
    ad_classes: Vec<String>,
    patterns: Vec<Regex>,
}

impl Default for FlagDetector {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FlagDetector {
    /// Only the built-in ad classes; no markers, no patterns.
    pub fn builtin() -> Self {
        Self {
            markers: Vec::new(),
            ad_classes: BUILTIN_AD_CLASSES.iter().map(|c| c.to_string()).collect(),
            patterns: Vec::new(),
        }
    }

    /// Build a detector from `[detection]`. Fails on an invalid regex.
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        let mut detector = Self::builtin();

        detector.markers = config
            .markers
            .iter()
            .filter(|m| !m.is_empty())
            .cloned()
            .collect();

        for class in &config.ad_classes {
            let class = class.trim();
            if !class.is_empty() && !detector.ad_classes.iter().any(|c| c == class) {
                detector.ad_classes.push(class.to_string());
            }
        }

        for pattern in &config.patterns {
            let re = Regex::new(pattern)
                .with_context(|| format!("invalid detection pattern: {pattern}"))?;
            detector.patterns.push(re);
        }

        Ok(detector)
    }

    /// Whether the element's class name is one of the ad classes.
    pub fn is_ad_class(&self, element: &InteractionElement) -> bool {
        let class = element.class_name.trim();
        !class.is_empty() && self.ad_classes.iter().any(|c| c == class)
    }

    /// Whether any predicate matches the element.
    pub fn is_flagged(&self, element: &InteractionElement) -> bool {
        self.reason(element).is_some()
    }

    /// The first matching predicate, checked in order: ad class, marker,
    /// pattern.
    pub fn reason(&self, element: &InteractionElement) -> Option<FlagReason> {
        if self.is_ad_class(element) {
            return Some(FlagReason::AdClass(element.class_name.trim().to_string()));
        }

        if let Some(marker) = self.markers.iter().find(|m| element.text.contains(m.as_str())) {
            return Some(FlagReason::Marker(marker.clone()));
        }

        self.patterns
            .iter()
            .find(|re| re.is_match(&element.text))
            .map(|re| FlagReason::Pattern(re.as_str().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

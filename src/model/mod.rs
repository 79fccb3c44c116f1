//! Interaction records as delivered by the data API.
//!
//! Records arrive as loosely-typed JSON: numbers are sometimes strings,
//! fields go missing, and `domID` may be empty. Deserialization here is
//! lenient so that no downstream computation ever sees a malformed value:
//! numeric fields coerce to `0.0`, strings to `""`, and [`dom_id`] falls
//! back to `"unknown"`.
//!
//! [`dom_id`]: InteractionElement::dom_id

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Grouping key used when a record has no (or an empty) `domID`.
pub const UNKNOWN_DOM_ID: &str = "unknown";

/// Bounding rectangle in the coordinate space of the captured page screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: f64,
}

/// One observed DOM-element dwell event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionElement {
    /// Epoch time in milliseconds.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub timestamp: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    /// Dwell time in milliseconds. Never negative after deserialization.
    #[serde(default, deserialize_with = "lenient_duration")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub visit_count: f64,
    /// Running total reported by the per-URL stats endpoint only.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_f64"
    )]
    pub total_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tag: String,
    #[serde(rename = "domID", default, deserialize_with = "lenient_string")]
    pub dom_id_raw: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub class_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(
        alias = "blip_caption",
        default,
        deserialize_with = "lenient_string"
    )]
    pub blip_caption: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_rect"
    )]
    pub rect: Option<Rect>,
}

impl InteractionElement {
    /// The grouping key for this record, `"unknown"` when absent or empty.
    /// Whitespace-only IDs are kept as their own key.
    pub fn dom_id(&self) -> &str {
        if self.dom_id_raw.is_empty() {
            UNKNOWN_DOM_ID
        } else {
            &self.dom_id_raw
        }
    }

    /// Dwell time in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration / 1000.0
    }

    /// Short human label: text, then tag, then the grouping key.
    pub fn label(&self) -> &str {
        if !self.text.trim().is_empty() {
            &self.text
        } else if !self.tag.trim().is_empty() {
            &self.tag
        } else {
            self.dom_id()
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

fn value_to_f64(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

fn lenient_duration<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value).max(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        other => Some(value_to_f64(&other)),
    })
}

/// A rect that is not an object (or not decodable) is treated as absent.
fn lenient_rect<'de, D>(deserializer: D) -> Result<Option<Rect>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

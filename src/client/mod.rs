/// Blocking HTTP client for the external data API.
///
/// Uses the synchronous `ureq` client. Covers the collaborator endpoints the
/// dashboard reads from:
///
/// - `GET /sessions/{user_id}`: session IDs recorded for a user
/// - `GET /session_data/{session_id}`: element batch + optional summary
/// - `GET /heatmap/{session_id}`: PNG heatmap (absence is not an error)
/// - `GET /stats/urls`: URLs with recorded elements
/// - `GET /stats/elements?target_url=..`: element batch for one URL
///
/// Response bodies are parsed by standalone functions so the decoding rules
/// can be tested without a server.
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::schema::DataApiConfig;
use crate::model::InteractionElement;

/// Largest heatmap body accepted (bytes).
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Elements for one session plus the server-side summary text, if any.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionData {
    pub session_id: String,
    pub elements: Vec<InteractionElement>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionDataResponse {
    #[serde(default)]
    data: Option<Vec<InteractionElement>>,
    #[serde(default)]
    llm_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ElementsResponse {
    #[serde(default)]
    elements: Option<Vec<InteractionElement>>,
}

#[derive(Debug, Deserialize)]
struct UrlsResponse {
    #[serde(default)]
    urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronous data API client, built from `[data_api]`.
#[derive(Debug, Clone)]
pub struct DataApiClient {
    base_url: String,
    timeout: Duration,
}

impl DataApiClient {
    pub fn from_config(config: &DataApiConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        // "localhost" may resolve to ::1 first while the server binds IPv4 only.
        format!("{}{}", self.base_url, path).replace("://localhost", "://127.0.0.1")
    }

    fn get_text(&self, url: &str) -> Result<String> {
        ureq::get(url)
            .timeout(self.timeout)
            .call()
            .with_context(|| format!("request to {url} failed"))?
            .into_string()
            .with_context(|| format!("failed to read response from {url}"))
    }

    /// Whether the data server answers at all.
    pub fn is_reachable(&self) -> bool {
        let url = self.endpoint("/stats/urls");
        ureq::get(&url)
            .timeout(Duration::from_secs(3))
            .call()
            .is_ok()
    }

    /// Session IDs recorded for `user_id`.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("/sessions/{}", path_segment(user_id)));
        let body = self.get_text(&url)?;
        parse_session_list(&body)
    }

    /// Elements (and summary) for one session.
    pub fn session_data(&self, session_id: &str) -> Result<SessionData> {
        let url = self.endpoint(&format!("/session_data/{}", path_segment(session_id)));
        let body = self.get_text(&url)?;
        parse_session_data(session_id, &body)
    }

    /// Heatmap image bytes; any failure yields `None`.
    pub fn heatmap(&self, session_id: &str) -> Option<Vec<u8>> {
        let url = self.endpoint(&format!("/heatmap/{}", path_segment(session_id)));
        let resp = ureq::get(&url).timeout(self.timeout).call().ok()?;

        let mut bytes = Vec::new();
        resp.into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .ok()?;
        (!bytes.is_empty()).then_some(bytes)
    }

    /// URLs that have recorded elements.
    pub fn stats_urls(&self) -> Result<Vec<String>> {
        let url = self.endpoint("/stats/urls");
        let body = self.get_text(&url)?;
        let parsed: UrlsResponse =
            serde_json::from_str(&body).context("failed to parse URL list response")?;
        Ok(parsed.urls)
    }

    /// Elements recorded on one page URL.
    pub fn elements_by_url(&self, target_url: &str) -> Result<Vec<InteractionElement>> {
        let url = self.endpoint("/stats/elements");
        let body = ureq::get(&url)
            .timeout(self.timeout)
            .query("target_url", target_url)
            .call()
            .with_context(|| format!("request to {url} failed"))?
            .into_string()
            .context("failed to read elements response")?;
        parse_elements_by_url(&body)
    }
}

/// Percent-encode a value for use as a single path segment.
fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parse `{ "sessions": [{ "session_id": .. }, ..] }`.
///
/// Entries may use `session_id`, `sid`, or `id`, as numbers or strings, or
/// be bare values. Entries without a usable ID are skipped.
pub fn parse_session_list(body: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(body).context("failed to parse session list")?;
    let Some(sessions) = value.get("sessions").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    Ok(sessions
        .iter()
        .filter_map(|s| {
            let id = if s.is_object() {
                ["session_id", "sid", "id"]
                    .iter()
                    .find_map(|k| s.get(*k).filter(|v| !v.is_null()))?
            } else {
                s
            };
            match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        })
        .collect())
}

/// Parse `{ "data": [elements], "llm_summary": ".." }`.
///
/// A response without a `data` array is an error.
pub fn parse_session_data(session_id: &str, body: &str) -> Result<SessionData> {
    let parsed: SessionDataResponse =
        serde_json::from_str(body).context("failed to parse session data")?;
    let elements = parsed
        .data
        .with_context(|| format!("response for session {session_id} has no elements"))?;

    Ok(SessionData {
        session_id: session_id.to_string(),
        elements,
        summary: parsed.llm_summary.filter(|s| !s.trim().is_empty()),
    })
}

/// Parse `{ "elements": [..] }`; a missing array means no elements.
pub fn parse_elements_by_url(body: &str) -> Result<Vec<InteractionElement>> {
    let parsed: ElementsResponse =
        serde_json::from_str(body).context("failed to parse elements response")?;
    Ok(parsed.elements.unwrap_or_default())
}

/// Load an element batch from a local JSON file shaped `{ "elements": [..] }`.
pub fn load_elements_file(path: &Path) -> Result<Vec<InteractionElement>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: ElementsResponse = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    parsed.elements.with_context(|| {
        format!(
            "unsupported JSON in {}: no \"elements\" array",
            path.display()
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_strips_trailing_slash() {
        let config = DataApiConfig {
            url: "http://localhost:5000/".to_string(),
            timeout_ms: 100,
        };
        let client = DataApiClient::from_config(&config);
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.endpoint("/stats/urls"), "http://127.0.0.1:5000/stats/urls");
        assert_eq!(client.timeout, Duration::from_millis(100));
    }

    #[test]
    fn path_segment_escapes_reserved_bytes() {
        assert_eq!(path_segment("abc-123"), "abc-123");
        assert_eq!(path_segment("a/b c"), "a%2Fb%20c");
        assert_eq!(path_segment("광고"), "%EA%B4%91%EA%B3%A0");
    }

    #[test]
    fn session_list_accepts_mixed_shapes() {
        let body = r#"{"sessions": [{"session_id": 12}, {"sid": "x7"}, {"id": 3}, "raw", {"other": 1}]}"#;
        assert_eq!(parse_session_list(body).unwrap(), vec!["12", "x7", "3", "raw"]);
    }

    #[test]
    fn session_list_without_array_is_empty() {
        assert!(parse_session_list("{}").unwrap().is_empty());
        assert!(parse_session_list("not json").is_err());
    }

    #[test]
    fn session_data_requires_data_array() {
        let ok = parse_session_data(
            "9",
            r#"{"data": [{"domID": "a", "duration": 100}], "llm_summary": "short visit"}"#,
        )
        .unwrap();
        assert_eq!(ok.elements.len(), 1);
        assert_eq!(ok.summary.as_deref(), Some("short visit"));

        let err = parse_session_data("9", r#"{"llm_summary": ""}"#).unwrap_err();
        assert!(err.to_string().contains("no elements"));
    }

    #[test]
    fn blank_summary_is_none() {
        let data = parse_session_data("1", r#"{"data": [], "llm_summary": "  "}"#).unwrap();
        assert!(data.summary.is_none());
    }

    #[test]
    fn elements_by_url_defaults_to_empty() {
        assert!(parse_elements_by_url("{}").unwrap().is_empty());
        let els = parse_elements_by_url(r#"{"elements": [{"domID": "x"}]}"#).unwrap();
        assert_eq!(els[0].dom_id(), "x");
    }

    #[test]
    fn elements_file_must_have_elements_array() {
        let dir = std::env::temp_dir().join(format!("dwellscope-client-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.json");
        fs::write(&good, r#"{"elements": [{"domID": "a"}, {"domID": "b"}]}"#).unwrap();
        assert_eq!(load_elements_file(&good).unwrap().len(), 2);

        let bad = dir.join("bad.json");
        fs::write(&bad, r#"{"data": []}"#).unwrap();
        assert!(load_elements_file(&bad).is_err());
    }
}

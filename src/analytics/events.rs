//! Activity log: one JSON line per user-visible action.
//!
//! Records data fetches, file loads, highlight requests and dashboard
//! requests to `~/.dwellscope/activity.jsonl` (configurable). Writing is
//! best-effort: failures are silently ignored so logging can never break a
//! view.

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::config::schema::LoggingConfig;

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// A single activity event. One line per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: String,
    /// Event kind, e.g. `"fetch_session"`, `"highlight"`, `"http"`.
    pub kind: String,
    /// What the event is about: a session ID, URL, file path, or route.
    pub subject: String,
    /// Number of records involved, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub count: Option<usize>,
    /// Free-form outcome, e.g. an error message or `"no highlight"`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

impl ActivityEvent {
    pub fn new(kind: &str, subject: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            subject: subject.to_string(),
            count: None,
            detail: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Log handle
// ---------------------------------------------------------------------------

/// Handle to the activity log file. Disabled handles drop every event.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn from_config(logging: &LoggingConfig) -> Self {
        let path = if logging.enabled {
            config::expand_home(&logging.path)
        } else {
            None
        };
        Self { path }
    }

    /// A log writing to an explicit file.
    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Append an event. Best-effort.
    pub fn record(&self, event: &ActivityEvent) {
        let _ = self.append(event);
    }

    fn append(&self, event: &ActivityEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{json}")?;

        Ok(())
    }

    /// Read every event, skipping malformed lines.
    pub fn read_all(&self) -> Vec<ActivityEvent> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str::<ActivityEvent>(&line).ok())
            .collect()
    }

    /// The last `limit` events, oldest first.
    pub fn read_recent(&self, limit: usize) -> Vec<ActivityEvent> {
        let mut events = self.read_all();
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
        events
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

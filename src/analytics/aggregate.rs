//! Duration aggregation: per-`domID` totals, averages, and flags.
//!
//! Every view recomputes its aggregate from scratch from the current element
//! batch; nothing here is incremental or cached.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Timelike};
use serde::Serialize;

use crate::detect::FlagDetector;
use crate::model::InteractionElement;

// ---------------------------------------------------------------------------
// Aggregate types
// ---------------------------------------------------------------------------

/// Derived statistics for one `domID`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomAggregate {
    pub dom_id: String,
    pub total_duration_seconds: f64,
    pub average_duration_ms: f64,
    pub average_visit_count: f64,
    pub occurrence_count: usize,
    /// Whether any element under this `domID` matched the flag detector.
    pub flagged: bool,
}

/// Per-`domID` aggregates in first-seen order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregate {
    pub entries: Vec<DomAggregate>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, dom_id: &str) -> Option<&DomAggregate> {
        self.entries.iter().find(|e| e.dom_id == dom_id)
    }

    /// Sum of every entry's total, in seconds.
    pub fn total_seconds(&self) -> f64 {
        self.entries.iter().map(|e| e.total_duration_seconds).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomAggregate> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Accumulator {
    duration_ms: f64,
    visits: f64,
    count: usize,
    flagged: bool,
}

/// Reduce an element batch to per-`domID` aggregates.
///
/// Absent or empty `domID`s group under `"unknown"`. An empty batch yields an
/// empty aggregate.
pub fn aggregate_durations(elements: &[InteractionElement], detector: &FlagDetector) -> Aggregate {
    let mut order: Vec<&str> = Vec::new();
    let mut acc: HashMap<&str, Accumulator> = HashMap::new();

    for element in elements {
        let id = element.dom_id();
        let slot = acc.entry(id).or_insert_with(|| {
            order.push(id);
            Accumulator::default()
        });
        slot.duration_ms += element.duration;
        slot.visits += element.visit_count;
        slot.count += 1;
        slot.flagged |= detector.is_flagged(element);
    }

    let entries = order
        .into_iter()
        .filter_map(|id| {
            let a = acc.remove(id)?;
            let n = a.count.max(1) as f64;
            Some(DomAggregate {
                dom_id: id.to_string(),
                total_duration_seconds: a.duration_ms / 1000.0,
                average_duration_ms: a.duration_ms / n,
                average_visit_count: a.visits / n,
                occurrence_count: a.count,
                flagged: a.flagged,
            })
        })
        .collect();

    Aggregate { entries }
}

// ---------------------------------------------------------------------------
// Hour-of-day activity
// ---------------------------------------------------------------------------

/// Element counts per hour of day for one `domID`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyActivity {
    pub dom_id: String,
    pub counts: [usize; 24],
}

/// Count elements per local hour of day, grouped by `domID`.
pub fn hourly_activity(elements: &[InteractionElement]) -> Vec<HourlyActivity> {
    hourly_activity_in(elements, &chrono::Local)
}

/// Count elements per hour of day in the given time zone.
///
/// Elements without a usable timestamp (zero, negative, out of range) are
/// skipped. Groups appear in first-seen order.
pub fn hourly_activity_in<Tz: TimeZone>(
    elements: &[InteractionElement],
    tz: &Tz,
) -> Vec<HourlyActivity> {
    let mut out: Vec<HourlyActivity> = Vec::new();

    for element in elements {
        if element.timestamp <= 0.0 {
            continue;
        }
        let Some(utc) = DateTime::from_timestamp_millis(element.timestamp as i64) else {
            continue;
        };
        let hour = utc.with_timezone(tz).hour() as usize;

        let id = element.dom_id();
        match out.iter_mut().find(|h| h.dom_id == id) {
            Some(h) => h.counts[hour] += 1,
            None => {
                let mut counts = [0; 24];
                counts[hour] = 1;
                out.push(HourlyActivity {
                    dom_id: id.to_string(),
                    counts,
                });
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn el(dom_id: &str, duration: f64) -> InteractionElement {
        InteractionElement {
            dom_id_raw: dom_id.to_string(),
            duration,
            ..Default::default()
        }
    }

    #[test]
    fn sums_seconds_per_dom_id() {
        let elements = vec![el("a", 1000.0), el("a", 500.0), el("b", 2000.0)];
        let agg = aggregate_durations(&elements, &FlagDetector::builtin());

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get("a").unwrap().total_duration_seconds, 1.5);
        assert_eq!(agg.get("b").unwrap().total_duration_seconds, 2.0);
        assert_eq!(agg.entries[0].dom_id, "a");
    }

    #[test]
    fn averages_duration_and_visits() {
        let mut first = el("nav", 1000.0);
        first.visit_count = 1.0;
        let mut second = el("nav", 3000.0);
        second.visit_count = 4.0;

        let agg = aggregate_durations(&[first, second], &FlagDetector::builtin());
        let nav = agg.get("nav").unwrap();
        assert_eq!(nav.occurrence_count, 2);
        assert_eq!(nav.average_duration_ms, 2000.0);
        assert_eq!(nav.average_visit_count, 2.5);
    }

    #[test]
    fn empty_input_is_empty_aggregate() {
        let agg = aggregate_durations(&[], &FlagDetector::builtin());
        assert!(agg.is_empty());
        assert_eq!(agg.total_seconds(), 0.0);
    }

    #[test]
    fn missing_dom_id_groups_as_unknown() {
        let agg = aggregate_durations(&[el("", 100.0), el(" ", 200.0)], &FlagDetector::builtin());
        assert_eq!(agg.len(), 1);
        assert!((agg.get("unknown").unwrap().total_duration_seconds - 0.3).abs() < 1e-12);
    }

    #[test]
    fn one_flagged_element_flags_its_group() {
        let mut ad = el("banner", 10.0);
        ad.class_name = "sample-popup-ad".to_string();
        let agg = aggregate_durations(
            &[el("banner", 10.0), ad, el("body", 10.0)],
            &FlagDetector::builtin(),
        );
        assert!(agg.get("banner").unwrap().flagged);
        assert!(!agg.get("body").unwrap().flagged);
    }

    #[test]
    fn hourly_activity_buckets_by_hour() {
        // 2024-01-01T10:15:00Z and 2024-01-01T10:45:00Z and 2024-01-01T13:00:00Z
        let mut a = el("a", 0.0);
        a.timestamp = 1_704_104_100_000.0;
        let mut b = el("a", 0.0);
        b.timestamp = 1_704_105_900_000.0;
        let mut c = el("b", 0.0);
        c.timestamp = 1_704_114_000_000.0;
        let skipped = el("c", 0.0);

        let hours = hourly_activity_in(&[a, b, c, skipped], &Utc);
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].dom_id, "a");
        assert_eq!(hours[0].counts[10], 2);
        assert_eq!(hours[1].counts[13], 1);
        assert_eq!(hours[1].counts.iter().sum::<usize>(), 1);
    }
}

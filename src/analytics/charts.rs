//! Chart series: bar and pie data built from an [`Aggregate`].
//!
//! Colors are resolved here so every renderer (SVG, web dashboard, CLI)
//! shows the same thing.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::analytics::aggregate::Aggregate;
use crate::config::schema::{ChartMode, ChartsConfig};

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// `domID`s the user toggled on. Only changes pie slice colors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one `domID`; returns whether it is now selected.
    pub fn toggle(&mut self, dom_id: &str) -> bool {
        if self.ids.remove(dom_id) {
            false
        } else {
            self.ids.insert(dom_id.to_string());
            true
        }
    }

    pub fn contains(&self, dom_id: &str) -> bool {
        self.ids.contains(dom_id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Series types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarEntry {
    pub dom_id: String,
    pub seconds: f64,
    pub flagged: bool,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub dom_id: String,
    /// Share of the grand total, in percent.
    pub share_pct: f64,
    pub selected: bool,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    /// Sorted by descending total duration.
    pub bars: Vec<BarEntry>,
    /// In aggregate (first-seen) order.
    pub pie: Vec<PieSlice>,
}

/// Average duration / visit count per `domID` for the per-URL stats view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageBar {
    pub dom_id: String,
    pub average_duration_ms: f64,
    pub average_visit_count: f64,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn palette_color(charts: &ChartsConfig, index: usize) -> String {
    if charts.palette.is_empty() {
        charts.default_color.clone()
    } else {
        charts.palette[index % charts.palette.len()].clone()
    }
}

/// Build bar and pie series.
///
/// A grand total of zero yields all-zero pie shares.
pub fn build_chart_series(
    aggregate: &Aggregate,
    selection: &Selection,
    charts: &ChartsConfig,
) -> ChartSeries {
    let grand_total = aggregate.total_seconds();

    let mut bars: Vec<BarEntry> = aggregate
        .iter()
        .enumerate()
        .map(|(i, entry)| BarEntry {
            dom_id: entry.dom_id.clone(),
            seconds: entry.total_duration_seconds,
            flagged: entry.flagged,
            color: match charts.mode {
                ChartMode::Palette => palette_color(charts, i),
                ChartMode::Flagging if entry.flagged => charts.flagged_color.clone(),
                ChartMode::Flagging => charts.default_color.clone(),
            },
        })
        .collect();
    bars.sort_by(|a, b| b.seconds.total_cmp(&a.seconds));

    let pie = aggregate
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = selection.contains(&entry.dom_id);
            PieSlice {
                dom_id: entry.dom_id.clone(),
                share_pct: if grand_total > 0.0 {
                    entry.total_duration_seconds / grand_total * 100.0
                } else {
                    0.0
                },
                selected,
                color: if selected {
                    palette_color(charts, i)
                } else {
                    charts.unselected_color.clone()
                },
            }
        })
        .collect();

    ChartSeries { bars, pie }
}

/// Per-`domID` averages in aggregate order.
pub fn build_average_series(aggregate: &Aggregate) -> Vec<AverageBar> {
    aggregate
        .iter()
        .map(|entry| AverageBar {
            dom_id: entry.dom_id.clone(),
            average_duration_ms: entry.average_duration_ms,
            average_visit_count: entry.average_visit_count,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

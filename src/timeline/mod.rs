//! Timeline layout: turns an element batch into canvas geometry.
//!
//! The time axis is *concatenated dwell time*, not wall-clock time: elements
//! are laid end to end in input order with a running cursor, and the
//! `timestamp` field is ignored. Each distinct `domID` gets its own row in
//! first-seen order.
//!
//! The engine only computes geometry. Rendering to SVG lives in
//! [`crate::render`].

pub mod ticks;

use serde::Serialize;

use crate::config::schema::TimelineConfig;
use crate::model::InteractionElement;

pub use ticks::plan_axis_step;

/// Gridline loop tolerance for floating-point totals.
const TICK_EPSILON: f64 = 1e-6;

/// Extra canvas height below the last row (pixels).
const BOTTOM_MARGIN: f64 = 30.0;

// ---------------------------------------------------------------------------
// Geometry types
// ---------------------------------------------------------------------------

/// One `domID` row with the baseline of its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    pub index: usize,
    pub dom_id: String,
    pub label_x: f64,
    pub label_y: f64,
}

/// One element's bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSegment {
    pub row: usize,
    pub dom_id: String,
    /// Hover text: element text, else tag, else `domID`.
    pub label: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TimelineSegment {
    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// One vertical gridline with its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTick {
    pub seconds: f64,
    pub x: f64,
    pub y1: f64,
    pub y2: f64,
    pub label: String,
}

/// Complete timeline geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineLayout {
    pub rows: Vec<TimelineRow>,
    pub segments: Vec<TimelineSegment>,
    pub ticks: Vec<AxisTick>,
    pub total_seconds: f64,
    pub step_seconds: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl TimelineLayout {
    /// `true` when there was nothing to lay out.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row index of a `domID`, if present.
    pub fn row_of(&self, dom_id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.dom_id == dom_id)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Lay out an element batch on a shared elapsed-time axis.
///
/// - Empty input: no rows, segments, or ticks; canvas is the minimum size.
/// - Zero total duration: rows are reported, segments and ticks are not.
pub fn layout_timeline(elements: &[InteractionElement], config: &TimelineConfig) -> TimelineLayout {
    let pad = config.pad;
    let row_h = config.row_height;

    let mut rows: Vec<TimelineRow> = Vec::new();
    for element in elements {
        let id = element.dom_id();
        if rows.iter().all(|r| r.dom_id != id) {
            let index = rows.len();
            rows.push(TimelineRow {
                index,
                dom_id: id.to_string(),
                label_x: 8.0,
                label_y: pad + index as f64 * row_h + row_h / 2.0 + 4.0,
            });
        }
    }

    let total_seconds: f64 = elements.iter().map(InteractionElement::duration_secs).sum();
    let canvas_width = config
        .min_width
        .max(total_seconds * config.px_per_second + pad * 2.0);
    let canvas_height = pad + rows.len() as f64 * row_h + BOTTOM_MARGIN;
    let step_seconds = plan_axis_step(total_seconds);

    let mut layout = TimelineLayout {
        rows,
        segments: Vec::new(),
        ticks: Vec::new(),
        total_seconds,
        step_seconds,
        canvas_width,
        canvas_height,
    };

    if total_seconds <= 0.0 {
        return layout;
    }

    let plot_width = canvas_width - pad * 2.0;
    let x_at = |t: f64| pad + (t / total_seconds) * plot_width;

    let mut k = 0u32;
    loop {
        let t = f64::from(k) * step_seconds;
        if t > total_seconds + TICK_EPSILON {
            break;
        }
        layout.ticks.push(AxisTick {
            seconds: t,
            x: x_at(t),
            y1: pad - 10.0,
            y2: canvas_height - 20.0,
            label: format!("{t:.0}s"),
        });
        k += 1;
    }

    let mut cursor = 0.0;
    for element in elements {
        let id = element.dom_id();
        let row = layout.row_of(id).unwrap_or(0);
        let start = cursor;
        let end = cursor + element.duration_secs();
        cursor = end;

        let x1 = x_at(start);
        let x2 = x_at(end);
        layout.segments.push(TimelineSegment {
            row,
            dom_id: id.to_string(),
            label: element.label().to_string(),
            start_seconds: start,
            end_seconds: end,
            x: x1,
            y: pad + row as f64 * row_h + 6.0,
            width: (x2 - x1).max(0.0),
            height: (row_h - 12.0).max(0.0),
        });
    }

    layout
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

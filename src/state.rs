//! Dashboard state: the one place the current view lives.
//!
//! Holds the loaded element batch, the pie selection, the rendered chart
//! slots and the highlight timer. Every derived view (aggregate, layout,
//! series) is recomputed from the current batch on request.

use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use crate::analytics::{
    Aggregate, ChartSeries, Selection, aggregate_durations, build_chart_series,
};
use crate::config::schema::DwellConfig;
use crate::detect::FlagDetector;
use crate::highlight::{HighlightRect, HighlightTimer, ImageGeometry, map_highlight};
use crate::model::InteractionElement;
use crate::render;
use crate::timeline::{TimelineLayout, layout_timeline};

// ---------------------------------------------------------------------------
// Chart slots
// ---------------------------------------------------------------------------

/// Holds at most one rendered chart.
///
/// `replace` hands back the previous chart before the new one is stored, so
/// a caller that owns external resources for it can release them.
#[derive(Debug)]
pub struct ChartSlot<T> {
    current: Option<T>,
}

impl<T> Default for ChartSlot<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T> ChartSlot<T> {
    pub fn replace(&mut self, chart: T) -> Option<T> {
        self.current.replace(chart)
    }

    pub fn clear(&mut self) -> Option<T> {
        self.current.take()
    }

    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

/// Where the current element batch came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DataSource {
    Session(String),
    Url(String),
    File(String),
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session {id}"),
            Self::Url(url) => write!(f, "url {url}"),
            Self::File(path) => write!(f, "file {path}"),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DashboardState {
    config: DwellConfig,
    detector: FlagDetector,
    source: Option<DataSource>,
    elements: Vec<InteractionElement>,
    summary: Option<String>,
    selection: Selection,
    timeline_chart: ChartSlot<String>,
    bar_chart: ChartSlot<String>,
    pie_chart: ChartSlot<String>,
    highlight: HighlightTimer,
}

impl DashboardState {
    /// Build an empty dashboard. Fails when a detection pattern is invalid.
    pub fn new(config: DwellConfig) -> Result<Self> {
        let detector = FlagDetector::from_config(&config.detection)?;
        let ttl = Duration::from_millis(config.highlight.ttl_ms);
        Ok(Self {
            config,
            detector,
            source: None,
            elements: Vec::new(),
            summary: None,
            selection: Selection::new(),
            timeline_chart: ChartSlot::default(),
            bar_chart: ChartSlot::default(),
            pie_chart: ChartSlot::default(),
            highlight: HighlightTimer::new(ttl),
        })
    }

    pub fn config(&self) -> &DwellConfig {
        &self.config
    }

    pub fn detector(&self) -> &FlagDetector {
        &self.detector
    }

    pub fn source(&self) -> Option<&DataSource> {
        self.source.as_ref()
    }

    pub fn elements(&self) -> &[InteractionElement] {
        &self.elements
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Swap in a new batch. Selection, charts and any highlight are reset.
    pub fn load(
        &mut self,
        source: DataSource,
        elements: Vec<InteractionElement>,
        summary: Option<String>,
    ) {
        self.source = Some(source);
        self.elements = elements;
        self.summary = summary;
        self.selection.clear();
        self.timeline_chart.clear();
        self.bar_chart.clear();
        self.pie_chart.clear();
        self.highlight.clear();
    }

    // -- derived views -----------------------------------------------------

    pub fn aggregate(&self) -> Aggregate {
        aggregate_durations(&self.elements, &self.detector)
    }

    pub fn layout(&self) -> TimelineLayout {
        layout_timeline(&self.elements, &self.config.timeline)
    }

    pub fn chart_series(&self) -> ChartSeries {
        build_chart_series(&self.aggregate(), &self.selection, &self.config.charts)
    }

    // -- rendering ---------------------------------------------------------

    /// Re-render every chart for the current batch.
    pub fn render_all(&mut self) {
        self.render_timeline();
        self.render_charts();
    }

    pub fn render_timeline(&mut self) -> &str {
        let svg = render::render_timeline_svg(&self.layout(), &self.config.charts);
        self.timeline_chart.replace(svg);
        self.timeline_chart.get().map_or("", String::as_str)
    }

    pub fn render_charts(&mut self) {
        let series = self.chart_series();
        self.bar_chart.replace(render::render_bar_svg(&series));
        self.pie_chart
            .replace(render::render_pie_svg(&series, &self.config.charts));
    }

    pub fn timeline_svg(&self) -> Option<&str> {
        self.timeline_chart.get().map(String::as_str)
    }

    pub fn bar_svg(&self) -> Option<&str> {
        self.bar_chart.get().map(String::as_str)
    }

    pub fn pie_svg(&self) -> Option<&str> {
        self.pie_chart.get().map(String::as_str)
    }

    /// Toggle a pie slice. Only the pie is re-rendered, and only when one
    /// has been rendered already.
    pub fn toggle_selection(&mut self, dom_id: &str) -> bool {
        let selected = self.selection.toggle(dom_id);
        if !self.pie_chart.is_empty() {
            let series = self.chart_series();
            self.pie_chart
                .replace(render::render_pie_svg(&series, &self.config.charts));
        }
        selected
    }

    // -- highlight ---------------------------------------------------------

    /// Map `dom_id` onto the reference image and show it for the configured
    /// window. A miss leaves any current highlight alone.
    pub fn highlight(
        &mut self,
        dom_id: &str,
        geometry: &ImageGeometry,
        now: Instant,
    ) -> Option<HighlightRect> {
        let rect = map_highlight(dom_id, &self.elements, geometry, &self.detector)?;
        self.highlight.show(rect.clone(), now);
        Some(rect)
    }

    pub fn current_highlight(&mut self, now: Instant) -> Option<&HighlightRect> {
        self.highlight.current(now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FitMode;
    use crate::model::Rect;

    fn el(dom_id: &str, ms: f64, class: &str, rect: Option<Rect>) -> InteractionElement {
        InteractionElement {
            dom_id_raw: dom_id.to_string(),
            duration: ms,
            class_name: class.to_string(),
            rect,
            ..Default::default()
        }
    }

    fn rect() -> Option<Rect> {
        Some(Rect {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        })
    }

    fn loaded() -> DashboardState {
        let mut state = DashboardState::new(DwellConfig::default()).unwrap();
        state.load(
            DataSource::Session("7".into()),
            vec![
                el("nav", 1000.0, "", rect()),
                el("ad", 500.0, "sample-popup-ad", rect()),
            ],
            Some("summary".into()),
        );
        state
    }

    #[test]
    fn slot_replace_returns_previous() {
        let mut slot = ChartSlot::default();
        assert!(slot.replace(1).is_none());
        assert_eq!(slot.replace(2), Some(1));
        assert_eq!(slot.get(), Some(&2));
        assert_eq!(slot.clear(), Some(2));
        assert!(slot.is_empty());
    }

    #[test]
    fn load_resets_view_state() {
        let mut state = loaded();
        state.render_all();
        state.toggle_selection("nav");
        assert!(state.pie_svg().is_some());

        state.load(DataSource::Url("https://x".into()), Vec::new(), None);
        assert!(state.selection().is_empty());
        assert!(state.timeline_svg().is_none());
        assert!(state.bar_svg().is_none());
        assert!(state.pie_svg().is_none());
        assert!(state.summary().is_none());
    }

    #[test]
    fn derived_views_follow_batch() {
        let state = loaded();
        let agg = state.aggregate();
        assert_eq!(agg.len(), 2);
        assert!(agg.get("ad").unwrap().flagged);
        assert_eq!(state.layout().segments.len(), 2);
    }

    #[test]
    fn toggle_rerenders_pie_with_selected_color() {
        let mut state = loaded();
        state.render_charts();
        let before = state.pie_svg().unwrap().to_string();
        assert!(state.toggle_selection("nav"));
        let after = state.pie_svg().unwrap();
        assert_ne!(before, after);
        assert!(after.contains(&state.config().charts.palette[0]));
    }

    #[test]
    fn ad_element_is_never_highlighted() {
        let mut state = loaded();
        let geom = ImageGeometry::new((100.0, 100.0), (200.0, 200.0), FitMode::Stretch);
        let now = Instant::now();

        assert!(state.highlight("ad", &geom, now).is_none());
        let shown = state.highlight("nav", &geom, now).unwrap();
        assert_eq!(shown.x, 20.0);
        assert_eq!(state.current_highlight(now).map(|h| h.dom_id.as_str()), Some("nav"));
        assert!(state.current_highlight(now + Duration::from_secs(3)).is_none());
    }
}

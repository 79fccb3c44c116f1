/// Engine property tests.
///
/// Exercise the pure core end to end on realistic element batches decoded
/// from JSON the way the data API returns them: aggregation, axis steps,
/// timeline layout, chart series and highlight mapping.
use dwellscope::analytics::Selection;
use dwellscope::config::schema::{ChartsConfig, DetectionConfig, FitMode, TimelineConfig};
use dwellscope::detect::FlagDetector;
use dwellscope::highlight::ImageGeometry;
use dwellscope::model::InteractionElement;
use dwellscope::timeline::ticks::STEP_CANDIDATES;
use dwellscope::{
    aggregate_durations, build_chart_series, layout_timeline, map_highlight, plan_axis_step,
};

fn batch(json: &str) -> Vec<InteractionElement> {
    serde_json::from_str(json).unwrap()
}

fn sample_session() -> Vec<InteractionElement> {
    batch(
        r#"[
        {"timestamp": 1700000000000, "domID": "nav", "tag": "NAV", "duration": 1200, "visitCount": 1,
         "text": "Home", "rect": {"x": 0, "y": 0, "width": 800, "height": 60}},
        {"timestamp": 1700000001200, "domID": "hero", "tag": "DIV", "duration": 4300, "visitCount": 2,
         "text": "Summer sale", "rect": {"x": 0, "y": 60, "width": 800, "height": 300}},
        {"timestamp": 1700000005500, "domID": "popup", "tag": "DIV", "className": "sample-popup-ad",
         "duration": 2500, "visitCount": 1, "text": "Win a prize",
         "rect": {"x": 200, "y": 100, "width": 300, "height": 200}},
        {"timestamp": 1700000008000, "domID": "nav", "tag": "NAV", "duration": 800, "visitCount": 3,
         "text": "Home"},
        {"timestamp": 1700000008800, "tag": "SPAN", "duration": 200, "visitCount": 1}
    ]"#,
    )
}

// ---------------------------------------------------------------------------
// Tick planner
// ---------------------------------------------------------------------------

#[test]
fn tick_step_known_values() {
    assert_eq!(plan_axis_step(40.0), 5.0);
    assert_eq!(plan_axis_step(4.0), 1.0);
    assert_eq!(plan_axis_step(5000.0), 625.0);
}

#[test]
fn tick_step_is_first_fitting_candidate() {
    for total in [0.5, 3.0, 9.0, 17.0, 45.0, 100.0, 239.0, 900.0, 2400.0, 4800.0] {
        let step = plan_axis_step(total);
        assert!(total / step <= 8.0, "total {total} step {step}");
        let idx = STEP_CANDIDATES.iter().position(|&c| c == step).unwrap();
        if idx > 0 {
            assert!(total / STEP_CANDIDATES[idx - 1] > 8.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn aggregation_conserves_total_duration() {
    let elements = sample_session();
    let agg = aggregate_durations(&elements, &FlagDetector::builtin());

    let input_secs: f64 = elements.iter().map(|e| e.duration / 1000.0).sum();
    assert!((agg.total_seconds() - input_secs).abs() < 1e-9);
    assert_eq!(agg.len(), 4);
}

#[test]
fn aggregation_small_example() {
    let elements = batch(
        r#"[{"domID": "a", "duration": 1000, "visitCount": 1},
            {"domID": "b", "duration": 2000, "visitCount": 3},
            {"domID": "a", "duration": 500, "visitCount": 2}]"#,
    );
    let agg = aggregate_durations(&elements, &FlagDetector::builtin());

    let a = agg.get("a").unwrap();
    assert_eq!(a.total_duration_seconds, 1.5);
    assert_eq!(a.average_duration_ms, 750.0);
    assert_eq!(a.average_visit_count, 1.5);
    assert_eq!(agg.get("b").unwrap().total_duration_seconds, 2.0);
    assert_eq!(agg.entries[0].dom_id, "a");
}

#[test]
fn missing_dom_id_groups_under_unknown() {
    let agg = aggregate_durations(&sample_session(), &FlagDetector::builtin());
    assert_eq!(agg.get("unknown").unwrap().total_duration_seconds, 0.2);
}

#[test]
fn configured_markers_flag_elements() {
    let detector = FlagDetector::from_config(&DetectionConfig {
        markers: vec!["sale".to_string()],
        ad_classes: Vec::new(),
        patterns: vec![r"(?i)prize".to_string()],
    })
    .unwrap();
    let agg = aggregate_durations(&sample_session(), &detector);

    assert!(agg.get("hero").unwrap().flagged);
    assert!(agg.get("popup").unwrap().flagged);
    assert!(!agg.get("nav").unwrap().flagged);
}

// ---------------------------------------------------------------------------
// Chart series
// ---------------------------------------------------------------------------

#[test]
fn pie_shares_sum_to_hundred() {
    let agg = aggregate_durations(&sample_session(), &FlagDetector::builtin());
    let series = build_chart_series(&agg, &Selection::new(), &ChartsConfig::default());
    let sum: f64 = series.pie.iter().map(|s| s.share_pct).sum();
    assert!((sum - 100.0).abs() < 1e-9);
}

#[test]
fn pie_shares_are_zero_without_duration() {
    let elements = batch(r#"[{"domID": "a"}, {"domID": "b", "duration": -5}]"#);
    let agg = aggregate_durations(&elements, &FlagDetector::builtin());
    let series = build_chart_series(&agg, &Selection::new(), &ChartsConfig::default());
    assert!(series.pie.iter().all(|s| s.share_pct == 0.0));
    assert!(series.pie.iter().all(|s| s.share_pct.is_finite()));
}

#[test]
fn bars_descend_by_total() {
    let agg = aggregate_durations(&sample_session(), &FlagDetector::builtin());
    let series = build_chart_series(&agg, &Selection::new(), &ChartsConfig::default());
    let ids: Vec<&str> = series.bars.iter().map(|b| b.dom_id.as_str()).collect();
    assert_eq!(ids, vec!["hero", "popup", "nav", "unknown"]);
    assert!(series.bars[1].flagged);
}

// ---------------------------------------------------------------------------
// Timeline layout
// ---------------------------------------------------------------------------

#[test]
fn segments_are_contiguous_in_input_order() {
    let elements = sample_session();
    let layout = layout_timeline(&elements, &TimelineConfig::default());

    assert_eq!(layout.segments.len(), elements.len());
    assert_eq!(layout.segments[0].start_seconds, 0.0);
    for pair in layout.segments.windows(2) {
        assert!((pair[0].end_seconds - pair[1].start_seconds).abs() < 1e-9);
        assert!((pair[0].x + pair[0].width - pair[1].x).abs() < 1e-6);
    }

    let plot_width = layout.canvas_width - 2.0 * 60.0;
    let widths: f64 = layout.segments.iter().map(|s| s.width).sum();
    assert!((widths - plot_width).abs() < 1e-6);
}

#[test]
fn rows_follow_first_seen_dom_ids() {
    let layout = layout_timeline(&sample_session(), &TimelineConfig::default());
    let rows: Vec<&str> = layout.rows.iter().map(|r| r.dom_id.as_str()).collect();
    assert_eq!(rows, vec!["nav", "hero", "popup", "unknown"]);
    assert_eq!(layout.segments[3].row, 0);
    assert_eq!(layout.canvas_height, 60.0 + 4.0 * 30.0 + 30.0);
}

#[test]
fn canvas_width_has_a_floor() {
    let layout = layout_timeline(&sample_session(), &TimelineConfig::default());
    // 9 s * 60 px + 120 px padding is below the 900 px minimum.
    assert_eq!(layout.canvas_width, 900.0);
    assert_eq!(layout.step_seconds, 2.0);
    assert_eq!(layout.ticks.len(), 5);
    assert_eq!(layout.ticks[4].label, "8s");
}

#[test]
fn long_session_ticks_use_fallback_step() {
    // 5000 s is past the largest candidate, so the step is round(5000 / 8).
    let elements = batch(r#"[{"domID": "a", "duration": 3000000}, {"domID": "b", "duration": 2000000}]"#);
    let layout = layout_timeline(&elements, &TimelineConfig::default());

    assert_eq!(layout.step_seconds, 625.0);
    assert_eq!(layout.ticks.len(), 9);
    let seconds: Vec<f64> = layout.ticks.iter().map(|t| t.seconds).collect();
    let expected: Vec<f64> = (0..=8).map(|k| f64::from(k) * 625.0).collect();
    assert_eq!(seconds, expected);
    assert_eq!(layout.ticks[8].label, "5000s");
    assert!((layout.ticks[8].x - (layout.canvas_width - 60.0)).abs() < 1e-6);
}

#[test]
fn empty_batch_lays_out_nothing() {
    let layout = layout_timeline(&[], &TimelineConfig::default());
    assert!(layout.is_empty());
    assert!(layout.segments.is_empty());
    assert!(layout.ticks.is_empty());
}

// ---------------------------------------------------------------------------
// Highlight mapping
// ---------------------------------------------------------------------------

#[test]
fn highlight_scales_linearly_with_display_size() {
    let elements = sample_session();
    let detector = FlagDetector::builtin();
    let natural = (800.0, 600.0);

    let one = map_highlight(
        "hero",
        &elements,
        &ImageGeometry::new(natural, (400.0, 300.0), FitMode::Stretch),
        &detector,
    )
    .unwrap();
    let two = map_highlight(
        "hero",
        &elements,
        &ImageGeometry::new(natural, (800.0, 600.0), FitMode::Stretch),
        &detector,
    )
    .unwrap();

    assert_eq!(two.x, one.x * 2.0);
    assert_eq!(two.y, one.y * 2.0);
    assert_eq!(two.width, one.width * 2.0);
    assert_eq!(two.height, one.height * 2.0);
}

#[test]
fn contain_highlight_scales_linearly_with_container() {
    let elements = sample_session();
    let detector = FlagDetector::builtin();
    let natural = (800.0, 600.0);

    // Wide boxes: horizontal letterbox bars, so the x offset is nonzero.
    let one = map_highlight(
        "hero",
        &elements,
        &ImageGeometry::new(natural, (500.0, 300.0), FitMode::Contain),
        &detector,
    )
    .unwrap();
    let two = map_highlight(
        "hero",
        &elements,
        &ImageGeometry::new(natural, (1000.0, 600.0), FitMode::Contain),
        &detector,
    )
    .unwrap();

    assert_eq!(one.x, 50.0);
    assert_eq!(two.x, one.x * 2.0);
    assert_eq!(two.y, one.y * 2.0);
    assert_eq!(two.width, one.width * 2.0);
    assert_eq!(two.height, one.height * 2.0);
}

#[test]
fn contain_fit_letterboxes() {
    let elements = sample_session();
    // 800x600 image in a 1000x600 box: scale 1, 100 px side bars.
    let geometry = ImageGeometry::new((800.0, 600.0), (1000.0, 600.0), FitMode::Contain);
    let h = map_highlight("nav", &elements, &geometry, &FlagDetector::builtin()).unwrap();
    assert_eq!((h.x, h.y, h.width, h.height), (100.0, 0.0, 800.0, 60.0));
}

#[test]
fn ad_element_is_flagged_but_never_highlighted() {
    let elements = sample_session();
    let detector = FlagDetector::builtin();

    let agg = aggregate_durations(&elements, &detector);
    assert!(agg.get("popup").unwrap().flagged);

    let geometry = ImageGeometry::new((800.0, 600.0), (800.0, 600.0), FitMode::Stretch);
    assert!(map_highlight("popup", &elements, &geometry, &detector).is_none());
}

#[test]
fn unknown_or_rectless_dom_id_has_no_highlight() {
    let elements = sample_session();
    let geometry = ImageGeometry::new((800.0, 600.0), (800.0, 600.0), FitMode::Stretch);
    let detector = FlagDetector::builtin();
    assert!(map_highlight("missing", &elements, &geometry, &detector).is_none());
    assert!(map_highlight("unknown", &elements, &geometry, &detector).is_none());
}

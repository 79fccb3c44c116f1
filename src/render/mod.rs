//! SVG rendering of timeline geometry and chart series.
//!
//! Output is self-contained SVG text, shared by the CLI (`timeline --out`)
//! and the web dashboard. All user-supplied text is XML-escaped.

use std::f64::consts::PI;

use crate::analytics::charts::{AverageBar, ChartSeries};
use crate::config::schema::ChartsConfig;
use crate::timeline::TimelineLayout;

const FONT: &str = "font-family=\"sans-serif\" font-size=\"12\"";

/// Escape text for use in SVG element content and attribute values.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn row_color(charts: &ChartsConfig, row: usize) -> &str {
    if charts.palette.is_empty() {
        &charts.default_color
    } else {
        &charts.palette[row % charts.palette.len()]
    }
}

fn open_svg(width: f64, height: f64) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\">\n"
    )
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Render a timeline: gridlines with `Ns` labels, one label per row, and one
/// rounded bar per segment with the element label as hover title.
pub fn render_timeline_svg(layout: &TimelineLayout, charts: &ChartsConfig) -> String {
    let mut svg = open_svg(layout.canvas_width, layout.canvas_height);

    for tick in &layout.ticks {
        svg.push_str(&format!(
            "  <line x1=\"{x:.2}\" y1=\"{y1:.2}\" x2=\"{x:.2}\" y2=\"{y2:.2}\" stroke=\"#eee\"/>\n",
            x = tick.x,
            y1 = tick.y1,
            y2 = tick.y2,
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.2}\" y=\"{:.2}\" {FONT} fill=\"#666\" text-anchor=\"middle\">{}</text>\n",
            tick.x,
            tick.y1 - 6.0,
            escape_xml(&tick.label),
        ));
    }

    for row in &layout.rows {
        svg.push_str(&format!(
            "  <text x=\"{:.2}\" y=\"{:.2}\" {FONT} fill=\"#333\">{}</text>\n",
            row.label_x,
            row.label_y,
            escape_xml(&row.dom_id),
        ));
    }

    for seg in &layout.segments {
        svg.push_str(&format!(
            "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" fill=\"{}\" opacity=\"0.7\"><title>{} ({:.1}s)</title></rect>\n",
            seg.x,
            seg.y,
            seg.width,
            seg.height,
            escape_xml(row_color(charts, seg.row)),
            escape_xml(&seg.label),
            seg.duration_seconds(),
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

const BAR_ROW: f64 = 24.0;
const BAR_LABEL_W: f64 = 160.0;
const BAR_MAX_W: f64 = 420.0;

/// Horizontal bar chart of `(label, value, color)` rows scaled to the max.
fn horizontal_bars<'a>(rows: impl Iterator<Item = (&'a str, f64, &'a str)>, unit: &str) -> String {
    let rows: Vec<_> = rows.collect();
    let max = rows.iter().map(|r| r.1).fold(0.0, f64::max);
    let width = BAR_LABEL_W + BAR_MAX_W + 80.0;
    let height = rows.len() as f64 * BAR_ROW + 20.0;

    let mut svg = open_svg(width, height);
    for (i, (label, value, color)) in rows.iter().enumerate() {
        let y = 10.0 + i as f64 * BAR_ROW;
        let w = if max > 0.0 { value / max * BAR_MAX_W } else { 0.0 };
        svg.push_str(&format!(
            "  <text x=\"{:.2}\" y=\"{:.2}\" {FONT} fill=\"#333\" text-anchor=\"end\">{}</text>\n",
            BAR_LABEL_W - 8.0,
            y + BAR_ROW / 2.0 + 4.0,
            escape_xml(label),
        ));
        svg.push_str(&format!(
            "  <rect x=\"{BAR_LABEL_W:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{:.2}\" fill=\"{}\"/>\n",
            y + 3.0,
            BAR_ROW - 6.0,
            escape_xml(color),
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.2}\" y=\"{:.2}\" {FONT} fill=\"#666\">{value:.2}{unit}</text>\n",
            BAR_LABEL_W + w + 6.0,
            y + BAR_ROW / 2.0 + 4.0,
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

/// Bar chart of total seconds per `domID`, in series order.
pub fn render_bar_svg(series: &ChartSeries) -> String {
    horizontal_bars(
        series
            .bars
            .iter()
            .map(|b| (b.dom_id.as_str(), b.seconds, b.color.as_str())),
        "s",
    )
}

/// Average-duration bars for the per-URL stats view.
pub fn render_average_svg(averages: &[AverageBar], charts: &ChartsConfig) -> String {
    horizontal_bars(
        averages.iter().enumerate().map(|(i, a)| {
            (
                a.dom_id.as_str(),
                a.average_duration_ms,
                row_color(charts, i),
            )
        }),
        "ms",
    )
}

/// Pie chart of duration shares. Slices with a zero share are skipped; an
/// all-zero series renders an empty gray disc.
pub fn render_pie_svg(series: &ChartSeries, charts: &ChartsConfig) -> String {
    let (cx, cy, r) = (160.0, 160.0, 140.0);
    let legend_x = 330.0;
    let height = (series.pie.len() as f64 * 20.0 + 20.0).max(320.0);
    let mut svg = open_svg(560.0, height);

    let total: f64 = series.pie.iter().map(|s| s.share_pct).sum();
    if total <= 0.0 {
        svg.push_str(&format!(
            "  <circle cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\" fill=\"{}\"/>\n",
            escape_xml(&charts.unselected_color)
        ));
    }

    let mut angle = -PI / 2.0;
    for slice in series.pie.iter().filter(|s| s.share_pct > 0.0) {
        let sweep = slice.share_pct / 100.0 * 2.0 * PI;
        let title = format!("{} ({:.1}%)", slice.dom_id, slice.share_pct);
        if sweep >= 2.0 * PI - 1e-9 {
            svg.push_str(&format!(
                "  <circle cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\" fill=\"{}\" stroke=\"#fff\"><title>{}</title></circle>\n",
                escape_xml(&slice.color),
                escape_xml(&title),
            ));
        } else {
            let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
            let end = angle + sweep;
            let (x2, y2) = (cx + r * end.cos(), cy + r * end.sin());
            let large = u8::from(sweep > PI);
            svg.push_str(&format!(
                "  <path d=\"M {cx} {cy} L {x1:.2} {y1:.2} A {r} {r} 0 {large} 1 {x2:.2} {y2:.2} Z\" fill=\"{}\" stroke=\"#fff\"><title>{}</title></path>\n",
                escape_xml(&slice.color),
                escape_xml(&title),
            ));
        }
        angle += sweep;
    }

    for (i, slice) in series.pie.iter().enumerate() {
        let y = 20.0 + i as f64 * 20.0;
        svg.push_str(&format!(
            "  <rect x=\"{legend_x}\" y=\"{:.2}\" width=\"12\" height=\"12\" fill=\"{}\"/>\n",
            y - 10.0,
            escape_xml(&slice.color),
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{y:.2}\" {FONT} fill=\"#333\">{} {:.1}%</text>\n",
            legend_x + 18.0,
            escape_xml(&slice.dom_id),
            slice.share_pct,
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

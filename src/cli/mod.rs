//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `dwellscope sessions <user>`: list recorded sessions
//! - `dwellscope elements`: raw element table for a session, URL or file
//! - `dwellscope summary`: per-`domID` aggregate with flags
//! - `dwellscope timeline`: segment table or SVG timeline
//! - `dwellscope charts`: bar / pie series and SVGs
//! - `dwellscope stats`: URL list, or per-URL averages and hourly activity
//! - `dwellscope highlight <dom_id>`: map a stored rect onto an image size
//! - `dwellscope heatmap <session>`: save the session's heatmap PNG
//! - `dwellscope health`: config, data API and log checks
//! - `dwellscope log`: recent activity events
//! - `dwellscope config show|init|set|reset`: configuration management

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::analytics::aggregate::{HourlyActivity, hourly_activity};
use crate::analytics::charts::build_average_series;
use crate::analytics::events::{ActivityEvent, ActivityLog};
use crate::analytics::{Aggregate, ChartSeries};
use crate::client::{self, DataApiClient};
use crate::config;
use crate::config::schema::{DwellConfig, FitMode};
use crate::detect::FlagDetector;
use crate::highlight::{HighlightRect, ImageGeometry};
use crate::model::InteractionElement;
use crate::render;
use crate::state::{DashboardState, DataSource};
use crate::timeline::TimelineLayout;

/// Output format for tabular commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Where a command reads its element batch from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Session(String),
    Url(String),
    File(PathBuf),
}

impl SourceSpec {
    /// Build from the mutually exclusive `--session/--url/--file` flags.
    pub fn from_flags(
        session: Option<String>,
        url: Option<String>,
        file: Option<PathBuf>,
    ) -> Result<Self> {
        match (session, url, file) {
            (Some(s), None, None) => Ok(Self::Session(s)),
            (None, Some(u), None) => Ok(Self::Url(u)),
            (None, None, Some(f)) => Ok(Self::File(f)),
            (None, None, None) => bail!("one of --session, --url or --file is required"),
            _ => bail!("--session, --url and --file are mutually exclusive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared loading
// ---------------------------------------------------------------------------

/// Load config, fetch the batch and wrap it in a dashboard state.
fn load_state(spec: &SourceSpec) -> Result<(DashboardState, ActivityLog)> {
    let cfg = config::load();
    let log = ActivityLog::from_config(&cfg.logging);
    let mut state = DashboardState::new(cfg)?;
    let (source, elements, summary) = fetch_source(state.config(), spec, &log)?;
    state.load(source, elements, summary);
    Ok((state, log))
}

/// Fetch an element batch, recording one activity event per attempt.
pub fn fetch_source(
    cfg: &DwellConfig,
    spec: &SourceSpec,
    log: &ActivityLog,
) -> Result<(DataSource, Vec<InteractionElement>, Option<String>)> {
    let client = DataApiClient::from_config(&cfg.data_api);

    let (kind, subject, result) = match spec {
        SourceSpec::Session(sid) => (
            "fetch_session",
            sid.clone(),
            client
                .session_data(sid)
                .map(|d| (DataSource::Session(sid.clone()), d.elements, d.summary)),
        ),
        SourceSpec::Url(url) => (
            "fetch_url",
            url.clone(),
            client
                .elements_by_url(url)
                .map(|els| (DataSource::Url(url.clone()), els, None)),
        ),
        SourceSpec::File(path) => {
            let shown = path.display().to_string();
            (
                "load_file",
                shown.clone(),
                client::load_elements_file(path).map(|els| (DataSource::File(shown), els, None)),
            )
        }
    };

    match &result {
        Ok((_, elements, _)) => {
            log.record(&ActivityEvent::new(kind, &subject).with_count(elements.len()))
        }
        Err(e) => log.record(&ActivityEvent::new(kind, &subject).with_detail(e.to_string())),
    }

    result
}

fn no_elements_notice(state: &DashboardState) -> bool {
    if state.elements().is_empty() {
        let source = state
            .source()
            .map(|s| s.to_string())
            .unwrap_or_default();
        println!("{}", format!("No elements recorded for {source}.").yellow());
        return true;
    }
    false
}

// ---------------------------------------------------------------------------
// dwellscope sessions
// ---------------------------------------------------------------------------

/// List session IDs recorded for a user.
pub fn run_sessions(user_id: &str, format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    let log = ActivityLog::from_config(&cfg.logging);
    let client = DataApiClient::from_config(&cfg.data_api);

    let sessions = client.list_sessions(user_id);
    match &sessions {
        Ok(s) => log.record(&ActivityEvent::new("fetch_sessions", user_id).with_count(s.len())),
        Err(e) => log.record(&ActivityEvent::new("fetch_sessions", user_id).with_detail(e.to_string())),
    }
    let sessions = sessions?;

    if sessions.is_empty() {
        println!("{}", format!("No sessions for user {user_id}.").yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "user_id": user_id, "sessions": sessions });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Csv => {
            println!("session_id");
            for s in &sessions {
                println!("{}", csv_field(s));
            }
        }
        OutputFormat::Table => {
            println!("{}", format!("Sessions for {user_id}").bold().cyan());
            println!("{}", "=".repeat(40));
            for s in &sessions {
                println!("  {s}");
            }
            println!();
            println!("  {} {}", "Total:".bold(), sessions.len());
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// dwellscope elements
// ---------------------------------------------------------------------------

/// Print the raw element batch.
pub fn run_elements(spec: &SourceSpec, format: OutputFormat) -> Result<()> {
    let (state, _) = load_state(spec)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(state.elements())?);
            return Ok(());
        }
        OutputFormat::Csv => {
            println!("timestamp,dom_id,tag,class_name,duration_ms,visit_count,text");
            for e in state.elements() {
                println!(
                    "{:.0},{},{},{},{:.0},{},{}",
                    e.timestamp,
                    csv_field(e.dom_id()),
                    csv_field(&e.tag),
                    csv_field(&e.class_name),
                    e.duration,
                    e.visit_count,
                    csv_field(&e.text),
                );
            }
            return Ok(());
        }
        OutputFormat::Table => {}
    }

    if no_elements_notice(&state) {
        return Ok(());
    }

    if let Some(summary) = state.summary() {
        println!("{}", "Session Summary".bold().cyan());
        println!("  {summary}");
        println!();
    }

    println!(
        "  {:<20} {:<8} {:>10} {:>6}  Text",
        "domID", "Tag", "Duration", "Visits"
    );
    println!("  {}", "-".repeat(64));
    for (i, e) in state.elements().iter().enumerate() {
        let line = format!(
            "  {:<20} {:<8} {:>9.2}s {:>6}  {}",
            truncate(e.dom_id(), 20),
            truncate(&e.tag, 8),
            e.duration_secs(),
            e.visit_count,
            truncate(&e.text, 30),
        );
        if state.detector().is_flagged(e) {
            println!("{}", line.red());
        } else if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// dwellscope summary
// ---------------------------------------------------------------------------

/// Per-`domID` aggregate table.
pub fn run_summary(spec: &SourceSpec, format: OutputFormat) -> Result<()> {
    let (state, _) = load_state(spec)?;
    let aggregate = state.aggregate();

    match format {
        OutputFormat::Json => print_aggregate_json(&aggregate, state.summary())?,
        OutputFormat::Csv => print_aggregate_csv(&aggregate),
        OutputFormat::Table => {
            if !no_elements_notice(&state) {
                print_aggregate_table(&aggregate);
            }
        }
    }

    Ok(())
}

fn print_aggregate_table(aggregate: &Aggregate) {
    println!("{}", "Dwell Time by Element".bold().cyan());
    println!("{}", "=".repeat(60));
    println!(
        "  {} {:.2}s across {} elements",
        "Total:".bold(),
        aggregate.total_seconds(),
        aggregate.len()
    );
    println!();
    println!(
        "  {:<24} {:>10} {:>10} {:>8} {:>5}",
        "domID", "Total", "Avg", "Visits", "Seen"
    );
    println!("  {}", "-".repeat(60));

    for (i, entry) in aggregate.iter().enumerate() {
        let line = format!(
            "  {:<24} {:>9.2}s {:>8.0}ms {:>8.1} {:>5}",
            truncate(&entry.dom_id, 24),
            entry.total_duration_seconds,
            entry.average_duration_ms,
            entry.average_visit_count,
            entry.occurrence_count,
        );
        if entry.flagged {
            println!("{} {}", line.red(), "flagged".red().bold());
        } else if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_aggregate_json(aggregate: &Aggregate, summary: Option<&str>) -> Result<()> {
    let value = serde_json::json!({
        "total_seconds": aggregate.total_seconds(),
        "summary": summary,
        "elements": aggregate.entries,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_aggregate_csv(aggregate: &Aggregate) {
    println!("dom_id,total_duration_seconds,average_duration_ms,average_visit_count,occurrences,flagged");
    for e in aggregate.iter() {
        println!(
            "{},{:.3},{:.1},{:.2},{},{}",
            csv_field(&e.dom_id),
            e.total_duration_seconds,
            e.average_duration_ms,
            e.average_visit_count,
            e.occurrence_count,
            e.flagged,
        );
    }
}

// ---------------------------------------------------------------------------
// dwellscope timeline
// ---------------------------------------------------------------------------

/// Timeline as a segment table, JSON geometry, or an SVG file.
pub fn run_timeline(spec: &SourceSpec, out: Option<&Path>, format: OutputFormat) -> Result<()> {
    let (mut state, _) = load_state(spec)?;

    if let Some(path) = out {
        let svg = state.render_timeline().to_string();
        write_file(path, &svg)?;
        println!("{} Timeline written to {}", "✓".green().bold(), path.display());
        return Ok(());
    }

    let layout = state.layout();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&layout)?),
        OutputFormat::Csv => print_timeline_csv(&layout),
        OutputFormat::Table => {
            if !no_elements_notice(&state) {
                print_timeline_table(&layout);
            }
        }
    }

    Ok(())
}

fn print_timeline_table(layout: &TimelineLayout) {
    println!("{}", "Session Timeline".bold().cyan());
    println!("{}", "=".repeat(60));
    println!(
        "  {} {:.2}s   {} {}s   {} {:.0}x{:.0}",
        "Total:".bold(),
        layout.total_seconds,
        "Step:".bold(),
        layout.step_seconds,
        "Canvas:".bold(),
        layout.canvas_width,
        layout.canvas_height,
    );
    println!();
    println!(
        "  {:>4} {:<20} {:>9} {:>9}  Label",
        "Row", "domID", "Start", "End"
    );
    println!("  {}", "-".repeat(60));
    for seg in &layout.segments {
        println!(
            "  {:>4} {:<20} {:>8.2}s {:>8.2}s  {}",
            seg.row,
            truncate(&seg.dom_id, 20),
            seg.start_seconds,
            seg.end_seconds,
            truncate(&seg.label, 24),
        );
    }
}

fn print_timeline_csv(layout: &TimelineLayout) {
    println!("row,dom_id,start_seconds,end_seconds,x,y,width,height");
    for seg in &layout.segments {
        println!(
            "{},{},{:.3},{:.3},{:.2},{:.2},{:.2},{:.2}",
            seg.row,
            csv_field(&seg.dom_id),
            seg.start_seconds,
            seg.end_seconds,
            seg.x,
            seg.y,
            seg.width,
            seg.height,
        );
    }
}

// ---------------------------------------------------------------------------
// dwellscope charts
// ---------------------------------------------------------------------------

/// Bar / pie series. With `out_dir`, writes `bar.svg` and `pie.svg`.
pub fn run_charts(
    spec: &SourceSpec,
    selected: &[String],
    out_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let (mut state, _) = load_state(spec)?;
    for id in selected {
        state.toggle_selection(id);
    }

    if let Some(dir) = out_dir {
        state.render_charts();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for (name, svg) in [("bar.svg", state.bar_svg()), ("pie.svg", state.pie_svg())] {
            let path = dir.join(name);
            write_file(&path, svg.unwrap_or_default())?;
            println!("{} Wrote {}", "✓".green().bold(), path.display());
        }
        return Ok(());
    }

    let series = state.chart_series();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&series)?),
        OutputFormat::Csv => print_series_csv(&series),
        OutputFormat::Table => {
            if !no_elements_notice(&state) {
                print_series_table(&series);
            }
        }
    }

    Ok(())
}

fn print_series_table(series: &ChartSeries) {
    println!("{}", "Duration by Element".bold().cyan());
    println!("{}", "=".repeat(60));
    let max = series.bars.iter().map(|b| b.seconds).fold(0.0, f64::max);
    for bar in &series.bars {
        let len = if max > 0.0 {
            (bar.seconds / max * 30.0).round() as usize
        } else {
            0
        };
        let line = format!(
            "  {:<20} {:>8.2}s {}",
            truncate(&bar.dom_id, 20),
            bar.seconds,
            "█".repeat(len)
        );
        if bar.flagged {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }

    println!();
    println!("{}", "Share of Session".bold().cyan());
    for slice in &series.pie {
        let marker = if slice.selected { "●" } else { "○" };
        println!(
            "  {} {:<20} {:>6.1}%",
            marker,
            truncate(&slice.dom_id, 20),
            slice.share_pct
        );
    }
}

fn print_series_csv(series: &ChartSeries) {
    println!("dom_id,seconds,share_pct,flagged,selected");
    for bar in &series.bars {
        let slice = series.pie.iter().find(|s| s.dom_id == bar.dom_id);
        println!(
            "{},{:.3},{:.2},{},{}",
            csv_field(&bar.dom_id),
            bar.seconds,
            slice.map_or(0.0, |s| s.share_pct),
            bar.flagged,
            slice.is_some_and(|s| s.selected),
        );
    }
}

// ---------------------------------------------------------------------------
// dwellscope stats
// ---------------------------------------------------------------------------

/// Without `url`: list URLs with data. With `url`: averages and hourly
/// activity per `domID`.
pub fn run_stats(url: Option<&str>, out: Option<&Path>, format: OutputFormat) -> Result<()> {
    let Some(url) = url else {
        let cfg = config::load();
        let client = DataApiClient::from_config(&cfg.data_api);
        let urls = client.stats_urls()?;
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "urls": urls }))?)
            }
            OutputFormat::Csv => {
                println!("url");
                for u in &urls {
                    println!("{}", csv_field(u));
                }
            }
            OutputFormat::Table => {
                if urls.is_empty() {
                    println!("{}", "No URLs recorded yet.".yellow());
                }
                for u in &urls {
                    println!("  {u}");
                }
            }
        }
        return Ok(());
    };

    let (state, _) = load_state(&SourceSpec::Url(url.to_string()))?;
    let averages = build_average_series(&state.aggregate());
    let hourly = hourly_activity(state.elements());

    if let Some(path) = out {
        write_file(path, &render::render_average_svg(&averages, &state.config().charts))?;
        println!("{} Averages written to {}", "✓".green().bold(), path.display());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "url": url, "averages": averages, "hourly": hourly });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Csv => {
            println!("dom_id,average_duration_ms,average_visit_count");
            for a in &averages {
                println!(
                    "{},{:.1},{:.2}",
                    csv_field(&a.dom_id),
                    a.average_duration_ms,
                    a.average_visit_count
                );
            }
        }
        OutputFormat::Table => {
            if no_elements_notice(&state) {
                return Ok(());
            }
            println!("{}", format!("Averages for {url}").bold().cyan());
            println!("{}", "=".repeat(60));
            println!("  {:<24} {:>12} {:>8}", "domID", "Avg", "Visits");
            println!("  {}", "-".repeat(46));
            for a in &averages {
                println!(
                    "  {:<24} {:>10.0}ms {:>8.1}",
                    truncate(&a.dom_id, 24),
                    a.average_duration_ms,
                    a.average_visit_count
                );
            }
            println!();
            print_hourly_table(&hourly);
        }
    }

    Ok(())
}

fn print_hourly_table(hourly: &[HourlyActivity]) {
    const LEVELS: [char; 5] = [' ', '░', '▒', '▓', '█'];

    println!("{}", "Activity by Hour".bold().cyan());
    println!("  {:<20} 0         6         12        18      23", "");
    for h in hourly {
        let max = h.counts.iter().copied().max().unwrap_or(0);
        let cells: String = h
            .counts
            .iter()
            .map(|&c| {
                if max == 0 || c == 0 {
                    '·'
                } else {
                    LEVELS[(c * (LEVELS.len() - 1)).div_ceil(max)]
                }
            })
            .flat_map(|c| [c, ' '])
            .take(47)
            .collect();
        println!("  {:<20} {}", truncate(&h.dom_id, 20), cells);
    }
}

// ---------------------------------------------------------------------------
// dwellscope heatmap
// ---------------------------------------------------------------------------

/// Default download name for a session's heatmap.
pub fn heatmap_file_name(session_id: &str) -> String {
    let safe: String = session_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("heatmap_session_{safe}.png")
}

/// Fetch a session's heatmap and write it to `out`.
///
/// Returns the path written, or `None` when the data API has no image.
pub fn save_heatmap(
    client: &DataApiClient,
    session_id: &str,
    out: Option<&Path>,
    log: &ActivityLog,
) -> Result<Option<PathBuf>> {
    let event = ActivityEvent::new("fetch_heatmap", session_id);
    let Some(bytes) = client.heatmap(session_id) else {
        log.record(&event.with_detail("unavailable"));
        return Ok(None);
    };

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(heatmap_file_name(session_id)));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    log.record(&event.with_count(bytes.len()));
    Ok(Some(path))
}

/// Download a session's heatmap PNG.
pub fn run_heatmap(session_id: &str, out: Option<&Path>) -> Result<()> {
    let cfg = config::load();
    let log = ActivityLog::from_config(&cfg.logging);
    let client = DataApiClient::from_config(&cfg.data_api);

    match save_heatmap(&client, session_id, out, &log)? {
        Some(path) => println!("{} {}", "Saved heatmap:".green(), path.display()),
        None => println!(
            "{}",
            format!("No heatmap available for session {session_id}.").yellow()
        ),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// dwellscope highlight
// ---------------------------------------------------------------------------

/// Options for a one-shot highlight mapping.
#[derive(Debug, Clone)]
pub struct HighlightArgs {
    pub dom_id: String,
    pub natural: String,
    pub display: String,
    pub fit: Option<String>,
}

/// Map a `domID`'s stored rect onto an image of the given sizes.
pub fn run_highlight(spec: &SourceSpec, args: &HighlightArgs, format: OutputFormat) -> Result<()> {
    let (mut state, log) = load_state(spec)?;

    let fit = match args.fit.as_deref() {
        Some(raw) => config::parse_fit_mode(raw)
            .with_context(|| format!("invalid fit mode: {raw} (expected stretch or contain)"))?,
        None => state.config().highlight.fit,
    };
    let geometry = ImageGeometry::new(parse_size(&args.natural)?, parse_size(&args.display)?, fit);

    let rect = state.highlight(&args.dom_id, &geometry, Instant::now());
    let event = ActivityEvent::new("highlight", &args.dom_id);
    log.record(&match &rect {
        Some(_) => event.with_count(1),
        None => event.with_detail("no highlight"),
    });

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rect)?),
        OutputFormat::Csv => {
            println!("dom_id,x,y,width,height");
            if let Some(r) = &rect {
                println!(
                    "{},{:.2},{:.2},{:.2},{:.2}",
                    csv_field(&r.dom_id),
                    r.x,
                    r.y,
                    r.width,
                    r.height
                );
            }
        }
        OutputFormat::Table => print_highlight(&args.dom_id, rect.as_ref(), fit, state.detector(), state.elements()),
    }

    Ok(())
}

fn print_highlight(
    dom_id: &str,
    rect: Option<&HighlightRect>,
    fit: FitMode,
    detector: &FlagDetector,
    elements: &[InteractionElement],
) {
    match rect {
        Some(r) => {
            println!("{} {} ({fit})", "Highlight".bold().cyan(), dom_id.bold());
            println!("  {} {:.1}, {:.1}", "Position:".bold(), r.x, r.y);
            println!("  {} {:.1} x {:.1}", "Size:    ".bold(), r.width, r.height);
        }
        None => {
            let ad = elements
                .iter()
                .any(|e| e.dom_id() == dom_id && e.rect.is_some() && detector.is_ad_class(e));
            let reason = if ad {
                "element is an ad and is never highlighted"
            } else {
                "no element with a stored rect"
            };
            println!("{}", format!("No highlight for {dom_id}: {reason}.").yellow());
        }
    }
}

/// Parse `WIDTHxHEIGHT` into a positive size.
pub fn parse_size(raw: &str) -> Result<(f64, f64)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .with_context(|| format!("invalid size {raw:?}: expected WIDTHxHEIGHT"))?;
    let w: f64 = w.trim().parse().with_context(|| format!("invalid width in {raw:?}"))?;
    let h: f64 = h.trim().parse().with_context(|| format!("invalid height in {raw:?}"))?;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        bail!("size {raw:?} must be positive");
    }
    Ok((w, h))
}

// ---------------------------------------------------------------------------
// dwellscope health
// ---------------------------------------------------------------------------

/// Check config, detection rules, data API reachability and the activity log.
pub fn run_health() -> Result<()> {
    println!("{}", "dwellscope Health Check".bold().cyan());
    println!("{}", "=".repeat(50));

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    print_health_item(
        "Config file",
        true,
        if global_exists {
            "~/.dwellscope/config.toml"
        } else {
            "using defaults"
        },
    );

    let cfg = config::load();

    match FlagDetector::from_config(&cfg.detection) {
        Ok(_) => print_health_item(
            "Detection rules",
            true,
            &format!(
                "{} markers, {} classes, {} patterns",
                cfg.detection.markers.len(),
                cfg.detection.ad_classes.len(),
                cfg.detection.patterns.len()
            ),
        ),
        Err(e) => print_health_item("Detection rules", false, &format!("{e:#}")),
    }

    let client = DataApiClient::from_config(&cfg.data_api);
    let api_ok = client.is_reachable();
    print_health_item(
        "Data API",
        api_ok,
        &if api_ok {
            format!("reachable at {}", client.base_url())
        } else {
            format!("not reachable at {}", client.base_url())
        },
    );

    let log = ActivityLog::from_config(&cfg.logging);
    match log.path() {
        Some(path) if path.exists() => print_health_item(
            "Activity log",
            true,
            &format!("{} events", log.read_all().len()),
        ),
        Some(_) => print_health_item("Activity log", true, "no log file yet"),
        None => print_health_item("Activity log", true, "disabled"),
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// dwellscope log
// ---------------------------------------------------------------------------

/// Print the most recent activity events.
pub fn run_log(limit: usize, format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    let log = ActivityLog::from_config(&cfg.logging);
    let events = log.read_recent(limit);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
        OutputFormat::Csv => {
            println!("timestamp,kind,subject,count,detail");
            for e in &events {
                println!(
                    "{},{},{},{},{}",
                    e.timestamp,
                    e.kind,
                    csv_field(&e.subject),
                    e.count.map(|c| c.to_string()).unwrap_or_default(),
                    csv_field(e.detail.as_deref().unwrap_or("")),
                );
            }
        }
        OutputFormat::Table => {
            if events.is_empty() {
                println!("{}", "No activity recorded yet.".yellow());
                return Ok(());
            }
            for e in &events {
                let when = chrono::DateTime::parse_from_rfc3339(&e.timestamp)
                    .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|_| e.timestamp.clone());
                let extra = match (&e.count, &e.detail) {
                    (_, Some(d)) => d.yellow().to_string(),
                    (Some(c), None) => format!("{c} records").dimmed().to_string(),
                    (None, None) => String::new(),
                };
                println!(
                    "  {} {:<15} {:<30} {}",
                    when.dimmed(),
                    e.kind,
                    truncate(&e.subject, 30),
                    extra
                );
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// dwellscope config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective dwellscope Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.dwellscope/config.toml", global_exists);
    print_source(".dwellscope.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "DWELLSCOPE_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.dwellscope/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("광고 배너입니다", 3), "광고…");
    }

    #[test]
    fn test_csv_field() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::from_str_opt(Some("unknown")),
            OutputFormat::Table
        );
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280.0, 720.0));
        assert_eq!(parse_size("640 X 480").unwrap(), (640.0, 480.0));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_source_spec_flags() {
        assert_eq!(
            SourceSpec::from_flags(Some("1".into()), None, None).unwrap(),
            SourceSpec::Session("1".into())
        );
        assert!(SourceSpec::from_flags(None, None, None).is_err());
        assert!(SourceSpec::from_flags(Some("1".into()), Some("u".into()), None).is_err());
    }

    #[test]
    fn test_fetch_source_from_file_logs_event() {
        let dir = std::env::temp_dir().join(format!("dwellscope-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("batch.json");
        fs::write(&file, r#"{"elements": [{"domID": "a", "duration": 250}]}"#).unwrap();
        let log = ActivityLog::at(dir.join("activity.jsonl"));

        let (source, elements, summary) =
            fetch_source(&DwellConfig::default(), &SourceSpec::File(file.clone()), &log).unwrap();
        assert_eq!(source, DataSource::File(file.display().to_string()));
        assert_eq!(elements.len(), 1);
        assert!(summary.is_none());

        let events = log.read_all();
        assert_eq!(events.last().map(|e| e.kind.as_str()), Some("load_file"));
        assert_eq!(events.last().and_then(|e| e.count), Some(1));
    }

    #[test]
    fn test_heatmap_file_name() {
        assert_eq!(heatmap_file_name("42"), "heatmap_session_42.png");
        assert_eq!(heatmap_file_name("a/b"), "heatmap_session_a_b.png");
    }

    #[test]
    fn test_save_heatmap_unavailable_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("dwellscope-heatmap-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let out = dir.join("map.png");
        let log = ActivityLog::at(dir.join("activity.jsonl"));
        let client = DataApiClient::from_config(&crate::config::schema::DataApiConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 200,
        });

        let saved = save_heatmap(&client, "7", Some(&out), &log).unwrap();
        assert!(saved.is_none());
        assert!(!out.exists());
        let events = log.read_all();
        assert_eq!(events.last().map(|e| e.kind.as_str()), Some("fetch_heatmap"));
        assert_eq!(
            events.last().and_then(|e| e.detail.as_deref()),
            Some("unavailable")
        );
    }
}

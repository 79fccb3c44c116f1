//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to an API endpoint and returns a response with
//! JSON, SVG or PNG content. Session endpoints share one loaded batch: a
//! request for the session already in the dashboard state reuses it, any
//! other session is fetched first.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tiny_http::{Response, StatusCode};

use crate::analytics::aggregate::{DomAggregate, HourlyActivity, hourly_activity};
use crate::analytics::charts::{AverageBar, build_average_series};
use crate::analytics::events::ActivityEvent;
use crate::config;
use crate::detect::FlagDetector;
use crate::highlight::{HighlightRect, ImageGeometry};
use crate::state::DataSource;

use super::{HttpResponse, WebContext, content_type, not_found, query_param};

// ---------------------------------------------------------------------------
// JSON response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SessionsResponse {
    user_id: String,
    sessions: Vec<String>,
}

#[derive(Serialize)]
struct SummaryResponse<'a> {
    session_id: &'a str,
    summary: Option<&'a str>,
    total_seconds: f64,
    element_count: usize,
    elements: Vec<DomAggregate>,
}

#[derive(Serialize)]
struct HighlightResponse {
    highlight: Option<HighlightRect>,
    ttl_ms: u64,
}

#[derive(Serialize)]
struct UrlsResponse {
    urls: Vec<String>,
}

#[derive(Serialize)]
struct UrlStatsResponse {
    url: String,
    element_count: usize,
    averages: Vec<AverageBar>,
    hourly: Vec<HourlyActivity>,
}

/// Config API response: the full config as a JSON value plus the raw TOML.
#[derive(Serialize)]
struct ConfigResponse {
    config: config::schema::DwellConfig,
    toml_text: String,
}

/// Config update request: a list of key-value pairs.
#[derive(serde::Deserialize)]
struct ConfigUpdateRequest {
    updates: Vec<ConfigKeyValue>,
}

#[derive(serde::Deserialize)]
struct ConfigKeyValue {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct HealthResponse {
    data_api_url: String,
    data_api_reachable: bool,
    detection_ok: bool,
    config_exists: bool,
    log_exists: bool,
    loaded_source: Option<DataSource>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON success response.
fn json_response<T: Serialize>(data: &T) -> Result<HttpResponse> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(Response::from_data(body.into_bytes())
        .with_header(content_type("application/json; charset=utf-8"))
        .with_status_code(StatusCode(200)))
}

fn svg_response(svg: &str) -> HttpResponse {
    Response::from_data(svg.as_bytes().to_vec())
        .with_header(content_type("image/svg+xml"))
        .with_status_code(StatusCode(200))
}

/// Parse a finite numeric query parameter.
fn number_param(url: &str, key: &str) -> Result<f64> {
    let raw = query_param(url, key).with_context(|| format!("missing query parameter {key}"))?;
    let value: f64 = raw
        .parse()
        .with_context(|| format!("query parameter {key} is not a number: {raw}"))?;
    if !value.is_finite() {
        bail!("query parameter {key} is not finite: {raw}");
    }
    Ok(value)
}

/// Make `sid` the loaded session, fetching it unless it already is.
fn ensure_session(ctx: &mut WebContext, sid: &str) -> Result<()> {
    let wanted = DataSource::Session(sid.to_string());
    if ctx.state.source() == Some(&wanted) {
        return Ok(());
    }

    match ctx.client.session_data(sid) {
        Ok(data) => {
            ctx.log.record(
                &ActivityEvent::new("fetch_session", sid).with_count(data.elements.len()),
            );
            ctx.state.load(wanted, data.elements, data.summary);
            Ok(())
        }
        Err(e) => {
            ctx.log
                .record(&ActivityEvent::new("fetch_session", sid).with_detail(e.to_string()));
            Err(e)
        }
    }
}

/// Replace the pie selection with the comma-separated `select` parameter.
fn apply_selection(ctx: &mut WebContext, url: &str) {
    let wanted: Vec<String> = query_param(url, "select")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let selection = ctx.state.selection().clone();
    let mut flips: Vec<String> = ctx
        .state
        .aggregate()
        .iter()
        .filter(|e| selection.contains(&e.dom_id) && !wanted.contains(&e.dom_id))
        .map(|e| e.dom_id.clone())
        .collect();
    flips.extend(wanted.into_iter().filter(|id| !selection.contains(id)));

    for id in &flips {
        ctx.state.toggle_selection(id);
    }
}

// ---------------------------------------------------------------------------
// API Handlers: sessions
// ---------------------------------------------------------------------------

/// `GET /api/sessions/{user}`: session IDs for a user.
pub fn get_sessions(ctx: &mut WebContext, user_id: &str) -> Result<HttpResponse> {
    let sessions = ctx.client.list_sessions(user_id);
    match &sessions {
        Ok(s) => ctx
            .log
            .record(&ActivityEvent::new("fetch_sessions", user_id).with_count(s.len())),
        Err(e) => ctx
            .log
            .record(&ActivityEvent::new("fetch_sessions", user_id).with_detail(e.to_string())),
    }

    json_response(&SessionsResponse {
        user_id: user_id.to_string(),
        sessions: sessions?,
    })
}

/// `GET /api/session/{sid}/summary`: aggregate table plus summary text.
pub fn get_session_summary(ctx: &mut WebContext, sid: &str) -> Result<HttpResponse> {
    ensure_session(ctx, sid)?;
    let aggregate = ctx.state.aggregate();

    json_response(&SummaryResponse {
        session_id: sid,
        summary: ctx.state.summary(),
        total_seconds: aggregate.total_seconds(),
        element_count: ctx.state.elements().len(),
        elements: aggregate.entries,
    })
}

/// `GET /api/session/{sid}/timeline`: timeline geometry.
pub fn get_session_timeline(ctx: &mut WebContext, sid: &str) -> Result<HttpResponse> {
    ensure_session(ctx, sid)?;
    json_response(&ctx.state.layout())
}

/// `GET /api/session/{sid}/timeline.svg`: rendered timeline.
pub fn get_session_timeline_svg(ctx: &mut WebContext, sid: &str) -> Result<HttpResponse> {
    ensure_session(ctx, sid)?;
    Ok(svg_response(ctx.state.render_timeline()))
}

/// `GET /api/session/{sid}/charts?select=a,b`: bar and pie series.
pub fn get_session_charts(ctx: &mut WebContext, sid: &str, url: &str) -> Result<HttpResponse> {
    ensure_session(ctx, sid)?;
    apply_selection(ctx, url);
    json_response(&ctx.state.chart_series())
}

/// `GET /api/session/{sid}/bar.svg`
pub fn get_session_bar_svg(ctx: &mut WebContext, sid: &str, url: &str) -> Result<HttpResponse> {
    ensure_session(ctx, sid)?;
    apply_selection(ctx, url);
    ctx.state.render_charts();
    Ok(svg_response(ctx.state.bar_svg().unwrap_or_default()))
}

/// `GET /api/session/{sid}/pie.svg?select=a,b`
pub fn get_session_pie_svg(ctx: &mut WebContext, sid: &str, url: &str) -> Result<HttpResponse> {
    ensure_session(ctx, sid)?;
    apply_selection(ctx, url);
    ctx.state.render_charts();
    Ok(svg_response(ctx.state.pie_svg().unwrap_or_default()))
}

/// `GET /api/session/{sid}/highlight?dom_id=..&nw=..&nh=..&dw=..&dh=..[&fit=..]`
///
/// `nw`/`nh` are the image's natural size, `dw`/`dh` its displayed box.
/// A `domID` that cannot be highlighted answers `{"highlight": null}`.
pub fn get_session_highlight(ctx: &mut WebContext, sid: &str, url: &str) -> Result<HttpResponse> {
    let dom_id = query_param(url, "dom_id").context("missing query parameter dom_id")?;
    let natural = (number_param(url, "nw")?, number_param(url, "nh")?);
    let display = (number_param(url, "dw")?, number_param(url, "dh")?);
    let fit = match query_param(url, "fit") {
        Some(raw) => config::parse_fit_mode(&raw)
            .with_context(|| format!("invalid fit mode: {raw}"))?,
        None => ctx.state.config().highlight.fit,
    };

    ensure_session(ctx, sid)?;
    let geometry = ImageGeometry::new(natural, display, fit);
    let highlight = ctx.state.highlight(&dom_id, &geometry, Instant::now());

    let event = ActivityEvent::new("highlight", &dom_id);
    ctx.log.record(&match &highlight {
        Some(_) => event.with_count(1),
        None => event.with_detail("no highlight"),
    });

    json_response(&HighlightResponse {
        highlight,
        ttl_ms: ctx.state.config().highlight.ttl_ms,
    })
}

/// `GET /api/session/{sid}/heatmap`: PNG passthrough; 404 when unavailable.
pub fn get_session_heatmap(ctx: &mut WebContext, sid: &str) -> HttpResponse {
    match ctx.client.heatmap(sid) {
        Some(bytes) => {
            ctx.log
                .record(&ActivityEvent::new("fetch_heatmap", sid).with_count(bytes.len()));
            Response::from_data(bytes)
                .with_header(content_type("image/png"))
                .with_status_code(StatusCode(200))
        }
        None => {
            ctx.log
                .record(&ActivityEvent::new("fetch_heatmap", sid).with_detail("unavailable"));
            not_found()
        }
    }
}

// ---------------------------------------------------------------------------
// API Handlers: per-URL stats
// ---------------------------------------------------------------------------

/// `GET /api/stats/urls`
pub fn get_stats_urls(ctx: &mut WebContext) -> Result<HttpResponse> {
    let urls = ctx.client.stats_urls()?;
    json_response(&UrlsResponse { urls })
}

/// `GET /api/stats/elements?url=..`: averages and hourly activity.
pub fn get_stats_elements(ctx: &mut WebContext, url: &str) -> Result<HttpResponse> {
    let target = query_param(url, "url").context("missing query parameter url")?;

    let elements = ctx.client.elements_by_url(&target);
    match &elements {
        Ok(els) => ctx
            .log
            .record(&ActivityEvent::new("fetch_url", &target).with_count(els.len())),
        Err(e) => ctx
            .log
            .record(&ActivityEvent::new("fetch_url", &target).with_detail(e.to_string())),
    }
    let elements = elements?;

    ctx.state.load(DataSource::Url(target.clone()), elements, None);
    let averages = build_average_series(&ctx.state.aggregate());

    json_response(&UrlStatsResponse {
        url: target,
        element_count: ctx.state.elements().len(),
        averages,
        hourly: hourly_activity(ctx.state.elements()),
    })
}

// ---------------------------------------------------------------------------
// API Handlers: configuration and health
// ---------------------------------------------------------------------------

/// `GET /api/config`: current effective configuration.
pub fn get_config() -> Result<HttpResponse> {
    let cfg = config::load();
    let toml_text = toml::to_string_pretty(&cfg).unwrap_or_default();

    json_response(&ConfigResponse {
        config: cfg,
        toml_text,
    })
}

/// `PUT /api/config`: update configuration keys.
///
/// Expects JSON body: `{ "updates": [{ "key": "charts.mode", "value": "flagging" }] }`.
/// Changes apply to the next `serve` run.
pub fn put_config(body: &str) -> Result<HttpResponse> {
    let req: ConfigUpdateRequest =
        serde_json::from_str(body).context("invalid JSON in config update request")?;

    let mut errors: Vec<String> = Vec::new();
    let mut applied: Vec<String> = Vec::new();

    for kv in &req.updates {
        match config::set_config_value(&kv.key, &kv.value) {
            Ok(()) => applied.push(format!("{} = {}", kv.key, kv.value)),
            Err(e) => errors.push(format!("{}: {e:#}", kv.key)),
        }
    }

    json_response(&serde_json::json!({
        "applied": applied,
        "errors": errors,
        "success": errors.is_empty(),
    }))
}

/// `POST /api/config/reset`: reset config to defaults.
pub fn post_config_reset() -> Result<HttpResponse> {
    config::reset_config().context("failed to reset config")?;

    json_response(&serde_json::json!({
        "success": true,
        "message": "Configuration reset to defaults",
    }))
}

/// `GET /api/health`: system health summary.
pub fn get_health(ctx: &mut WebContext) -> Result<HttpResponse> {
    let cfg = ctx.state.config();

    json_response(&HealthResponse {
        data_api_url: ctx.client.base_url().to_string(),
        data_api_reachable: ctx.client.is_reachable(),
        detection_ok: FlagDetector::from_config(&cfg.detection).is_ok(),
        config_exists: config::global_config_file().is_some_and(|p| p.exists()),
        log_exists: ctx.log.path().is_some_and(|p| p.exists()),
        loaded_source: ctx.state.source().cloned(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::events::ActivityLog;
    use crate::config::schema::DwellConfig;
    use crate::model::{InteractionElement, Rect};

    fn ctx_with_session(sid: &str) -> WebContext {
        let mut ctx = WebContext::new(DwellConfig::default()).unwrap();
        ctx.log = ActivityLog::disabled();
        let elements = vec![
            InteractionElement {
                dom_id_raw: "nav".into(),
                duration: 2000.0,
                rect: Some(Rect {
                    x: 10.0,
                    y: 10.0,
                    width: 50.0,
                    height: 20.0,
                }),
                ..Default::default()
            },
            InteractionElement {
                dom_id_raw: "footer".into(),
                duration: 1000.0,
                ..Default::default()
            },
        ];
        ctx.state
            .load(DataSource::Session(sid.to_string()), elements, Some("ok".into()));
        ctx
    }

    fn body_of(resp: HttpResponse) -> String {
        let mut out = String::new();
        let mut reader = resp.into_reader();
        std::io::Read::read_to_string(&mut reader, &mut out).unwrap();
        out
    }

    #[test]
    fn number_param_requires_numeric_value() {
        assert_eq!(number_param("/x?nw=12.5", "nw").unwrap(), 12.5);
        assert!(number_param("/x?nw=abc", "nw").is_err());
        assert!(number_param("/x", "nw").is_err());
        assert!(number_param("/x?dw=NaN", "dw").is_err());
        assert!(number_param("/x?dh=inf", "dh").is_err());
    }

    #[test]
    fn loaded_session_is_reused() {
        let mut ctx = ctx_with_session("s1");
        let resp = get_session_summary(&mut ctx, "s1").unwrap();
        let body = body_of(resp);
        assert!(body.contains("\"session_id\":\"s1\""));
        assert!(body.contains("\"total_seconds\":3.0"));
        assert!(body.contains("\"summary\":\"ok\""));
    }

    #[test]
    fn highlight_endpoint_maps_rect() {
        let mut ctx = ctx_with_session("s1");
        let url = "/api/session/s1/highlight?dom_id=nav&nw=100&nh=100&dw=200&dh=200";
        let body = body_of(get_session_highlight(&mut ctx, "s1", url).unwrap());
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["highlight"]["x"], 20.0);
        assert_eq!(value["highlight"]["width"], 100.0);
        assert_eq!(value["ttl_ms"], 3000);
    }

    #[test]
    fn highlight_without_rect_is_null() {
        let mut ctx = ctx_with_session("s1");
        let url = "/api/session/s1/highlight?dom_id=footer&nw=100&nh=100&dw=100&dh=100";
        let body = body_of(get_session_highlight(&mut ctx, "s1", url).unwrap());
        assert!(body.contains("\"highlight\":null"));
    }

    #[test]
    fn highlight_rejects_missing_geometry() {
        let mut ctx = ctx_with_session("s1");
        assert!(get_session_highlight(&mut ctx, "s1", "/h?dom_id=nav&nw=1").is_err());
    }

    #[test]
    fn selection_follows_query() {
        let mut ctx = ctx_with_session("s1");
        apply_selection(&mut ctx, "/c?select=nav");
        assert!(ctx.state.selection().contains("nav"));
        apply_selection(&mut ctx, "/c?select=footer");
        assert!(!ctx.state.selection().contains("nav"));
        assert!(ctx.state.selection().contains("footer"));
        apply_selection(&mut ctx, "/c");
        assert!(ctx.state.selection().is_empty());
    }

    #[test]
    fn timeline_svg_is_svg() {
        let mut ctx = ctx_with_session("s1");
        let resp = get_session_timeline_svg(&mut ctx, "s1").unwrap();
        assert_eq!(resp.status_code().0, 200);
        assert!(body_of(resp).starts_with("<svg"));
    }

    #[test]
    fn config_update_request_deserializes() {
        let json = r#"{"updates": [{"key": "charts.mode", "value": "flagging"}]}"#;
        let req: ConfigUpdateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.updates.len(), 1);
        assert_eq!(req.updates[0].key, "charts.mode");
        assert_eq!(req.updates[0].value, "flagging");
    }
}

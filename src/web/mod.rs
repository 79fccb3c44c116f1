//! Embedded web dashboard for dwellscope.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page session review dashboard
//! - JSON / SVG / PNG API endpoints backed by the data API
//!
//! Launched via `dwellscope serve` (default: `http://127.0.0.1:9750`).

mod api;
mod frontend;

use std::io::Cursor;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::analytics::events::{ActivityEvent, ActivityLog};
use crate::client::DataApiClient;
use crate::config::schema::DwellConfig;
use crate::state::DashboardState;

pub(crate) type HttpResponse = Response<Cursor<Vec<u8>>>;

/// Everything a request handler may touch. Requests are handled one at a
/// time, so the dashboard state is owned here without locking.
pub(crate) struct WebContext {
    pub state: DashboardState,
    pub client: DataApiClient,
    pub log: ActivityLog,
}

impl WebContext {
    pub fn new(config: DwellConfig) -> Result<Self> {
        let client = DataApiClient::from_config(&config.data_api);
        let log = ActivityLog::from_config(&config.logging);
        let state = DashboardState::new(config)?;
        Ok(Self { state, client, log })
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the dashboard server on `addr`.
///
/// Blocks the current thread. Handles requests sequentially. Errors are
/// reported per request without stopping the server.
pub fn serve(config: DwellConfig, addr: &str) -> Result<()> {
    let open = config.web.open_browser;
    let mut ctx = WebContext::new(config)?;

    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    println!("dwellscope dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    if open {
        let _ = open_browser(&format!("http://{addr}"));
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let body = if matches!(method, Method::Put | Method::Post | Method::Patch) {
            let mut buf = String::new();
            let _ = request.as_reader().read_to_string(&mut buf);
            Some(buf)
        } else {
            None
        };

        let result = dispatch(&mut ctx, &method, &url, body.as_deref());

        let status = match result {
            Ok(resp) => {
                let status = resp.status_code().0;
                let _ = request.respond(resp);
                status
            }
            Err(e) => {
                eprintln!("[dwellscope] {method} {url}: {e:#}");
                let _ = request.respond(error_response(500, &format!("{e:#}")));
                500
            }
        };

        ctx.log.record(
            &ActivityEvent::new("http", &format!("{method} {url}")).with_detail(status.to_string()),
        );

        println!(
            "{} {} {} {}",
            method,
            url,
            status,
            chrono::Local::now().format("%H:%M:%S")
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Dispatch an incoming request to the appropriate handler.
fn dispatch(
    ctx: &mut WebContext,
    method: &Method,
    url: &str,
    body: Option<&str>,
) -> Result<HttpResponse> {
    let path = url.split('?').next().unwrap_or(url);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        // Frontend
        (&Method::Get, [""]) | (&Method::Get, ["index.html"]) => Ok(serve_frontend()),

        // API: sessions
        (&Method::Get, ["api", "sessions", user]) => api::get_sessions(ctx, &decode_component(user)),
        (&Method::Get, ["api", "session", sid, view]) => {
            let sid = decode_component(sid);
            match *view {
                "summary" => api::get_session_summary(ctx, &sid),
                "timeline" => api::get_session_timeline(ctx, &sid),
                "timeline.svg" => api::get_session_timeline_svg(ctx, &sid),
                "charts" => api::get_session_charts(ctx, &sid, url),
                "bar.svg" => api::get_session_bar_svg(ctx, &sid, url),
                "pie.svg" => api::get_session_pie_svg(ctx, &sid, url),
                "highlight" => api::get_session_highlight(ctx, &sid, url),
                "heatmap" => Ok(api::get_session_heatmap(ctx, &sid)),
                _ => Ok(not_found()),
            }
        }

        // API: per-URL stats
        (&Method::Get, ["api", "stats", "urls"]) => api::get_stats_urls(ctx),
        (&Method::Get, ["api", "stats", "elements"]) => api::get_stats_elements(ctx, url),

        // API: configuration
        (&Method::Get, ["api", "config"]) => api::get_config(),
        (&Method::Put, ["api", "config"]) => api::put_config(body.unwrap_or("{}")),
        (&Method::Post, ["api", "config", "reset"]) => api::post_config_reset(),

        // API: health
        (&Method::Get, ["api", "health"]) => api::get_health(ctx),

        _ => Ok(not_found()),
    }
}

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// Value of `key` in the URL's query string, percent-decoded.
pub(crate) fn query_param(url: &str, key: &str) -> Option<String> {
    url.split_once('?')?.1.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_component(k) == key).then(|| decode_component(v))
    })
}

/// Decode `%XX` escapes and `+` as space. Invalid escapes pass through.
pub(crate) fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the embedded single-page frontend.
fn serve_frontend() -> HttpResponse {
    let html = frontend::INDEX_HTML;
    Response::from_data(html.as_bytes().to_vec())
        .with_header(content_type("text/html; charset=utf-8"))
        .with_status_code(StatusCode(200))
}

/// 404 response.
pub(crate) fn not_found() -> HttpResponse {
    error_response(404, "not found")
}

/// `{"error": ..}` with the given status.
pub(crate) fn error_response(status: u16, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::from_data(body.into_bytes())
        .with_header(content_type("application/json; charset=utf-8"))
        .with_status_code(StatusCode(status))
}

/// Content type header for a static MIME string.
pub(crate) fn content_type(mime: &'static str) -> Header {
    Header::from_bytes("Content-Type", mime).expect("static ASCII header")
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_decodes_values() {
        let url = "/api/stats/elements?url=https%3A%2F%2Fshop.test%2Fa%3Fb%3D1&x=1";
        assert_eq!(
            query_param(url, "url").as_deref(),
            Some("https://shop.test/a?b=1")
        );
        assert_eq!(query_param(url, "x").as_deref(), Some("1"));
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("/api/health", "x"), None);
    }

    #[test]
    fn decode_component_handles_plus_and_bad_escapes() {
        assert_eq!(decode_component("a+b"), "a b");
        assert_eq!(decode_component("100%"), "100%");
        assert_eq!(decode_component("%zz"), "%zz");
        assert_eq!(decode_component("%EA%B4%91%EA%B3%A0"), "광고");
    }

    #[test]
    fn decode_component_keeps_escaped_plus_and_bad_utf8() {
        assert_eq!(decode_component("1%2B1"), "1+1");
        assert_eq!(decode_component("%FFok"), "\u{FFFD}ok");
    }

    #[test]
    fn unknown_routes_are_404() {
        let mut ctx = WebContext::new(DwellConfig::default()).unwrap();
        let resp = dispatch(&mut ctx, &Method::Get, "/nope", None).unwrap();
        assert_eq!(resp.status_code().0, 404);
        let resp = dispatch(&mut ctx, &Method::Get, "/api/session/1/bogus", None).unwrap();
        assert_eq!(resp.status_code().0, 404);
    }

    #[test]
    fn root_serves_html() {
        let mut ctx = WebContext::new(DwellConfig::default()).unwrap();
        let resp = dispatch(&mut ctx, &Method::Get, "/", None).unwrap();
        assert_eq!(resp.status_code().0, 200);
    }
}

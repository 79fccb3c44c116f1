//! Embedded HTML/CSS/JS frontend for the dwellscope dashboard.
//!
//! The entire page is compiled into the binary as a string constant.
//! Charts and the timeline arrive as server-rendered SVG; the page only
//! places them and draws the highlight box over the heatmap.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>dwellscope</title>
<style>
:root {
  --bg: #f7f8fa;
  --surface: #ffffff;
  --border: #dde1e6;
  --text: #1f2328;
  --text-muted: #656d76;
  --accent: #0969da;
  --green: #1a7f37;
  --yellow: #9a6700;
  --red: #cf222e;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
  --mono: 'SF Mono', 'Cascadia Code', 'Fira Code', monospace;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body { background: var(--bg); color: var(--text); font-family: var(--font); font-size: 14px; line-height: 1.5; }

.app { max-width: 1280px; margin: 0 auto; padding: 24px; }

header { display: flex; align-items: center; justify-content: space-between; margin-bottom: 24px; padding-bottom: 16px; border-bottom: 1px solid var(--border); }
header h1 { font-size: 22px; font-weight: 600; }
header h1 .logo { color: var(--accent); font-family: var(--mono); }
header .subtitle { color: var(--text-muted); font-size: 13px; }

.badge { display: inline-flex; padding: 4px 10px; border-radius: 12px; font-size: 12px; border: 1px solid var(--border); }
.badge.ok { border-color: var(--green); color: var(--green); }
.badge.err { border-color: var(--red); color: var(--red); }

nav { display: flex; gap: 4px; margin-bottom: 24px; background: var(--surface); border-radius: var(--radius); padding: 4px; border: 1px solid var(--border); }
nav button { flex: 1; padding: 8px 16px; border: none; border-radius: 6px; background: transparent; color: var(--text-muted); font-weight: 500; cursor: pointer; }
nav button.active { background: var(--accent); color: #fff; }

.panel { display: none; }
.panel.active { display: block; }

.card { background: var(--surface); border: 1px solid var(--border); border-radius: var(--radius); padding: 20px; margin-bottom: 16px; }
.card h2 { font-size: 16px; font-weight: 600; margin-bottom: 12px; }
.row { display: flex; gap: 16px; align-items: flex-start; }
.row > .card { flex: 1; min-width: 0; }

input, select { padding: 6px 10px; border: 1px solid var(--border); border-radius: 6px; font-size: 13px; }
button.primary { padding: 6px 14px; border: none; border-radius: 6px; background: var(--accent); color: #fff; cursor: pointer; }

.list { display: flex; flex-wrap: wrap; gap: 6px; margin-top: 12px; }
.list button { padding: 4px 10px; border: 1px solid var(--border); border-radius: 12px; background: var(--surface); cursor: pointer; font-family: var(--mono); font-size: 12px; }
.list button.active { border-color: var(--accent); color: var(--accent); }

table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid var(--border); }
th.num, td.num { text-align: right; }
tr.flagged td { color: var(--red); }
tbody tr { cursor: pointer; }
tbody tr:hover { background: #f0f4f8; }

.scroll { overflow-x: auto; }
.summary { white-space: pre-wrap; color: var(--text-muted); }
.empty { color: var(--text-muted); padding: 12px 0; }

.download { margin-left: 8px; font-size: 12px; font-weight: normal; color: var(--accent); }
.heatmap { position: relative; display: inline-block; max-width: 100%; }
.heatmap img { display: block; max-width: 100%; }
.heatmap .hl { position: absolute; border: 3px solid var(--red); border-radius: 4px; pointer-events: none; display: none; }

.toast { position: fixed; bottom: 20px; right: 20px; padding: 10px 16px; background: var(--text); color: #fff; border-radius: 6px; opacity: 0; transition: opacity 0.2s; }
.toast.show { opacity: 1; }
.toast.error { background: var(--red); }
</style>
</head>
<body>
<div class="app">

  <header>
    <div>
      <h1><span class="logo">dwellscope</span></h1>
      <div class="subtitle">Session review: dwell time, timeline and element highlights</div>
    </div>
    <div id="health"></div>
  </header>

  <nav id="nav">
    <button class="active" data-panel="sessions">Sessions</button>
    <button data-panel="pages">Page Stats</button>
    <button data-panel="config">Configuration</button>
  </nav>

  <!-- Sessions Panel -->
  <div class="panel active" id="panel-sessions">
    <div class="card">
      <h2>User</h2>
      <input id="user-id" placeholder="user id">
      <button class="primary" id="load-sessions">Load sessions</button>
      <div class="list" id="session-list"></div>
    </div>

    <div id="session-view" style="display:none">
      <div class="card">
        <h2>Summary <span id="session-label" class="subtitle"></span></h2>
        <div class="summary" id="summary-text"></div>
      </div>

      <div class="card">
        <h2>Timeline</h2>
        <div class="scroll" id="timeline"></div>
      </div>

      <div class="row">
        <div class="card">
          <h2>Duration by Element</h2>
          <div id="bar-chart"></div>
        </div>
        <div class="card">
          <h2>Share of Session <span class="subtitle">(click a row to select)</span></h2>
          <div id="pie-chart"></div>
        </div>
      </div>

      <div class="row">
        <div class="card">
          <h2>Elements</h2>
          <table>
            <thead><tr><th>domID</th><th class="num">Total (s)</th><th class="num">Avg (ms)</th><th class="num">Visits</th></tr></thead>
            <tbody id="element-rows"></tbody>
          </table>
        </div>
        <div class="card">
          <h2>Heatmap <select id="fit"><option value="stretch">stretch</option><option value="contain">contain</option></select>
            <a id="heatmap-download" class="download" download style="display:none">Download</a></h2>
          <div class="heatmap" id="heatmap-box">
            <img id="heatmap" alt="">
            <div class="hl" id="hl"></div>
          </div>
          <div class="empty" id="heatmap-empty" style="display:none">No heatmap for this session.</div>
        </div>
      </div>
    </div>
  </div>

  <!-- Page Stats Panel -->
  <div class="panel" id="panel-pages">
    <div class="card">
      <h2>Recorded Pages</h2>
      <div class="list" id="url-list"></div>
    </div>
    <div class="card" id="url-view" style="display:none">
      <h2 id="url-label"></h2>
      <table>
        <thead><tr><th>domID</th><th class="num">Avg duration (ms)</th><th class="num">Avg visits</th></tr></thead>
        <tbody id="url-rows"></tbody>
      </table>
      <h2 style="margin-top:16px">Activity by Hour</h2>
      <div class="scroll" id="hourly"></div>
    </div>
  </div>

  <!-- Config Panel -->
  <div class="panel" id="panel-config">
    <div class="card">
      <h2>Effective Configuration</h2>
      <pre id="config-toml" style="font-family:var(--mono);font-size:12px"></pre>
    </div>
    <div class="card">
      <h2>Set a value</h2>
      <input id="cfg-key" placeholder="charts.mode">
      <input id="cfg-value" placeholder="flagging">
      <button class="primary" id="cfg-save">Save</button>
      <button class="primary" id="cfg-reset">Reset to defaults</button>
    </div>
  </div>

  <div class="toast" id="toast"></div>
</div>

<script>
// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------
let currentSession = null;
let selection = new Set();
let hlTimer = null;

// ---------------------------------------------------------------------------
// API helpers
// ---------------------------------------------------------------------------
async function api(method, path, body) {
  const opts = { method, headers: {} };
  if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const data = await res.json();
  if (!res.ok) throw new Error(data.error || res.statusText);
  return data;
}

async function svg(path) {
  const res = await fetch(path);
  if (!res.ok) throw new Error(res.statusText);
  return res.text();
}

function toast(msg, isError) {
  const el = document.getElementById('toast');
  el.textContent = msg;
  el.className = 'toast show' + (isError ? ' error' : '');
  setTimeout(() => el.className = 'toast', 3000);
}

function esc(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

function sid() { return encodeURIComponent(currentSession); }

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------
document.getElementById('nav').addEventListener('click', e => {
  const panel = e.target.dataset && e.target.dataset.panel;
  if (!panel) return;
  document.querySelectorAll('nav button').forEach(b => b.classList.toggle('active', b === e.target));
  document.querySelectorAll('.panel').forEach(p => p.classList.toggle('active', p.id === 'panel-' + panel));
  if (panel === 'pages') loadUrls();
  if (panel === 'config') loadConfig();
});

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------
document.getElementById('load-sessions').addEventListener('click', async () => {
  const user = document.getElementById('user-id').value.trim();
  if (!user) return;
  const list = document.getElementById('session-list');
  list.innerHTML = '';
  try {
    const data = await api('GET', '/api/sessions/' + encodeURIComponent(user));
    if (!data.sessions.length) list.innerHTML = '<span class="empty">No sessions.</span>';
    data.sessions.forEach(s => {
      const b = document.createElement('button');
      b.textContent = s;
      b.onclick = () => {
        list.querySelectorAll('button').forEach(x => x.classList.toggle('active', x === b));
        openSession(s);
      };
      list.appendChild(b);
    });
  } catch (err) {
    toast(err.message, true);
  }
});

async function openSession(id) {
  currentSession = id;
  selection = new Set();
  try {
    const summary = await api('GET', '/api/session/' + sid() + '/summary');
    document.getElementById('session-view').style.display = '';
    document.getElementById('session-label').textContent =
      id + ' · ' + summary.total_seconds.toFixed(1) + 's · ' + summary.element_count + ' records';
    document.getElementById('summary-text').textContent = summary.summary || 'No summary available.';
    renderRows(summary.elements);
    document.getElementById('timeline').innerHTML = await svg('/api/session/' + sid() + '/timeline.svg');
    document.getElementById('bar-chart').innerHTML = await svg('/api/session/' + sid() + '/bar.svg');
    await refreshPie();
    loadHeatmap();
  } catch (err) {
    toast(err.message, true);
  }
}

function renderRows(elements) {
  const tbody = document.getElementById('element-rows');
  tbody.innerHTML = elements.map(e => `
    <tr data-id="${esc(e.dom_id)}" class="${e.flagged ? 'flagged' : ''}">
      <td>${esc(e.dom_id)}</td>
      <td class="num">${e.total_duration_seconds.toFixed(2)}</td>
      <td class="num">${e.average_duration_ms.toFixed(0)}</td>
      <td class="num">${e.average_visit_count.toFixed(1)}</td>
    </tr>`).join('');
  tbody.querySelectorAll('tr').forEach(tr => tr.onclick = () => {
    const id = tr.dataset.id;
    if (selection.has(id)) selection.delete(id); else selection.add(id);
    refreshPie();
    highlight(id);
  });
}

async function refreshPie() {
  const select = encodeURIComponent([...selection].join(','));
  document.getElementById('pie-chart').innerHTML =
    await svg('/api/session/' + sid() + '/pie.svg?select=' + select);
}

// ---------------------------------------------------------------------------
// Heatmap + highlight
// ---------------------------------------------------------------------------
function loadHeatmap() {
  const img = document.getElementById('heatmap');
  const empty = document.getElementById('heatmap-empty');
  const link = document.getElementById('heatmap-download');
  const src = '/api/session/' + sid() + '/heatmap';
  document.getElementById('hl').style.display = 'none';
  link.href = src;
  link.download = 'heatmap_session_' + currentSession + '.png';
  img.onload = () => { img.style.display = ''; empty.style.display = 'none'; link.style.display = ''; };
  img.onerror = () => { img.style.display = 'none'; empty.style.display = ''; link.style.display = 'none'; };
  img.src = src;
}

async function highlight(domId) {
  const img = document.getElementById('heatmap');
  if (!img.naturalWidth) return;
  const fit = document.getElementById('fit').value;
  const q = new URLSearchParams({
    dom_id: domId, fit,
    nw: img.naturalWidth, nh: img.naturalHeight,
    dw: img.clientWidth, dh: img.clientHeight,
  });
  try {
    const data = await api('GET', '/api/session/' + sid() + '/highlight?' + q);
    const hl = document.getElementById('hl');
    if (!data.highlight) {
      toast('No highlight for ' + domId);
      return;
    }
    const h = data.highlight;
    Object.assign(hl.style, {
      left: h.x + 'px', top: h.y + 'px',
      width: h.width + 'px', height: h.height + 'px',
      display: 'block',
    });
    clearTimeout(hlTimer);
    hlTimer = setTimeout(() => hl.style.display = 'none', data.ttl_ms);
  } catch (err) {
    toast(err.message, true);
  }
}

// ---------------------------------------------------------------------------
// Page stats
// ---------------------------------------------------------------------------
async function loadUrls() {
  const list = document.getElementById('url-list');
  list.innerHTML = '';
  try {
    const data = await api('GET', '/api/stats/urls');
    if (!data.urls.length) list.innerHTML = '<span class="empty">No pages recorded.</span>';
    data.urls.forEach(u => {
      const b = document.createElement('button');
      b.textContent = u;
      b.onclick = () => openUrl(u);
      list.appendChild(b);
    });
  } catch (err) {
    toast(err.message, true);
  }
}

async function openUrl(url) {
  try {
    const data = await api('GET', '/api/stats/elements?url=' + encodeURIComponent(url));
    document.getElementById('url-view').style.display = '';
    document.getElementById('url-label').textContent = url + ' (' + data.element_count + ' records)';
    document.getElementById('url-rows').innerHTML = data.averages.map(a => `
      <tr><td>${esc(a.dom_id)}</td>
      <td class="num">${a.average_duration_ms.toFixed(0)}</td>
      <td class="num">${a.average_visit_count.toFixed(1)}</td></tr>`).join('');
    document.getElementById('hourly').innerHTML = hourlyTable(data.hourly);
  } catch (err) {
    toast(err.message, true);
  }
}

function hourlyTable(rows) {
  const hours = [...Array(24).keys()];
  const head = '<tr><th>domID</th>' + hours.map(h => `<th class="num">${h}</th>`).join('') + '</tr>';
  const body = rows.map(r => {
    const max = Math.max(1, ...r.counts);
    return `<tr><td>${esc(r.dom_id)}</td>` + r.counts.map(c =>
      `<td class="num" style="background:rgba(9,105,218,${(c / max * 0.6).toFixed(2)})">${c || ''}</td>`
    ).join('') + '</tr>';
  }).join('');
  return `<table><thead>${head}</thead><tbody>${body}</tbody></table>`;
}

// ---------------------------------------------------------------------------
// Config + health
// ---------------------------------------------------------------------------
async function loadConfig() {
  try {
    const data = await api('GET', '/api/config');
    document.getElementById('config-toml').textContent = data.toml_text;
  } catch (err) {
    toast(err.message, true);
  }
}

document.getElementById('cfg-save').addEventListener('click', async () => {
  const key = document.getElementById('cfg-key').value.trim();
  const value = document.getElementById('cfg-value').value.trim();
  if (!key) return;
  try {
    const res = await api('PUT', '/api/config', { updates: [{ key, value }] });
    if (res.success) toast('Saved. Restart the server to apply.');
    else toast(res.errors.join('; '), true);
    loadConfig();
  } catch (err) {
    toast(err.message, true);
  }
});

document.getElementById('cfg-reset').addEventListener('click', async () => {
  try {
    await api('POST', '/api/config/reset');
    toast('Configuration reset');
    loadConfig();
  } catch (err) {
    toast(err.message, true);
  }
});

async function loadHealth() {
  try {
    const h = await api('GET', '/api/health');
    document.getElementById('health').innerHTML = h.data_api_reachable
      ? `<span class="badge ok">data API ${esc(h.data_api_url)}</span>`
      : `<span class="badge err">data API unreachable</span>`;
  } catch (err) {
    document.getElementById('health').innerHTML = '<span class="badge err">offline</span>';
  }
}

loadHealth();
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_references_every_api_route() {
        for route in [
            "/api/sessions/",
            "/summary",
            "/timeline.svg",
            "/bar.svg",
            "/pie.svg",
            "/highlight?",
            "/heatmap",
            "/api/stats/urls",
            "/api/stats/elements?url=",
            "/api/config",
            "/api/health",
        ] {
            assert!(INDEX_HTML.contains(route), "missing {route}");
        }
    }

    #[test]
    fn page_offers_heatmap_download() {
        assert!(INDEX_HTML.contains(r#"id="heatmap-download""#));
        assert!(INDEX_HTML.contains("'heatmap_session_' + currentSession + '.png'"));
    }
}

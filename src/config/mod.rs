/// Configuration system for dwellscope.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::DwellConfig::default()`]
/// 2. **User global config**: `~/.dwellscope/config.toml`
/// 3. **Project local config**: `.dwellscope.toml` in the current directory
/// 4. **Environment variables**: `DWELLSCOPE_*` overrides (highest precedence)
///
/// Later layers override earlier ones at the key level: each file is parsed
/// as a raw TOML tree and merged table-by-table into the tree of the layers
/// below it, so a file that sets only `[highlight] fit` leaves every other
/// value untouched.
///
/// # Usage
///
/// ```rust,ignore
/// use dwellscope::config;
///
/// let cfg = config::load();
/// let client = DataApiClient::from_config(&cfg.data_api);
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::DwellConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. Malformed files are reported on stderr and skipped; loading never
/// fails.
pub fn load() -> DwellConfig {
    let mut tree = match toml::Value::try_from(DwellConfig::default()) {
        Ok(tree) => tree,
        Err(_) => return DwellConfig::default(),
    };

    for path in [global_config_path(), project_config_path()] {
        if let Some(layer) = load_toml_file(path) {
            merge_tables(&mut tree, layer);
        }
    }

    let mut config: DwellConfig = tree.try_into().unwrap_or_else(|e| {
        eprintln!("[dwellscope] ignoring invalid config values: {e}");
        DwellConfig::default()
    });

    apply_env_overrides(&mut config);
    config
}

/// Parse a TOML file into a raw value tree, if it exists and is valid.
fn load_toml_file(path: Option<PathBuf>) -> Option<toml::Value> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            eprintln!("[dwellscope] skipping malformed {}: {e}", path.display());
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Tables merge key by key; any
/// other value in the overlay replaces the base value outright.
pub(crate) fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dwellscope").join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".dwellscope.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None if path == "~" => dirs::home_dir(),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `DWELLSCOPE_API_URL`: data server base URL
/// - `DWELLSCOPE_TIMEOUT_MS`: per-request timeout
/// - `DWELLSCOPE_WEB_ADDR`: dashboard listen address
/// - `DWELLSCOPE_LOGGING`: activity log on/off (`1`/`true`/`yes`/`on`)
/// - `DWELLSCOPE_CHART_MODE`: `palette` or `flagging`
fn apply_env_overrides(config: &mut DwellConfig) {
    if let Ok(val) = std::env::var("DWELLSCOPE_API_URL")
        && !val.is_empty()
    {
        config.data_api.url = val;
    }
    if let Ok(val) = std::env::var("DWELLSCOPE_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.data_api.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("DWELLSCOPE_WEB_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }
    if let Ok(val) = std::env::var("DWELLSCOPE_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("DWELLSCOPE_CHART_MODE")
        && let Some(mode) = parse_chart_mode(&val)
    {
        config.charts.mode = mode;
    }
}

/// Check if a string value represents a truthy boolean.
pub(crate) fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a chart mode string.
pub fn parse_chart_mode(val: &str) -> Option<schema::ChartMode> {
    match val.to_ascii_lowercase().as_str() {
        "palette" => Some(schema::ChartMode::Palette),
        "flagging" | "flag" | "flagged" => Some(schema::ChartMode::Flagging),
        _ => None,
    }
}

/// Parse a fit mode string.
pub fn parse_fit_mode(val: &str) -> Option<schema::FitMode> {
    match val.to_ascii_lowercase().as_str() {
        "stretch" | "fill" => Some(schema::FitMode::Stretch),
        "contain" => Some(schema::FitMode::Contain),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.dwellscope/config.toml`.
///
/// Returns an error if the file already exists, unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.dwellscope/ directory")?;
    }

    fs::write(&path, DwellConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key in the global config file.
///
/// Supports dotted keys like `highlight.ttl_ms`. When no file exists yet the
/// defaults are written first, then updated.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(DwellConfig::default())
            .context("failed to serialize default config")?
    };

    set_toml_value(&mut root, key, value)?;

    // Reject updates that would no longer deserialize (e.g. unknown enum value).
    let _: DwellConfig = root
        .clone()
        .try_into()
        .with_context(|| format!("invalid value for '{key}': {value}"))?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
pub(crate) fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("empty config key segment in '{key}'");
    }

    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];
    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(leaf) {
        None => anyhow::bail!("unknown config key '{key}'"),
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected number for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::Array(_)) => {
            let items: Vec<toml::Value> = raw_value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect();
            toml::Value::Array(items)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_truthy_accepts_variants() {
        for v in ["1", "true", "TRUE", "yes", "on", "ON"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "no", "off", ""] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn parse_chart_mode_handles_variants() {
        assert_eq!(parse_chart_mode("palette"), Some(schema::ChartMode::Palette));
        assert_eq!(parse_chart_mode("FLAGGING"), Some(schema::ChartMode::Flagging));
        assert_eq!(parse_chart_mode("flag"), Some(schema::ChartMode::Flagging));
        assert_eq!(parse_chart_mode("rainbow"), None);
    }

    #[test]
    fn parse_fit_mode_handles_variants() {
        assert_eq!(parse_fit_mode("contain"), Some(schema::FitMode::Contain));
        assert_eq!(parse_fit_mode("fill"), Some(schema::FitMode::Stretch));
        assert_eq!(parse_fit_mode("cover"), None);
    }

    #[test]
    fn merge_tables_overrides_only_present_keys() {
        let mut base = toml::Value::try_from(DwellConfig::default()).unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[highlight]
ttl_ms = 5000
"#,
        )
        .unwrap();
        merge_tables(&mut base, overlay);

        let cfg: DwellConfig = base.try_into().unwrap();
        assert_eq!(cfg.highlight.ttl_ms, 5000);
        assert_eq!(cfg.highlight.fit, schema::FitMode::Stretch);
        assert_eq!(cfg.timeline.row_height, 30.0);
    }

    #[test]
    fn merge_tables_replaces_arrays_wholesale() {
        let mut base = toml::Value::try_from(DwellConfig::default()).unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[detection]
markers = ["sponsored"]
"#,
        )
        .unwrap();
        merge_tables(&mut base, overlay);

        let cfg: DwellConfig = base.try_into().unwrap();
        assert_eq!(cfg.detection.markers, vec!["sponsored".to_string()]);
        assert_eq!(cfg.detection.ad_classes, vec!["sample-popup-ad".to_string()]);
    }

    #[test]
    fn set_toml_value_updates_typed_values() {
        let mut root = toml::Value::try_from(DwellConfig::default()).unwrap();
        set_toml_value(&mut root, "highlight.ttl_ms", "1500").unwrap();
        set_toml_value(&mut root, "timeline.pad", "40").unwrap();
        set_toml_value(&mut root, "web.open_browser", "no").unwrap();
        set_toml_value(&mut root, "detection.markers", "ad, promo").unwrap();
        set_toml_value(&mut root, "charts.mode", "flagging").unwrap();

        let cfg: DwellConfig = root.try_into().unwrap();
        assert_eq!(cfg.highlight.ttl_ms, 1500);
        assert_eq!(cfg.timeline.pad, 40.0);
        assert!(!cfg.web.open_browser);
        assert_eq!(cfg.detection.markers, vec!["ad".to_string(), "promo".to_string()]);
        assert_eq!(cfg.charts.mode, schema::ChartMode::Flagging);
    }

    #[test]
    fn set_toml_value_rejects_unknown_keys() {
        let mut root = toml::Value::try_from(DwellConfig::default()).unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "x").is_err());
        assert!(set_toml_value(&mut root, "highlight.nope", "x").is_err());
        assert!(set_toml_value(&mut root, "highlight.ttl_ms", "soon").is_err());
        assert!(set_toml_value(&mut root, "highlight..ttl_ms", "1").is_err());
    }

    #[test]
    fn expand_home_handles_tilde() {
        let expanded = expand_home("~/x/y.jsonl");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, Some(home.join("x/y.jsonl")));
        }
        assert_eq!(expand_home("/tmp/a"), Some(PathBuf::from("/tmp/a")));
    }

    #[test]
    fn show_effective_config_round_trips() {
        let toml_str = show_effective_config().unwrap();
        let _: DwellConfig = toml::from_str(&toml_str).unwrap();
    }
}

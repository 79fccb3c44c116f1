use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use dwellscope::cli::{self, HighlightArgs, OutputFormat, SourceSpec};
use dwellscope::{config, web};

#[derive(Debug, Parser)]
#[command(name = "dwellscope")]
#[command(about = "Review recorded DOM dwell-time sessions")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

/// Where to read elements from. Exactly one is required.
#[derive(Debug, Args)]
struct SourceArgs {
    /// Session ID on the data API
    #[arg(long)]
    session: Option<String>,
    /// Page URL on the data API (per-URL stats endpoint)
    #[arg(long)]
    url: Option<String>,
    /// Local JSON file shaped { "elements": [...] }
    #[arg(long)]
    file: Option<PathBuf>,
}

impl SourceArgs {
    fn into_spec(self) -> Result<SourceSpec> {
        SourceSpec::from_flags(self.session, self.url, self.file)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List session IDs recorded for a user
    Sessions {
        user_id: String,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show the raw element records
    Elements {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Per-element dwell totals, averages and flags
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Timeline geometry, or an SVG file with --out
    Timeline {
        #[command(flatten)]
        source: SourceArgs,
        /// Write the timeline as SVG to this path
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Bar and pie chart series
    Charts {
        #[command(flatten)]
        source: SourceArgs,
        /// domIDs to select in the pie (repeatable)
        #[arg(long = "select")]
        select: Vec<String>,
        /// Write bar.svg and pie.svg into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List recorded URLs, or averages and hourly activity for one URL
    Stats {
        /// Page URL to analyze
        #[arg(long)]
        url: Option<String>,
        /// Write the average-duration chart as SVG to this path
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Map an element's stored rect onto a reference image
    Highlight {
        dom_id: String,
        #[command(flatten)]
        source: SourceArgs,
        /// Image natural size, WIDTHxHEIGHT
        #[arg(long)]
        natural: String,
        /// Displayed box size, WIDTHxHEIGHT
        #[arg(long)]
        display: String,
        /// stretch or contain (default from config)
        #[arg(long)]
        fit: Option<String>,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Save a session's heatmap image
    Heatmap {
        session_id: String,
        /// Output path (default heatmap_session_{id}.png)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the web dashboard
    Serve {
        /// Listen address (default from config)
        #[arg(long)]
        addr: Option<String>,
        /// Do not open a browser
        #[arg(long)]
        no_open: bool,
    },
    /// Check configuration, detection rules, data API and activity log
    Health,
    /// Show recent activity events
    Log {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective merged configuration
    Show,
    /// Write a default config file to ~/.dwellscope/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set one dotted key, e.g. `charts.mode flagging`
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

fn fmt(s: &str) -> OutputFormat {
    OutputFormat::from_str_opt(Some(s))
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Sessions { user_id, format } => cli::run_sessions(&user_id, fmt(&format)),
        Commands::Elements { source, format } => cli::run_elements(&source.into_spec()?, fmt(&format)),
        Commands::Summary { source, format } => cli::run_summary(&source.into_spec()?, fmt(&format)),
        Commands::Timeline {
            source,
            out,
            format,
        } => cli::run_timeline(&source.into_spec()?, out.as_deref(), fmt(&format)),
        Commands::Charts {
            source,
            select,
            out_dir,
            format,
        } => cli::run_charts(
            &source.into_spec()?,
            &select,
            out_dir.as_deref(),
            fmt(&format),
        ),
        Commands::Stats { url, out, format } => {
            cli::run_stats(url.as_deref(), out.as_deref(), fmt(&format))
        }
        Commands::Highlight {
            dom_id,
            source,
            natural,
            display,
            fit,
            format,
        } => cli::run_highlight(
            &source.into_spec()?,
            &HighlightArgs {
                dom_id,
                natural,
                display,
                fit,
            },
            fmt(&format),
        ),
        Commands::Heatmap { session_id, out } => cli::run_heatmap(&session_id, out.as_deref()),
        Commands::Serve { addr, no_open } => {
            let mut cfg = config::load();
            if no_open {
                cfg.web.open_browser = false;
            }
            let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
            web::serve(cfg, &addr)
        }
        Commands::Health => cli::run_health(),
        Commands::Log { limit, format } => cli::run_log(limit, fmt(&format)),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}

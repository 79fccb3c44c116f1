//! dwellscope: review recorded DOM dwell-time sessions.
//!
//! The core (`analytics`, `timeline`, `highlight`) is pure and infallible;
//! `client`, `config`, `cli` and `web` wrap it with I/O.

pub mod analytics;
pub mod cli;
pub mod client;
pub mod config;
pub mod detect;
pub mod highlight;
pub mod model;
pub mod render;
pub mod state;
pub mod timeline;
pub mod web;

pub use analytics::{aggregate_durations, build_chart_series};
pub use highlight::map_highlight;
pub use timeline::layout_timeline;
pub use timeline::ticks::plan_axis_step;

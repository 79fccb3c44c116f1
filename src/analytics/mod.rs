//! Session analytics: aggregation, chart series, and the activity log.

pub mod aggregate;
pub mod charts;
pub mod events;

pub use aggregate::{Aggregate, DomAggregate, aggregate_durations, hourly_activity};
pub use charts::{ChartSeries, Selection, build_average_series, build_chart_series};

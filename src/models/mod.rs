//! Data models for price series, tick records and run metrics.

mod price;
mod run_metrics;
mod tick;

pub use price::PriceSeries;
pub use run_metrics::RunMetrics;
pub use tick::{Action, TickRecord};

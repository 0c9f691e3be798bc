//! Price series sources: synthetic random walks and persisted files.

mod csv_source;
mod generator;

pub use csv_source::{clean_dir, series_files_in, write_values, CsvPriceFile};
pub use generator::{GeneratorConfig, RandomWalkGenerator};

use anyhow::Result;

use crate::models::PriceSeries;

/// Anything that can hand the runner an ordered price series.
pub trait PriceSeriesSource {
    /// Label used in logs and reports.
    fn name(&self) -> String;

    /// Produce the next series.
    fn load(&mut self) -> Result<PriceSeries>;
}

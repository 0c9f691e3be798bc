//! Summary statistics of a completed simulation run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Performance of one run, derived purely from its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Number of ticks processed
    pub ticks: usize,

    /// Cash the run started with
    pub initial_value: Decimal,

    /// Portfolio value after the last tick
    pub final_value: Decimal,

    /// (final - initial) / initial
    pub total_return_pct: Decimal,

    // === Activity ===
    /// Ticks that bought a non-zero amount
    pub buys: usize,

    /// Ticks that sold a non-zero amount, including the final liquidation
    pub sells: usize,

    /// Ticks with no money movement
    pub holds: usize,

    /// Total cash spent on buys
    pub total_bought: Decimal,

    /// Total cash received from sells
    pub total_sold: Decimal,

    // === Risk ===
    /// Highest portfolio value reached
    pub peak_value: Decimal,

    /// Maximum drawdown percentage (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Mean / std-dev of per-tick portfolio returns
    pub sharpe_ratio: f64,

    /// Mean / downside deviation of per-tick portfolio returns
    pub sortino_ratio: f64,
}

impl RunMetrics {
    /// Empty metrics for a run that has not processed any tick.
    pub fn new(initial_value: Decimal) -> Self {
        Self {
            ticks: 0,
            initial_value,
            final_value: initial_value,
            total_return_pct: Decimal::ZERO,
            buys: 0,
            sells: 0,
            holds: 0,
            total_bought: Decimal::ZERO,
            total_sold: Decimal::ZERO,
            peak_value: initial_value,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
        }
    }

    pub fn profit(&self) -> Decimal {
        self.final_value - self.initial_value
    }
}

//! Calculator for run performance metrics: drawdown, Sharpe ratio, activity.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use statrs::statistics::Statistics;

use crate::models::{Action, RunMetrics, TickRecord};

/// Calculator for computing run metrics from an audit trail.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate metrics from the tick records of a run that started with
    /// `initial_value` in cash.
    ///
    /// Only recorded values are used, so a persisted audit trail yields the
    /// same metrics as the live outcome.
    pub fn calculate(initial_value: Decimal, ticks: &[TickRecord]) -> RunMetrics {
        let mut metrics = RunMetrics::new(initial_value);

        if ticks.is_empty() {
            return metrics;
        }

        metrics.ticks = ticks.len();
        metrics.final_value = ticks
            .last()
            .map_or(initial_value, TickRecord::portfolio_value);

        if initial_value > Decimal::ZERO {
            metrics.total_return_pct = (metrics.final_value - initial_value) / initial_value;
        }

        Self::calculate_activity(&mut metrics, ticks);

        // Equity curve: opening cash, then value after every tick
        let equity: Vec<Decimal> = std::iter::once(initial_value)
            .chain(ticks.iter().map(TickRecord::portfolio_value))
            .collect();

        Self::calculate_drawdown(&mut metrics, &equity);
        Self::calculate_sharpe_sortino(&mut metrics, &equity);

        metrics
    }

    /// Count trades and total money moved. Zero-sized trades count as holds.
    fn calculate_activity(metrics: &mut RunMetrics, ticks: &[TickRecord]) {
        for tick in ticks {
            match tick.action {
                Action::Buy if !tick.cash_delta.is_zero() => {
                    metrics.buys += 1;
                    metrics.total_bought += -tick.cash_delta;
                }
                Action::Sell if !tick.cash_delta.is_zero() => {
                    metrics.sells += 1;
                    metrics.total_sold += tick.cash_delta;
                }
                _ => metrics.holds += 1,
            }
        }
    }

    /// Calculate maximum drawdown from the equity curve.
    fn calculate_drawdown(metrics: &mut RunMetrics, equity: &[Decimal]) {
        let mut peak = Decimal::ZERO;
        let mut max_dd_pct = 0.0f64;

        for &value in equity {
            if value > peak {
                peak = value;
            }

            if peak > Decimal::ZERO {
                let dd_pct = ((peak - value) / peak).to_f64().unwrap_or(0.0);
                if dd_pct > max_dd_pct {
                    max_dd_pct = dd_pct;
                }
            }
        }

        metrics.peak_value = peak;
        metrics.max_drawdown = max_dd_pct;
    }

    /// Calculate Sharpe and Sortino ratios of per-tick returns (not annualized).
    fn calculate_sharpe_sortino(metrics: &mut RunMetrics, equity: &[Decimal]) {
        let returns: Vec<f64> = equity
            .windows(2)
            .filter_map(|w| {
                let prev = w[0].to_f64()?;
                let curr = w[1].to_f64()?;
                (prev > 0.0).then(|| (curr - prev) / prev)
            })
            .collect();

        if returns.len() < 2 {
            return;
        }

        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        // Sharpe ratio (assuming 0% risk-free rate)
        if std_dev.is_finite() && std_dev > 0.0 {
            metrics.sharpe_ratio = mean / std_dev;
        }

        // Sortino ratio (using downside deviation)
        let negative_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();

        if negative_returns.len() >= 2 {
            let downside_dev = negative_returns.std_dev();
            if downside_dev.is_finite() && downside_dev > 0.0 {
                metrics.sortino_ratio = mean / downside_dev;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(index: usize, price: Decimal, action: Action, cash: Decimal, shares: Decimal, delta: Decimal) -> TickRecord {
        TickRecord {
            index,
            price,
            action,
            cash_after: cash,
            shares_after: shares,
            cash_delta: delta,
        }
    }

    #[test]
    fn test_activity_counts() {
        let ticks = vec![
            tick(0, dec!(10), Action::None, dec!(100), dec!(0), dec!(0)),
            tick(1, dec!(11), Action::Sell, dec!(100), dec!(0), dec!(0)),
            tick(2, dec!(10), Action::Buy, dec!(50), dec!(5), dec!(-50)),
            tick(3, dec!(12), Action::Sell, dec!(110), dec!(0), dec!(60)),
        ];

        let metrics = MetricsCalculator::calculate(dec!(100), &ticks);

        assert_eq!(metrics.buys, 1);
        assert_eq!(metrics.sells, 1);
        assert_eq!(metrics.holds, 2);
        assert_eq!(metrics.total_bought, dec!(50));
        assert_eq!(metrics.total_sold, dec!(60));
        assert_eq!(metrics.final_value, dec!(110));
        assert_eq!(metrics.total_return_pct, dec!(0.1));
        assert_eq!(metrics.profit(), dec!(10));
    }

    #[test]
    fn test_calculate_drawdown() {
        // Values: 100 -> 100 -> 75 -> 60 -> 120, worst dip 40% below 100
        let ticks = vec![
            tick(0, dec!(10), Action::Buy, dec!(0), dec!(10), dec!(-100)),
            tick(1, dec!(7.5), Action::None, dec!(0), dec!(10), dec!(0)),
            tick(2, dec!(6), Action::None, dec!(0), dec!(10), dec!(0)),
            tick(3, dec!(12), Action::Sell, dec!(120), dec!(0), dec!(120)),
        ];

        let metrics = MetricsCalculator::calculate(dec!(100), &ticks);

        assert!((metrics.max_drawdown - 0.4).abs() < 1e-9);
        assert_eq!(metrics.peak_value, dec!(120));
        assert!(metrics.sharpe_ratio.is_finite());
    }

    #[test]
    fn test_empty_run() {
        let metrics = MetricsCalculator::calculate(dec!(100), &[]);
        assert_eq!(metrics.final_value, dec!(100));
        assert_eq!(metrics.ticks, 0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }
}

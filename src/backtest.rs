//! Simulation engine: replays the strategy over a price series.
//!
//! Features:
//! - Tick-by-tick runner with an explicit `step` entry point
//! - Forced liquidation on the last tick
//! - Full audit trail and aligned cash/share histories
//! - Parallel batch runs over many independent series

use std::fmt;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::ledger::Ledger;
use crate::metrics::MetricsCalculator;
use crate::models::{Action, PriceSeries, RunMetrics, TickRecord};
use crate::trading::{
    maximize_bank_balance, Decision, PriceWindow, SimulationConfig, StrategyEngine, StreakState,
};

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerState {
    /// Waiting for a series
    Idle,
    /// Applying the strategy rule
    Running,
    /// Next tick is the last one and will sell everything
    Liquidating,
    /// Every tick processed
    Done,
}

/// Drives [`StrategyEngine`] over one price series against one [`Ledger`].
pub struct SimulationRunner {
    config: SimulationConfig,
    engine: StrategyEngine,
    state: RunnerState,
    series: Option<PriceSeries>,
    ledger: Option<Ledger>,
    streak: StreakState,
    cursor: usize,
    ticks: Vec<TickRecord>,
}

impl SimulationRunner {
    /// Create an idle runner. Fails with `InvalidConfiguration` on bad
    /// modifiers or a non-positive starting balance.
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let engine = StrategyEngine::new(config.strategy.clone())?;

        Ok(Self {
            config,
            engine,
            state: RunnerState::Idle,
            series: None,
            ledger: None,
            streak: StreakState::new(),
            cursor: 0,
            ticks: Vec::new(),
        })
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn streak(&self) -> StreakState {
        self.streak
    }

    /// Load `prices` and open the ledger. `Idle -> Running`.
    pub fn start(&mut self, prices: &[Decimal]) -> SimResult<()> {
        if self.state != RunnerState::Idle {
            return Err(SimError::InvalidState {
                state: self.state,
                operation: "start",
            });
        }

        let series = PriceSeries::new(prices.to_vec())?;
        let ledger = Ledger::new(self.config.initial_cash)?;

        info!(
            ticks = series.len(),
            initial_cash = %self.config.initial_cash,
            buy_trigger = ?self.config.strategy.buy_trigger,
            sizing = ?self.config.strategy.sizing,
            "Starting simulation"
        );

        self.ticks = Vec::with_capacity(series.len());
        self.series = Some(series);
        self.ledger = Some(ledger);
        self.streak = StreakState::new();
        self.cursor = 0;
        self.state = RunnerState::Running;
        self.advance_state();

        Ok(())
    }

    /// Process the next tick and return its record.
    ///
    /// A ledger rejection is returned as-is; the runner stays on the same tick
    /// with accounts untouched.
    pub fn step(&mut self) -> SimResult<TickRecord> {
        let (Some(series), Some(ledger)) = (self.series.as_ref(), self.ledger.as_mut()) else {
            return Err(SimError::InvalidState {
                state: self.state,
                operation: "step",
            });
        };
        if !matches!(self.state, RunnerState::Running | RunnerState::Liquidating) {
            return Err(SimError::InvalidState {
                state: self.state,
                operation: "step",
            });
        }

        let index = self.cursor;
        let window = PriceWindow::at(series, index).ok_or(SimError::InvalidState {
            state: self.state,
            operation: "step",
        })?;
        let price = window.current;

        let decision = if self.state == RunnerState::Liquidating {
            Decision::liquidate()
        } else {
            self.engine.decide(&window, &self.streak)
        };

        let cash_delta = apply(ledger, &decision, price)?;
        self.streak.record(decision.action);

        let record = TickRecord {
            index,
            price,
            action: decision.action,
            cash_after: ledger.cash(),
            shares_after: ledger.shares(),
            cash_delta,
        };

        let value = ledger.value_at(price);
        let streak = self.streak();
        debug!(
            tick = index,
            price = %price,
            action = %record.action,
            cash = %record.cash_after,
            shares = %record.shares_after,
            delta = %cash_delta,
            value = %value,
            buy_streak = streak.buy_streak(),
            sell_streak = streak.sell_streak(),
            "Tick processed"
        );

        self.ticks.push(record);
        self.cursor += 1;
        self.advance_state();

        Ok(record)
    }

    /// Step until every tick has been processed.
    pub fn run_to_completion(&mut self) -> SimResult<()> {
        while matches!(self.state(), RunnerState::Running | RunnerState::Liquidating) {
            self.step()?;
        }
        Ok(())
    }

    /// Hand over the audit trail of a finished run.
    pub fn finish(self) -> SimResult<SimulationOutcome> {
        let (RunnerState::Done, Some(series), Some(ledger)) = (self.state, self.series, self.ledger)
        else {
            return Err(SimError::InvalidState {
                state: self.state,
                operation: "finish",
            });
        };

        info!(
            ticks = self.ticks.len(),
            final_cash = %ledger.cash(),
            "Simulation complete"
        );

        Ok(SimulationOutcome {
            config: self.config,
            series,
            cash_history: ledger.cash_history().to_vec(),
            share_history: ledger.share_history().to_vec(),
            ticks: self.ticks,
        })
    }

    fn advance_state(&mut self) {
        let len = self.series.as_ref().map_or(0, PriceSeries::len);
        self.state = if self.cursor >= len {
            RunnerState::Done
        } else if self.cursor + 1 == len {
            RunnerState::Liquidating
        } else {
            RunnerState::Running
        };
    }
}

/// Move money and shares for `decision`. Returns the signed cash movement.
fn apply(ledger: &mut Ledger, decision: &Decision, price: Decimal) -> SimResult<Decimal> {
    match decision.action {
        Action::Buy => {
            let spend = ledger.cash() * decision.size_fraction;
            ledger.buy(spend, price)?;
            Ok(-spend)
        }
        Action::Sell => {
            let count = if decision.size_fraction == Decimal::ONE {
                ledger.shares()
            } else {
                ledger.shares() * decision.size_fraction
            };
            ledger.sell(count, price)
        }
        Action::None => {
            ledger.hold();
            Ok(Decimal::ZERO)
        }
    }
}

/// Run one complete simulation.
pub fn simulate(config: &SimulationConfig, prices: &[Decimal]) -> SimResult<SimulationOutcome> {
    let mut runner = SimulationRunner::new(config.clone())?;
    runner.start(prices)?;
    runner.run_to_completion()?;
    runner.finish()
}

/// Audit trail and histories of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub config: SimulationConfig,
    pub series: PriceSeries,
    pub ticks: Vec<TickRecord>,
    pub cash_history: Vec<Decimal>,
    pub share_history: Vec<Decimal>,
}

impl SimulationOutcome {
    pub fn initial_cash(&self) -> Decimal {
        self.config.initial_cash
    }

    pub fn final_cash(&self) -> Decimal {
        self.ticks
            .last()
            .map_or(self.config.initial_cash, |t| t.cash_after)
    }

    pub fn metrics(&self) -> RunMetrics {
        MetricsCalculator::calculate(self.config.initial_cash, &self.ticks)
    }

    /// Hindsight upper reference for the same series and starting cash.
    pub fn oracle_balance(&self) -> SimResult<Decimal> {
        maximize_bank_balance(self.series.prices(), self.config.initial_cash)
    }
}

impl fmt::Display for SimulationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics();
        writeln!(f, "\n{:=^60}", " SIMULATION RESULTS ")?;
        writeln!(f)?;
        writeln!(f, "Ticks:       {}", m.ticks)?;
        writeln!(f, "Strategy:    {:?} / {:?}", self.config.strategy.buy_trigger, self.config.strategy.sizing)?;
        writeln!(f)?;
        writeln!(f, "--- Capital ---")?;
        writeln!(f, "Initial:     ${:.2}", m.initial_value)?;
        writeln!(f, "Final:       ${:.2}", m.final_value)?;
        writeln!(f, "Profit:      ${:.2}", m.profit())?;
        writeln!(f, "Return:      {:.2}%", m.total_return_pct * dec!(100))?;
        if let Ok(oracle) = self.oracle_balance() {
            writeln!(f, "Oracle:      ${:.2}", oracle)?;
        }
        writeln!(f)?;
        writeln!(f, "--- Activity ---")?;
        writeln!(f, "Buys:        {} (${:.2})", m.buys, m.total_bought)?;
        writeln!(f, "Sells:       {} (${:.2})", m.sells, m.total_sold)?;
        writeln!(f, "Holds:       {}", m.holds)?;
        writeln!(f)?;
        writeln!(f, "--- Risk Metrics ---")?;
        writeln!(f, "Peak Value:   ${:.2}", m.peak_value)?;
        writeln!(f, "Max Drawdown: {:.2}%", m.max_drawdown * 100.0)?;
        writeln!(f, "Sharpe Ratio: {:.2}", m.sharpe_ratio)?;
        writeln!(f, "Sortino Ratio: {:.2}", m.sortino_ratio)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

// ============== Batch Backtesting ==============

/// One simulated series in a batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub name: String,
    pub outcome: SimulationOutcome,
    pub oracle_balance: Decimal,
}

impl BatchEntry {
    pub fn profit(&self) -> Decimal {
        self.outcome.final_cash() - self.outcome.initial_cash()
    }
}

/// Simulate every named series on its own blocking task.
///
/// Each task owns its ledger, so nothing is shared. A series that fails is
/// logged and left out of the result; order of the input is preserved.
pub async fn run_batch(
    config: &SimulationConfig,
    series: Vec<(String, Vec<Decimal>)>,
) -> Result<Vec<BatchEntry>> {
    config.validate()?;
    info!(count = series.len(), "Starting batch simulation");

    let handles: Vec<_> = series
        .into_iter()
        .map(|(name, prices)| {
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                let result = simulate(&config, &prices).and_then(|outcome| {
                    let oracle_balance = outcome.oracle_balance()?;
                    Ok(BatchEntry {
                        name: name.clone(),
                        outcome,
                        oracle_balance,
                    })
                });
                (name, result)
            })
        })
        .collect();

    let mut entries = Vec::new();
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok((_, Ok(entry))) => entries.push(entry),
            Ok((name, Err(e))) => {
                warn!(series = %name, error = %e, "Skipping series");
            }
            Err(e) => {
                warn!(error = %e, "Simulation task failed");
            }
        }
    }

    info!(completed = entries.len(), "Batch simulation complete");
    Ok(entries)
}

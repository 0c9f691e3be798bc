//! Strategy configuration.

use clap::ValueEnum;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// When a tick that is not a rise turns into a buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BuyTrigger {
    /// Buy only if the next price is higher. Needs the future, so it is
    /// simulator-only.
    LookAhead,
    /// Buy whenever the price did not rise.
    Causal,
}

impl BuyTrigger {
    pub fn needs_next_price(&self) -> bool {
        matches!(self, BuyTrigger::LookAhead)
    }
}

/// How much of the account a signal commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TradeSizing {
    /// min(transaction_modifier * streak, max_transaction_modifier)
    Streak,
    /// Whole cash balance on buys, whole position on sells
    AllIn,
}

/// Configuration for the momentum-reversal rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Fraction committed per unit of streak (0.0 to 1.0]
    pub transaction_modifier: Decimal,

    /// Cap on the fraction committed in one tick (0.0 to 1.0]
    pub max_transaction_modifier: Decimal,

    /// Look-ahead or causal buy rule
    pub buy_trigger: BuyTrigger,

    /// Streak-scaled or all-in trade size
    pub sizing: TradeSizing,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            transaction_modifier: dec!(0.2),      // 20% per streak step
            max_transaction_modifier: dec!(0.5),  // Never more than half in one tick
            buy_trigger: BuyTrigger::LookAhead,
            sizing: TradeSizing::Streak,
        }
    }
}

impl StrategyConfig {
    /// Check both modifiers lie in (0, 1].
    pub fn validate(&self) -> SimResult<()> {
        check_fraction("transaction_modifier", self.transaction_modifier)?;
        check_fraction("max_transaction_modifier", self.max_transaction_modifier)?;
        Ok(())
    }
}

/// Configuration of a single simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Starting cash balance
    pub initial_cash: Decimal,

    /// Decision rule parameters
    pub strategy: StrategyConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100),
            strategy: StrategyConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.initial_cash <= Decimal::ZERO {
            return Err(SimError::config(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        self.strategy.validate()
    }
}

fn check_fraction(name: &str, value: Decimal) -> SimResult<()> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(SimError::config(format!(
            "{name} must be in (0, 1], got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_modifier_bounds() {
        let config = StrategyConfig {
            transaction_modifier: Decimal::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfiguration(_))
        ));

        let config = StrategyConfig {
            max_transaction_modifier: dec!(1.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            transaction_modifier: Decimal::ONE,
            max_transaction_modifier: Decimal::ONE,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_cash_rejected() {
        let config = SimulationConfig {
            initial_cash: Decimal::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

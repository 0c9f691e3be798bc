//! Position sizing: how much of the account a buy or sell commits.

use rust_decimal::Decimal;

use super::{StrategyConfig, TradeSizing};

/// Turns a streak length into the fraction of cash (buys) or shares (sells)
/// to trade.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    method: TradeSizing,
    modifier: Decimal,
    cap: Decimal,
}

impl PositionSizer {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            method: config.sizing,
            modifier: config.transaction_modifier,
            cap: config.max_transaction_modifier,
        }
    }

    /// Fraction of the account to trade after `streak` consecutive signals in
    /// the same direction. Always within [0, 1].
    pub fn fraction(&self, streak: u32) -> Decimal {
        match self.method {
            TradeSizing::AllIn => Decimal::ONE,
            TradeSizing::Streak => {
                let scaled = self.modifier * Decimal::from(streak);
                scaled.min(self.cap).min(Decimal::ONE).max(Decimal::ZERO)
            }
        }
    }
}

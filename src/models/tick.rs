//! Audit trail records: one per processed tick.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the strategy did on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    None,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::None => "none",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the accounts right after a tick was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Position of the tick in the price series
    pub index: usize,

    /// Price the tick was processed at
    pub price: Decimal,

    /// Action committed on this tick
    pub action: Action,

    /// Cash balance after the tick
    pub cash_after: Decimal,

    /// Shares held after the tick
    pub shares_after: Decimal,

    /// Signed cash movement: negative for buys, positive for sells
    pub cash_delta: Decimal,
}

impl TickRecord {
    /// Mark-to-market value of the held shares.
    pub fn share_value(&self) -> Decimal {
        self.shares_after * self.price
    }

    /// Cash plus the mark-to-market value of held shares.
    pub fn portfolio_value(&self) -> Decimal {
        self.cash_after + self.share_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_portfolio_value() {
        let tick = TickRecord {
            index: 3,
            price: dec!(102),
            action: Action::Buy,
            cash_after: dec!(50),
            shares_after: dec!(0.5),
            cash_delta: dec!(-50),
        };

        assert_eq!(tick.share_value(), dec!(51));
        assert_eq!(tick.portfolio_value(), dec!(101));
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&Action::Sell).unwrap();
        assert_eq!(json, "\"sell\"");
    }
}

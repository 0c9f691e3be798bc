//! Momentum-reversal decision rule.
//!
//! Sell into rises, buy into dips, and scale the stake with the length of the
//! current streak of same-direction decisions:
//! - No previous price: hold
//! - Price rose since the last tick: sell a streak-sized fraction of shares
//! - Otherwise buy a streak-sized fraction of cash, either unconditionally
//!   (causal) or only when the next price is higher (look-ahead)
//!
//! The engine only proposes. Applying a decision and advancing the streak is
//! up to the caller, who knows whether the trade actually went through.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SimResult;
use crate::models::{Action, PriceSeries};

use super::{BuyTrigger, PositionSizer, StrategyConfig};

/// Prices around the tick being decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceWindow {
    pub previous: Option<Decimal>,
    pub current: Decimal,
    pub next: Option<Decimal>,
}

impl PriceWindow {
    /// Window at `index` of `series`. `None` if the index is out of range.
    pub fn at(series: &PriceSeries, index: usize) -> Option<Self> {
        let point = series.point(index)?;
        Some(Self {
            previous: point.index.checked_sub(1).and_then(|i| series.get(i)),
            current: point.price,
            next: series.get(point.index + 1),
        })
    }

    pub fn is_rise(&self) -> bool {
        self.previous.is_some_and(|prev| self.current > prev)
    }
}

/// Consecutive buy and sell decisions. Both start at 1 and at most one of
/// them is ever above 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    buy_streak: u32,
    sell_streak: u32,
}

impl Default for StreakState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreakState {
    pub fn new() -> Self {
        Self {
            buy_streak: 1,
            sell_streak: 1,
        }
    }

    pub fn buy_streak(&self) -> u32 {
        self.buy_streak
    }

    pub fn sell_streak(&self) -> u32 {
        self.sell_streak
    }

    /// Advance the counters for a committed action.
    pub fn record(&mut self, action: Action) {
        match action {
            Action::Buy => {
                self.buy_streak = self.buy_streak.saturating_add(1);
                self.sell_streak = 1;
            }
            Action::Sell => {
                self.sell_streak = self.sell_streak.saturating_add(1);
                self.buy_streak = 1;
            }
            Action::None => {}
        }
    }
}

/// Proposed action and the fraction of cash (buy) or shares (sell) to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub size_fraction: Decimal,
}

impl Decision {
    pub fn hold() -> Self {
        Self {
            action: Action::None,
            size_fraction: Decimal::ZERO,
        }
    }

    /// Sell the entire position.
    pub fn liquidate() -> Self {
        Self {
            action: Action::Sell,
            size_fraction: Decimal::ONE,
        }
    }
}

/// Pure decision function over a price window and streak state.
#[derive(Debug, Clone)]
pub struct StrategyEngine {
    config: StrategyConfig,
    sizer: PositionSizer,
}

impl StrategyEngine {
    /// Create an engine, validating the modifiers.
    pub fn new(config: StrategyConfig) -> SimResult<Self> {
        config.validate()?;
        let sizer = PositionSizer::new(&config);
        Ok(Self { config, sizer })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn decide(&self, window: &PriceWindow, streak: &StreakState) -> Decision {
        let Some(previous) = window.previous else {
            return Decision::hold();
        };

        let decision = if window.is_rise() {
            Decision {
                action: Action::Sell,
                size_fraction: self.sizer.fraction(streak.sell_streak()),
            }
        } else if self.buy_signal(window) {
            Decision {
                action: Action::Buy,
                size_fraction: self.sizer.fraction(streak.buy_streak()),
            }
        } else {
            Decision::hold()
        };

        trace!(
            previous = %previous,
            current = %window.current,
            action = %decision.action,
            fraction = %decision.size_fraction,
            "Decided"
        );

        decision
    }

    fn buy_signal(&self, window: &PriceWindow) -> bool {
        match self.config.buy_trigger {
            BuyTrigger::Causal => true,
            BuyTrigger::LookAhead => window.next.is_some_and(|next| window.current < next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::TradeSizing;
    use rust_decimal_macros::dec;

    fn engine(trigger: BuyTrigger) -> StrategyEngine {
        StrategyEngine::new(StrategyConfig {
            buy_trigger: trigger,
            ..Default::default()
        })
        .unwrap()
    }

    fn window(previous: Option<Decimal>, current: Decimal, next: Option<Decimal>) -> PriceWindow {
        PriceWindow {
            previous,
            current,
            next,
        }
    }

    #[test]
    fn test_first_tick_holds() {
        let decision = engine(BuyTrigger::Causal).decide(
            &window(None, dec!(100), Some(dec!(120))),
            &StreakState::new(),
        );
        assert_eq!(decision, Decision::hold());
    }

    #[test]
    fn test_rise_sells_streak_fraction() {
        let mut streak = StreakState::new();
        streak.record(Action::Sell);

        let decision = engine(BuyTrigger::LookAhead)
            .decide(&window(Some(dec!(100)), dec!(101), None), &streak);

        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.size_fraction, dec!(0.4));
    }

    // The two buy triggers disagree on a dip followed by a further dip.
    #[test]
    fn test_buy_trigger_variants_disagree_on_falling_next() {
        let w = window(Some(dec!(100)), dec!(99), Some(dec!(98)));
        let streak = StreakState::new();

        assert_eq!(engine(BuyTrigger::LookAhead).decide(&w, &streak).action, Action::None);
        assert_eq!(engine(BuyTrigger::Causal).decide(&w, &streak).action, Action::Buy);
    }

    #[test]
    fn test_flat_price_is_not_a_rise() {
        let w = window(Some(dec!(100)), dec!(100), Some(dec!(101)));
        let streak = StreakState::new();

        assert_eq!(engine(BuyTrigger::LookAhead).decide(&w, &streak).action, Action::Buy);
        assert_eq!(engine(BuyTrigger::Causal).decide(&w, &streak).action, Action::Buy);
    }

    #[test]
    fn test_look_ahead_without_next_holds() {
        let w = window(Some(dec!(100)), dec!(99), None);
        let decision = engine(BuyTrigger::LookAhead).decide(&w, &StreakState::new());
        assert_eq!(decision.action, Action::None);
    }

    #[test]
    fn test_streaks_are_exclusive() {
        let mut streak = StreakState::new();
        let actions = [
            Action::Buy,
            Action::Buy,
            Action::None,
            Action::Sell,
            Action::Buy,
            Action::Sell,
            Action::Sell,
            Action::Sell,
        ];

        for action in actions {
            streak.record(action);
            assert!(!(streak.buy_streak() > 1 && streak.sell_streak() > 1));
        }
        assert_eq!(streak.sell_streak(), 4);
        assert_eq!(streak.buy_streak(), 1);
    }

    #[test]
    fn test_all_in_sizing() {
        let engine = StrategyEngine::new(StrategyConfig {
            sizing: TradeSizing::AllIn,
            buy_trigger: BuyTrigger::Causal,
            ..Default::default()
        })
        .unwrap();

        let decision = engine.decide(&window(Some(dec!(10)), dec!(9), None), &StreakState::new());
        assert_eq!(decision.size_fraction, Decimal::ONE);
    }

    #[test]
    fn test_window_at_edges() {
        let prices = PriceSeries::new(vec![dec!(1), dec!(2), dec!(3)]).unwrap();

        let first = PriceWindow::at(&prices, 0).unwrap();
        assert_eq!(first.previous, None);
        assert_eq!(first.next, Some(dec!(2)));

        let last = PriceWindow::at(&prices, 2).unwrap();
        assert_eq!(last.previous, Some(dec!(2)));
        assert_eq!(last.next, None);
        assert!(last.is_rise());

        assert!(PriceWindow::at(&prices, 3).is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StrategyConfig {
            max_transaction_modifier: Decimal::ZERO,
            ..Default::default()
        };
        assert!(StrategyEngine::new(config).is_err());
    }
}

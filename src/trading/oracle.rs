//! Hindsight benchmark: best-case balance of buy-low/sell-high with full
//! knowledge of the next price.
//!
//! Not a tradable strategy. It peeks at `prices[i + 1]`, invests everything at
//! every dip that is about to recover and dumps everything on every rise. Use
//! it as an upper reference for [`StrategyEngine`](super::StrategyEngine)
//! results, never as a decision rule.

use rust_decimal::Decimal;

use crate::error::{SimError, SimResult};
use crate::ledger::Ledger;

/// Final cash after replaying the all-in hindsight rule over `prices`.
///
/// Buys fractional shares, so the whole balance is invested on every dip. A
/// whole-share variant would round the count down and keep the change in cash.
pub fn maximize_bank_balance(prices: &[Decimal], initial_balance: Decimal) -> SimResult<Decimal> {
    let Some(&last) = prices.last() else {
        return Err(SimError::EmptySeries);
    };

    let mut ledger = Ledger::new(initial_balance)?;

    for (i, &price) in prices.iter().enumerate() {
        let rose = i > 0 && price > prices[i - 1];
        let will_rise = prices.get(i + 1).is_some_and(|&next| price < next);

        if rose {
            ledger.liquidate(price)?;
        } else if will_rise {
            ledger.buy(ledger.cash(), price)?;
        } else {
            ledger.hold();
        }
    }

    ledger.liquidate(last)?;
    Ok(ledger.cash())
}

//! Cash and share accounts moved together, one operation per tick.

mod account;

pub use account::{CashAccount, PositionAccount};

use rust_decimal::Decimal;

use crate::error::{SimError, SimResult};

/// Cash plus a single-symbol share position.
///
/// Every method appends exactly one entry to both histories or fails without
/// touching either account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    cash: CashAccount,
    position: PositionAccount,
}

impl Ledger {
    /// Open a ledger with `initial_cash` and no shares.
    pub fn new(initial_cash: Decimal) -> SimResult<Self> {
        Ok(Self {
            cash: CashAccount::new(initial_cash)?,
            position: PositionAccount::new(Decimal::ZERO)?,
        })
    }

    pub fn cash(&self) -> Decimal {
        self.cash.balance()
    }

    pub fn shares(&self) -> Decimal {
        self.position.shares()
    }

    pub fn cash_history(&self) -> &[Decimal] {
        self.cash.history()
    }

    pub fn share_history(&self) -> &[Decimal] {
        self.position.history()
    }

    /// Index of the next operation, which is the tick being applied when the
    /// ledger is driven one operation per tick.
    pub fn next_operation(&self) -> usize {
        self.cash.operations()
    }

    /// Cash plus shares marked at `price`.
    pub fn value_at(&self, price: Decimal) -> Decimal {
        self.cash() + self.shares() * price
    }

    /// Spend `amount` of cash on shares at `price`. Returns shares bought.
    pub fn buy(&mut self, amount: Decimal, price: Decimal) -> SimResult<Decimal> {
        self.check_price(price)?;
        if amount < Decimal::ZERO {
            return Err(SimError::InvalidAmount(amount));
        }

        let bought = amount / price;
        self.cash.withdraw(amount)?;
        self.position.add_shares(bought)?;
        Ok(bought)
    }

    /// Sell `count` shares at `price`. Returns the cash received.
    pub fn sell(&mut self, count: Decimal, price: Decimal) -> SimResult<Decimal> {
        self.check_price(price)?;
        if count < Decimal::ZERO {
            return Err(SimError::InvalidAmount(count));
        }

        let proceeds = count * price;
        self.position.reduce_shares(count)?;
        self.cash.deposit(proceeds)?;
        Ok(proceeds)
    }

    /// Sell the whole position at `price`.
    pub fn liquidate(&mut self, price: Decimal) -> SimResult<Decimal> {
        self.sell(self.shares(), price)
    }

    pub fn hold(&mut self) {
        self.cash.record_no_op();
        self.position.record_no_op();
    }

    fn check_price(&self, price: Decimal) -> SimResult<()> {
        if price <= Decimal::ZERO {
            return Err(SimError::InvalidPrice {
                index: self.next_operation(),
                price,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_then_liquidate() {
        let mut ledger = Ledger::new(dec!(100)).unwrap();

        let bought = ledger.buy(dec!(50), dec!(25)).unwrap();
        assert_eq!(bought, dec!(2));
        assert_eq!(ledger.cash(), dec!(50));

        let proceeds = ledger.liquidate(dec!(30)).unwrap();
        assert_eq!(proceeds, dec!(60));
        assert_eq!(ledger.cash(), dec!(110));
        assert_eq!(ledger.shares(), Decimal::ZERO);

        assert_eq!(ledger.cash_history(), &[dec!(100), dec!(50), dec!(110)]);
        assert_eq!(ledger.share_history(), &[dec!(0), dec!(2), dec!(0)]);
    }

    #[test]
    fn test_failed_buy_touches_nothing() {
        let mut ledger = Ledger::new(dec!(10)).unwrap();

        let err = ledger.buy(dec!(11), dec!(5)).unwrap_err();
        assert!(matches!(err, SimError::InsufficientFunds { .. }));
        assert_eq!(ledger.cash_history().len(), 1);
        assert_eq!(ledger.share_history().len(), 1);
    }

    #[test]
    fn test_hold_keeps_histories_aligned() {
        let mut ledger = Ledger::new(dec!(10)).unwrap();
        ledger.hold();
        ledger.sell(Decimal::ZERO, dec!(3)).unwrap();

        assert_eq!(ledger.cash_history().len(), 3);
        assert_eq!(ledger.share_history().len(), 3);
        assert_eq!(ledger.value_at(dec!(3)), dec!(10));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let mut ledger = Ledger::new(dec!(10)).unwrap();
        ledger.hold();

        assert_eq!(
            ledger.buy(dec!(5), Decimal::ZERO),
            Err(SimError::InvalidPrice {
                index: 1,
                price: Decimal::ZERO
            })
        );
        assert_eq!(
            ledger.sell(Decimal::ZERO, dec!(-2)),
            Err(SimError::InvalidPrice {
                index: 1,
                price: dec!(-2)
            })
        );
        assert_eq!(ledger.cash_history(), &[dec!(10), dec!(10)]);
        assert_eq!(ledger.next_operation(), 1);
    }
}

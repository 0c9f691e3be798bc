//! Guarded quantity with an append-only history.
//!
//! Cash and shares share the same shape: a non-negative balance, a checked
//! debit and a history holding the balance after every operation. The unit
//! marker only decides which error a shortfall produces.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::error::{SimError, SimResult};

/// What an account holds.
pub trait Unit {
    /// Error reported when a debit exceeds the balance.
    fn shortfall(requested: Decimal, available: Decimal) -> SimError;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shares;

impl Unit for Cash {
    fn shortfall(requested: Decimal, available: Decimal) -> SimError {
        SimError::InsufficientFunds {
            requested,
            available,
        }
    }
}

impl Unit for Shares {
    fn shortfall(requested: Decimal, available: Decimal) -> SimError {
        SimError::InsufficientShares {
            requested,
            available,
        }
    }
}

/// Non-negative balance whose history has one entry per operation plus the
/// opening balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account<U: Unit> {
    balance: Decimal,
    history: Vec<Decimal>,
    _unit: PhantomData<U>,
}

pub type CashAccount = Account<Cash>;
pub type PositionAccount = Account<Shares>;

impl<U: Unit> Account<U> {
    /// Open an account. A negative opening balance is rejected.
    pub fn new(initial: Decimal) -> SimResult<Self> {
        if initial < Decimal::ZERO {
            return Err(SimError::InvalidAmount(initial));
        }

        Ok(Self {
            balance: initial,
            history: vec![initial],
            _unit: PhantomData,
        })
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Balance after every operation, opening balance first.
    pub fn history(&self) -> &[Decimal] {
        &self.history
    }

    /// Number of operations applied since opening.
    pub fn operations(&self) -> usize {
        self.history.len() - 1
    }

    fn credit(&mut self, amount: Decimal) -> SimResult<()> {
        if amount < Decimal::ZERO {
            return Err(SimError::InvalidAmount(amount));
        }
        self.balance += amount;
        self.history.push(self.balance);
        Ok(())
    }

    fn debit(&mut self, amount: Decimal) -> SimResult<()> {
        if amount < Decimal::ZERO {
            return Err(SimError::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(U::shortfall(amount, self.balance));
        }
        self.balance -= amount;
        self.history.push(self.balance);
        Ok(())
    }

    /// Append the unchanged balance so history stays aligned with ticks.
    pub fn record_no_op(&mut self) {
        self.history.push(self.balance);
    }
}

impl Account<Cash> {
    pub fn deposit(&mut self, amount: Decimal) -> SimResult<()> {
        self.credit(amount)
    }

    /// Fails with `InsufficientFunds` and leaves the account untouched when
    /// `amount` exceeds the balance.
    pub fn withdraw(&mut self, amount: Decimal) -> SimResult<()> {
        self.debit(amount)
    }
}

impl Account<Shares> {
    pub fn shares(&self) -> Decimal {
        self.balance
    }

    pub fn add_shares(&mut self, count: Decimal) -> SimResult<()> {
        self.credit(count)
    }

    /// Fails with `InsufficientShares` and leaves the account untouched when
    /// `count` exceeds the position.
    pub fn reduce_shares(&mut self, count: Decimal) -> SimResult<()> {
        self.debit(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_withdraw_overdraft_leaves_account_unchanged() {
        let mut cash = CashAccount::new(dec!(100)).unwrap();

        let err = cash.withdraw(dec!(150)).unwrap_err();

        assert_eq!(
            err,
            SimError::InsufficientFunds {
                requested: dec!(150),
                available: dec!(100)
            }
        );
        assert_eq!(cash.balance(), dec!(100));
        assert_eq!(cash.history(), &[dec!(100)]);
    }

    #[test]
    fn test_every_operation_appends_history() {
        let mut cash = CashAccount::new(dec!(100)).unwrap();
        cash.withdraw(dec!(40)).unwrap();
        cash.record_no_op();
        cash.deposit(dec!(15)).unwrap();

        assert_eq!(cash.history(), &[dec!(100), dec!(60), dec!(60), dec!(75)]);
        assert_eq!(cash.operations(), 3);
    }

    #[test]
    fn test_reduce_shares_beyond_position() {
        let mut position = PositionAccount::new(Decimal::ZERO).unwrap();
        position.add_shares(dec!(2.5)).unwrap();

        let err = position.reduce_shares(dec!(3)).unwrap_err();
        assert!(matches!(err, SimError::InsufficientShares { .. }));
        assert_eq!(position.shares(), dec!(2.5));

        position.reduce_shares(dec!(2.5)).unwrap();
        assert_eq!(position.shares(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut cash = CashAccount::new(dec!(10)).unwrap();

        assert_eq!(cash.deposit(dec!(-1)), Err(SimError::InvalidAmount(dec!(-1))));
        assert_eq!(cash.withdraw(dec!(-1)), Err(SimError::InvalidAmount(dec!(-1))));
        assert_eq!(cash.history().len(), 1);
        assert!(CashAccount::new(dec!(-5)).is_err());
    }
}

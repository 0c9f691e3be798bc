//! Typed failures of the simulation core.
//!
//! Everything the ledger, strategy and runner can refuse is a variant here, so
//! callers can inspect a rejection before deciding what to do with it. The CLI
//! and I/O layers wrap these in `anyhow` like every other error.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::backtest::RunnerState;

pub type SimResult<T> = std::result::Result<T, SimError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    #[error("insufficient shares: requested {requested}, held {available}")]
    InsufficientShares { requested: Decimal, available: Decimal },

    #[error("price series is empty")]
    EmptySeries,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("amount must be non-negative, got {0}")]
    InvalidAmount(Decimal),

    #[error("price at index {index} must be positive, got {price}")]
    InvalidPrice { index: usize, price: Decimal },

    #[error("cannot {operation} while runner is {state:?}")]
    InvalidState {
        state: RunnerState,
        operation: &'static str,
    },
}

impl SimError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

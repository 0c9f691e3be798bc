//! Trading logic: decision rule, streak position sizing, hindsight oracle.

mod config;
mod oracle;
mod position_sizer;
mod strategy;

pub use config::{BuyTrigger, SimulationConfig, StrategyConfig, TradeSizing};
pub use oracle::maximize_bank_balance;
pub use position_sizer::PositionSizer;
pub use strategy::{Decision, PriceWindow, StrategyEngine, StreakState};

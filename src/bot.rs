//! Live trading loop: polls a broker and trades the strategy one tick at a time.
//!
//! Handles:
//! - Polling the latest price on a fixed interval
//! - Skipping polls while the market is closed
//! - Sizing orders from buying power and held equity
//! - Keeping an audit trail of every decision
//! - Optional liquidation on shutdown
//!
//! Real brokerage connectivity is not part of this crate. [`PaperBroker`]
//! replays a price series against an in-memory ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::error::{SimError, SimResult};
use crate::ledger::Ledger;
use crate::models::{Action, PriceSeries, TickRecord};
use crate::trading::{PriceWindow, StrategyConfig, StrategyEngine, StreakState};

/// Brokerage operations the live loop relies on. Amounts are in USD.
#[allow(async_fn_in_trait)]
pub trait Broker {
    async fn latest_price(&self, symbol: &str) -> Result<Decimal>;
    async fn buying_power(&self) -> Result<Decimal>;
    /// Market value of the position held in `symbol`.
    async fn equity(&self, symbol: &str) -> Result<Decimal>;
    async fn place_buy_order(&self, symbol: &str, usd_amount: Decimal) -> Result<()>;
    async fn place_sell_order(&self, symbol: &str, usd_amount: Decimal) -> Result<()>;
    async fn is_market_open(&self) -> Result<bool>;
}

// ============== Paper Broker ==============

struct PaperState {
    ledger: Ledger,
    cursor: usize,
    current_price: Option<Decimal>,
}

/// In-memory broker over a replayed price series.
///
/// Every `latest_price` call advances one tick; the market closes once the
/// series is exhausted.
pub struct PaperBroker {
    symbol: String,
    prices: PriceSeries,
    state: RwLock<PaperState>,
}

impl PaperBroker {
    pub fn new(symbol: impl Into<String>, prices: PriceSeries, initial_cash: Decimal) -> SimResult<Self> {
        Ok(Self {
            symbol: symbol.into(),
            prices,
            state: RwLock::new(PaperState {
                ledger: Ledger::new(initial_cash)?,
                cursor: 0,
                current_price: None,
            }),
        })
    }

    pub async fn cash(&self) -> Decimal {
        self.state.read().await.ledger.cash()
    }

    pub async fn shares(&self) -> Decimal {
        self.state.read().await.ledger.shares()
    }

    fn check_symbol(&self, symbol: &str) -> Result<()> {
        if symbol != self.symbol {
            anyhow::bail!("Unknown symbol {symbol}, paper broker trades {}", self.symbol);
        }
        Ok(())
    }
}

impl Broker for PaperBroker {
    async fn latest_price(&self, symbol: &str) -> Result<Decimal> {
        self.check_symbol(symbol)?;
        let mut state = self.state.write().await;

        let price = self
            .prices
            .get(state.cursor)
            .context("Price feed exhausted")?;
        state.cursor += 1;
        state.current_price = Some(price);
        Ok(price)
    }

    async fn buying_power(&self) -> Result<Decimal> {
        Ok(self.state.read().await.ledger.cash())
    }

    async fn equity(&self, symbol: &str) -> Result<Decimal> {
        self.check_symbol(symbol)?;
        let state = self.state.read().await;
        let price = state.current_price.unwrap_or(Decimal::ZERO);
        Ok(state.ledger.shares() * price)
    }

    async fn place_buy_order(&self, symbol: &str, usd_amount: Decimal) -> Result<()> {
        self.check_symbol(symbol)?;
        let mut state = self.state.write().await;
        let price = state.current_price.context("No quote yet")?;

        state.ledger.buy(usd_amount, price)?;
        Ok(())
    }

    async fn place_sell_order(&self, symbol: &str, usd_amount: Decimal) -> Result<()> {
        self.check_symbol(symbol)?;
        let mut state = self.state.write().await;
        let price = state.current_price.context("No quote yet")?;

        let held = state.ledger.shares();
        let equity = held * price;
        let count = if usd_amount > equity {
            return Err(SimError::InsufficientShares {
                requested: usd_amount / price,
                available: held,
            }
            .into());
        } else if usd_amount == equity {
            held
        } else {
            (usd_amount / price).min(held)
        };

        state.ledger.sell(count, price)?;
        Ok(())
    }

    async fn is_market_open(&self) -> Result<bool> {
        Ok(self.state.read().await.cursor < self.prices.len())
    }
}

// ============== Live Trader ==============

/// Live loop configuration.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Symbol to trade
    pub symbol: String,

    /// Time between polls
    pub poll_interval: Duration,

    /// Orders below this USD amount are not sent
    pub min_order_usd: Decimal,

    /// Stop after this many polls (open or closed market)
    pub max_polls: Option<u64>,

    /// Sell the whole position when the loop stops
    pub liquidate_on_exit: bool,

    /// Decision rule; must use the causal buy trigger
    pub strategy: StrategyConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".to_string(),
            poll_interval: Duration::from_secs(60),
            min_order_usd: dec!(1),
            max_polls: None,
            liquidate_on_exit: true,
            strategy: StrategyConfig {
                buy_trigger: crate::trading::BuyTrigger::Causal,
                ..Default::default()
            },
        }
    }
}

/// Drives [`StrategyEngine`] against a [`Broker`], one poll at a time.
pub struct LiveTrader<B: Broker> {
    config: LiveConfig,
    broker: B,
    engine: StrategyEngine,
    streak: StreakState,
    last_price: Option<Decimal>,
    ticks: Vec<TickRecord>,
    polls: u64,
    shutdown: Arc<AtomicBool>,
}

impl<B: Broker> LiveTrader<B> {
    /// Create a trader. A look-ahead buy trigger is rejected: live prices have
    /// no future.
    pub fn new(config: LiveConfig, broker: B) -> SimResult<Self> {
        if config.strategy.buy_trigger.needs_next_price() {
            return Err(SimError::config(
                "look-ahead buy trigger needs future prices and cannot trade live",
            ));
        }
        if config.poll_interval.is_zero() {
            return Err(SimError::config("poll interval must be positive"));
        }
        let engine = StrategyEngine::new(config.strategy.clone())?;

        Ok(Self {
            config,
            broker,
            engine,
            streak: StreakState::new(),
            last_price: None,
            ticks: Vec::new(),
            polls: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Decisions taken so far.
    pub fn ticks(&self) -> &[TickRecord] {
        &self.ticks
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            poll_interval = ?self.config.poll_interval,
            sizing = ?self.engine.config().sizing,
            "Starting live trading loop"
        );

        let mut poll_interval = interval(self.config.poll_interval);

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        let ctrl_c = tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            if self.config.max_polls.is_some_and(|max| self.polls >= max) {
                info!(polls = self.polls, "Poll limit reached");
                break;
            }

            poll_interval.tick().await;
            self.polls += 1;

            match self.tick().await {
                Ok(Some(record)) => {
                    info!(
                        price = %record.price,
                        action = %record.action,
                        cash = %record.cash_after,
                        delta = %record.cash_delta,
                        "Tick"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Error in trading tick");
                }
            }
        }

        ctrl_c.abort();

        if self.config.liquidate_on_exit {
            self.liquidate().await?;
        }

        info!(ticks = self.ticks.len(), "Live trading loop stopped");
        Ok(())
    }

    /// Single poll. Returns `None` while the market is closed.
    pub async fn tick(&mut self) -> Result<Option<TickRecord>> {
        if !self.broker.is_market_open().await? {
            debug!("Market closed, skipping poll");
            return Ok(None);
        }

        let symbol = self.config.symbol.clone();
        let price = self.broker.latest_price(&symbol).await?;
        if price <= Decimal::ZERO {
            return Err(SimError::InvalidPrice {
                index: self.ticks.len(),
                price,
            }
            .into());
        }

        let window = PriceWindow {
            previous: self.last_price.replace(price),
            current: price,
            next: None,
        };
        let decision = self.engine.decide(&window, &self.streak);

        let usd = match decision.action {
            Action::Buy => self.broker.buying_power().await? * decision.size_fraction,
            Action::Sell => self.broker.equity(&symbol).await? * decision.size_fraction,
            Action::None => Decimal::ZERO,
        };
        let cash_delta = if self.meets_minimum(usd) {
            self.execute(decision.action, usd).await?
        } else {
            Decimal::ZERO
        };
        self.streak.record(decision.action);

        let record = self.record(price, decision.action, cash_delta).await?;
        Ok(Some(record))
    }

    /// Sell everything held at the last seen price.
    pub async fn liquidate(&mut self) -> Result<Option<TickRecord>> {
        let Some(price) = self.last_price else {
            return Ok(None);
        };

        let symbol = self.config.symbol.clone();
        let equity = self.broker.equity(&symbol).await?;
        if equity <= Decimal::ZERO {
            return Ok(None);
        }

        info!(equity = %equity, "Liquidating position");
        let cash_delta = self.execute(Action::Sell, equity).await?;
        self.streak.record(Action::Sell);

        let record = self.record(price, Action::Sell, cash_delta).await?;
        Ok(Some(record))
    }

    /// Send the order and return the cash it actually moved.
    async fn execute(&self, action: Action, usd: Decimal) -> Result<Decimal> {
        let symbol = &self.config.symbol;
        let before = self.broker.buying_power().await?;

        match action {
            Action::Buy => self.broker.place_buy_order(symbol, usd).await?,
            Action::Sell => self.broker.place_sell_order(symbol, usd).await?,
            Action::None => return Ok(Decimal::ZERO),
        }

        let after = self.broker.buying_power().await?;
        Ok(after - before)
    }

    fn meets_minimum(&self, usd: Decimal) -> bool {
        if usd <= Decimal::ZERO {
            return false;
        }
        if usd < self.config.min_order_usd {
            warn!(amount = %usd, minimum = %self.config.min_order_usd, "Order below minimum, not sent");
            return false;
        }
        true
    }

    async fn record(&mut self, price: Decimal, action: Action, cash_delta: Decimal) -> Result<TickRecord> {
        let cash_after = self.broker.buying_power().await?;
        let equity = self.broker.equity(&self.config.symbol).await?;

        let record = TickRecord {
            index: self.ticks.len(),
            price,
            action,
            cash_after,
            shares_after: equity / price,
            cash_delta,
        };
        self.ticks.push(record);
        Ok(record)
    }
}

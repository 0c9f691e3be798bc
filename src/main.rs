//! Stonks: buy-low/sell-high trading toy.
//!
//! Generates synthetic price series, replays a streak-sized momentum-reversal
//! strategy against them with a full audit trail, compares the result with a
//! hindsight oracle, and can run the same rule in a paper-trading loop.

mod backtest;
mod bot;
mod data;
mod db;
mod error;
mod ledger;
mod metrics;
mod models;
mod report;
mod trading;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::backtest::{run_batch, simulate};
use crate::bot::{LiveConfig, LiveTrader, PaperBroker};
use crate::data::{
    clean_dir, series_files_in, write_values, CsvPriceFile, GeneratorConfig, PriceSeriesSource,
    RandomWalkGenerator,
};
use crate::db::Database;
use crate::models::PriceSeries;
use crate::report::{inconsistent_rows, read_audit, CsvReportWriter, ReportWriter};
use crate::trading::{BuyTrigger, SimulationConfig, StrategyConfig, TradeSizing};

/// Stock trading simulator CLI.
#[derive(Parser)]
#[command(name = "stonks")]
#[command(about = "Simulate a buy-low/sell-high strategy on synthetic or saved prices", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "STONKS_DATABASE_URL", default_value = "sqlite:./stonks.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct StrategyArgs {
    /// Starting cash balance
    #[arg(long, env = "STONKS_INITIAL_CASH", default_value = "100")]
    initial_cash: Decimal,

    /// Fraction committed per step of a streak (0-1]
    #[arg(long, env = "STONKS_TRANSACTION_MODIFIER", default_value = "0.2")]
    transaction_modifier: Decimal,

    /// Cap on the fraction committed in one tick (0-1]
    #[arg(long, env = "STONKS_MAX_TRANSACTION_MODIFIER", default_value = "0.5")]
    max_transaction_modifier: Decimal,

    /// Buy rule: look-ahead (simulation only) or causal
    #[arg(long, value_enum, env = "STONKS_BUY_TRIGGER", default_value = "look-ahead")]
    buy_trigger: BuyTrigger,

    /// Trade size: streak-scaled or all-in
    #[arg(long, value_enum, env = "STONKS_SIZING", default_value = "streak")]
    sizing: TradeSizing,
}

impl StrategyArgs {
    fn strategy(&self) -> StrategyConfig {
        StrategyConfig {
            transaction_modifier: self.transaction_modifier,
            max_transaction_modifier: self.max_transaction_modifier,
            buy_trigger: self.buy_trigger,
            sizing: self.sizing,
        }
    }

    fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            initial_cash: self.initial_cash,
            strategy: self.strategy(),
        }
    }
}

#[derive(Args, Clone)]
struct GeneratorArgs {
    /// Prices per generated series
    #[arg(long, env = "STONKS_TICKS", default_value = "390")]
    ticks: usize,

    /// First price of a generated series
    #[arg(long, default_value = "100")]
    initial_price: f64,

    /// Scale of each random step
    #[arg(long, env = "STONKS_PRICE_VARIANCE", default_value = "0.1")]
    variance: f64,

    /// Random seed for reproducible series
    #[arg(long, env = "STONKS_SEED")]
    seed: Option<u64>,
}

impl GeneratorArgs {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            ticks: self.ticks,
            initial_price: self.initial_price,
            variance: self.variance,
            seed: self.seed,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic price series into a folder
    Generate {
        /// Number of series to generate
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Output folder
        #[arg(short, long, default_value = "outputs/data")]
        out: PathBuf,

        /// Delete existing files in the output folder first
        #[arg(long)]
        clean: bool,

        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// Simulate the strategy on one series
    Simulate {
        /// Price file (one value per row); a series is generated when absent
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Folder to write the audit trail and histories to
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Save the run to the database
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// Simulate every series in a folder, or a batch of generated ones
    Batch {
        /// Folder of price files
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// Number of series to generate when no folder is given
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Save every run to the database
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// List saved simulation runs
    History {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Check that an audit trail file adds up row by row
    Audit {
        /// Audit trail written by `simulate --report`
        file: PathBuf,

        /// Cash the run started with
        #[arg(long, env = "STONKS_INITIAL_CASH", default_value = "100")]
        initial_cash: Decimal,
    },

    /// Show the audit trail of a saved run
    Show {
        /// Run id
        id: String,
    },

    /// Paper-trade the causal strategy against a replayed series
    Paper {
        /// Price file to replay; a series is generated when absent
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Symbol name
        #[arg(long, env = "STONKS_SYMBOL", default_value = "SPY")]
        symbol: String,

        /// Milliseconds between polls
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// Minimum order size in USD
        #[arg(long, default_value = "1")]
        min_order: Decimal,

        /// Keep the position when stopping
        #[arg(long)]
        no_liquidate: bool,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate {
            count,
            out,
            clean,
            generator,
        } => {
            if clean {
                let removed = clean_dir(&out)?;
                info!(removed = removed, folder = %out.display(), "Cleaned output folder");
            }
            std::fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;

            let mut generator = RandomWalkGenerator::new(generator.config())?;
            let stamp = chrono::Utc::now().timestamp();
            info!(
                count = count,
                ticks = generator.config().ticks,
                variance = generator.config().variance,
                "Generating price series"
            );

            for i in 0..count {
                let series = generator.generate()?;
                let path = out.join(format!("{}_{}_{:.4}.csv", stamp, i, series.net_change()));
                write_values(&path, series.prices())?;
                println!("{}", path.display());
            }
        }

        Commands::Simulate {
            file,
            report,
            save,
            strategy,
            generator,
        } => {
            let config = strategy.simulation();
            let (name, series) = load_series(file, &generator)?;

            info!(source = %name, ticks = series.len(), "Simulating");
            let outcome = simulate(&config, series.prices())?;
            println!("{}", outcome);

            if let Some(dir) = report {
                let mut writer = CsvReportWriter::new(dir)?;
                let files = writer.write(&file_stem(&name), &outcome)?;
                println!("Audit trail:   {}", files.audit.display());
                println!("Cash history:  {}", files.cash_history.display());
                println!("Share history: {}", files.share_history.display());
            }

            if save {
                let db = Database::new(&cli.database).await?;
                let id = db.save_run(&name, &outcome).await?;
                println!("Saved run {}", id);
            }
        }

        Commands::Batch {
            folder,
            count,
            save,
            strategy,
            generator,
        } => {
            let config = strategy.simulation();
            let series = collect_batch(folder, count, &generator)?;
            if series.is_empty() {
                println!("No price series to simulate.");
                return Ok(());
            }

            let entries = run_batch(&config, series).await?;

            println!(
                "\n{:<32} {:>12} {:>12} {:>12} {:>12}",
                "SERIES", "INITIAL", "FINAL", "PROFIT", "ORACLE"
            );
            println!("{}", "-".repeat(84));
            for entry in &entries {
                println!(
                    "{:<32} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
                    truncate(&entry.name, 30),
                    entry.outcome.initial_cash(),
                    entry.outcome.final_cash(),
                    entry.profit(),
                    entry.oracle_balance
                );
            }

            let total: Decimal = entries.iter().map(|e| e.profit()).sum();
            let winners = entries.iter().filter(|e| e.profit() > Decimal::ZERO).count();
            println!("{}", "-".repeat(84));
            println!(
                "Runs: {}  Profitable: {}  Total profit: ${:.2}",
                entries.len(),
                winners,
                total
            );

            if save {
                let db = Database::new(&cli.database).await?;
                for entry in &entries {
                    if let Err(e) = db.save_run(&entry.name, &entry.outcome).await {
                        warn!(series = %entry.name, error = %e, "Failed to save run");
                    }
                }
                println!("Saved {} runs", entries.len());
            }
        }

        Commands::History { limit } => {
            let db = Database::new(&cli.database).await?;
            let runs = db.get_recent_runs(limit).await?;
            let total = db.count_runs().await?;

            if runs.is_empty() {
                println!("No saved runs. Use 'stonks simulate --save' to record one.");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<24} {:>6} {:>10} {:>10} {:>10} {:>8} {:>8}",
                "ID", "SOURCE", "TICKS", "INITIAL", "FINAL", "ORACLE", "RETURN", "MDD"
            );
            println!("{}", "-".repeat(122));
            for run in &runs {
                let oracle = run
                    .oracle_balance
                    .map_or_else(|| "-".to_string(), |b| format!("{:.2}", b));
                println!(
                    "{:<38} {:<24} {:>6} {:>10.2} {:>10.2} {:>10} {:>7.2}% {:>7.2}%",
                    run.id,
                    truncate(&run.source, 22),
                    run.ticks,
                    run.initial_cash,
                    run.final_cash,
                    oracle,
                    run.total_return * 100.0,
                    run.max_drawdown * 100.0
                );
            }
            println!("\nShowing {} of {} saved runs", runs.len(), total);
        }

        Commands::Audit { file, initial_cash } => {
            let rows = read_audit(&file)?;
            let bad = inconsistent_rows(&rows, initial_cash);

            println!("\n=== Audit: {} ===", file.display());
            println!("Rows:          {}", rows.len());
            if let Some(last) = rows.last() {
                println!("Final value:   ${:.2}", last.portfolio_value);
            }
            if bad.is_empty() {
                println!("Consistent:    yes");
            } else {
                println!("Consistent:    no ({} rows)", bad.len());
                for row in bad.iter().take(20) {
                    println!("  row {}", row + 1);
                }
                anyhow::bail!("Audit trail {} does not add up", file.display());
            }
        }

        Commands::Show { id } => {
            let db = Database::new(&cli.database).await?;
            let run = db
                .get_run(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Run not found: {}", id))?;
            let ticks = db.get_run_ticks(&id).await?;

            println!("\n=== Run: {} ===", run.id);
            println!("Source:   {}", run.source);
            println!("Created:  {}", run.created_at);
            println!("Config:   {}", run.config_json);
            println!(
                "\n{:>6} {:>12} {:<5} {:>12} {:>14} {:>12} {:>12}",
                "TICK", "PRICE", "ACT", "CASH", "SHARES", "DELTA", "VALUE"
            );
            for tick in ticks {
                println!(
                    "{:>6} {:>12} {:<5} {:>12} {:>14} {:>12} {:>12.2}",
                    tick.tick_index,
                    truncate(&tick.price, 12),
                    tick.action,
                    truncate(&tick.cash_after, 12),
                    truncate(&tick.shares_after, 14),
                    truncate(&tick.cash_delta, 12),
                    tick.portfolio_value
                );
            }
        }

        Commands::Paper {
            file,
            symbol,
            interval_ms,
            min_order,
            no_liquidate,
            strategy,
            generator,
        } => {
            let (name, series) = load_series(file, &generator)?;
            let ticks = series.len() as u64;
            let broker = PaperBroker::new(&symbol, series, strategy.initial_cash)?;

            let config = LiveConfig {
                symbol,
                poll_interval: Duration::from_millis(interval_ms.max(1)),
                min_order_usd: min_order,
                max_polls: Some(ticks),
                liquidate_on_exit: !no_liquidate,
                // Live decisions cannot see the next price
                strategy: StrategyConfig {
                    buy_trigger: BuyTrigger::Causal,
                    ..strategy.strategy()
                },
            };
            let mut trader = LiveTrader::new(config, broker)?;

            println!("\n=== Paper Trading ===");
            println!("Source: {} ({} ticks)", name, ticks);
            println!("Capital: ${}", strategy.initial_cash);
            println!("\nThis is SIMULATED trading - no real money involved.");
            println!("Press Ctrl+C to stop.\n");

            trader.run().await?;

            let cash = trader.broker().cash().await;
            let shares = trader.broker().shares().await;
            println!("\nTicks traded:  {}", trader.ticks().len());
            println!("Final cash:    ${:.2}", cash);
            println!("Shares held:   {}", shares);
            println!("Profit:        ${:.2}", cash - strategy.initial_cash);
        }

        Commands::Config => {
            let sim = SimulationConfig::default();
            let generator = GeneratorConfig::default();
            let live = LiveConfig::default();

            println!("\n=== Strategy Configuration ===\n");
            println!("  Initial Cash:         ${}", sim.initial_cash);
            println!("  Transaction Modifier: {}%", sim.strategy.transaction_modifier * dec!(100));
            println!("  Max Transaction Mod:  {}%", sim.strategy.max_transaction_modifier * dec!(100));
            println!("  Buy Trigger:          {:?}", sim.strategy.buy_trigger);
            println!("  Sizing:               {:?}", sim.strategy.sizing);

            println!("\n=== Generator Configuration ===\n");
            println!("  Ticks:                {}", generator.ticks);
            println!("  Initial Price:        {}", generator.initial_price);
            println!("  Price Variance:       {}", generator.variance);
            println!("  Step Drift:           {}", generator.drift);
            println!("  Step Std Dev:         {}", generator.std_dev);
            println!("  Min Price:            {}", generator.min_price);

            println!("\n=== Live Configuration ===\n");
            println!("  Symbol:               {}", live.symbol);
            println!("  Poll Interval:        {:?}", live.poll_interval);
            println!("  Min Order:            ${}", live.min_order_usd);
            println!("  Liquidate on Exit:    {}", live.liquidate_on_exit);
        }
    }

    Ok(())
}

/// Load a price file, or generate a series when no file is given.
fn load_series(file: Option<PathBuf>, generator: &GeneratorArgs) -> Result<(String, PriceSeries)> {
    let mut source: Box<dyn PriceSeriesSource> = match file {
        Some(path) => Box::new(CsvPriceFile::new(path)),
        None => Box::new(RandomWalkGenerator::new(generator.config())?),
    };
    let series = source.load()?;
    Ok((source.name(), series))
}

/// Series for a batch run: every file in `folder`, or `count` generated ones.
/// Unreadable files are logged and skipped.
fn collect_batch(
    folder: Option<PathBuf>,
    count: usize,
    generator: &GeneratorArgs,
) -> Result<Vec<(String, Vec<Decimal>)>> {
    let mut series = Vec::new();

    match folder {
        Some(dir) => {
            for path in series_files_in(&dir)? {
                let mut source = CsvPriceFile::new(path);
                match source.load() {
                    Ok(s) => series.push((source.name(), s.prices().to_vec())),
                    Err(e) => warn!(file = %source.path().display(), error = %e, "Skipping file"),
                }
            }
        }
        None => {
            let mut generator = RandomWalkGenerator::new(generator.config())?;
            for i in 0..count {
                series.push((format!("generated-{}", i), generator.generate()?.prices().to_vec()));
            }
        }
    }

    Ok(series)
}

fn file_stem(name: &str) -> String {
    std::path::Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string())
}

/// Truncate a string to `max_len` characters, ending in an ellipsis when cut.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_and_long() {
        assert_eq!(truncate("day.csv", 30), "day.csv");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }

    #[test]
    fn test_truncate_non_ascii_name() {
        let name = "abéééééééééééééééééééééé.csv";
        let cut = truncate(name, 30);
        assert_eq!(cut, name);

        let cut = truncate(name, 10);
        assert_eq!(cut, "abééééé...");
        assert_eq!(cut.chars().count(), 10);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("1700000000_0_1.2345.csv"), "1700000000_0_1.2345");
        assert_eq!(file_stem("random-walk(seed=7)"), "random-walk(seed=7)");
    }
}

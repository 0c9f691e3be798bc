//! Database persistence for simulation history.
//!
//! Stores enough to reconstruct any past decision:
//! - One row per simulation run with its configuration and summary
//! - Every tick of the run's audit trail

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::backtest::SimulationOutcome;

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Stored simulation run summary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRun {
    pub id: String,
    pub source: String,
    pub ticks: i64,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub oracle_balance: Option<f64>,
    pub config_json: String,
    pub created_at: String,
}

/// Stored tick of a run's audit trail.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTick {
    pub tick_index: i64,
    pub price: String,
    pub action: String,
    pub cash_after: String,
    pub shares_after: String,
    pub cash_delta: String,
    pub portfolio_value: f64,
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS simulation_runs (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                ticks INTEGER NOT NULL,
                initial_cash REAL NOT NULL,
                final_cash REAL NOT NULL,
                total_return REAL NOT NULL,
                max_drawdown REAL NOT NULL DEFAULT 0,
                oracle_balance REAL,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Exact decimal strings, so a stored run replays bit-for-bit
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_ticks (
                run_id TEXT NOT NULL,
                tick_index INTEGER NOT NULL,
                price TEXT NOT NULL,
                action TEXT NOT NULL,
                cash_after TEXT NOT NULL,
                shares_after TEXT NOT NULL,
                cash_delta TEXT NOT NULL,
                portfolio_value REAL NOT NULL,
                PRIMARY KEY (run_id, tick_index),
                FOREIGN KEY (run_id) REFERENCES simulation_runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_created ON simulation_runs(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Runs ====================

    /// Save a finished run and its ticks. Returns the new run id.
    pub async fn save_run(&self, source: &str, outcome: &SimulationOutcome) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let metrics = outcome.metrics();
        let oracle = outcome.oracle_balance().ok().and_then(|b| b.to_f64());
        let config_json =
            serde_json::to_string(&outcome.config).context("Failed to encode run config")?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO simulation_runs
                (id, source, ticks, initial_cash, final_cash, total_return, max_drawdown,
                 oracle_balance, config_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
            "#,
        )
        .bind(&id)
        .bind(source)
        .bind(outcome.ticks.len() as i64)
        .bind(outcome.initial_cash().to_f64().unwrap_or(0.0))
        .bind(outcome.final_cash().to_f64().unwrap_or(0.0))
        .bind(metrics.total_return_pct.to_f64().unwrap_or(0.0))
        .bind(metrics.max_drawdown)
        .bind(oracle)
        .bind(&config_json)
        .execute(&mut *tx)
        .await?;

        for tick in &outcome.ticks {
            sqlx::query(
                r#"
                INSERT INTO run_ticks
                    (run_id, tick_index, price, action, cash_after, shares_after, cash_delta,
                     portfolio_value)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(tick.index as i64)
            .bind(tick.price.to_string())
            .bind(tick.action.as_str())
            .bind(tick.cash_after.to_string())
            .bind(tick.shares_after.to_string())
            .bind(tick.cash_delta.to_string())
            .bind(tick.portfolio_value().to_f64().unwrap_or(0.0))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to save simulation run")?;
        Ok(id)
    }

    /// Most recent runs first.
    pub async fn get_recent_runs(&self, limit: u32) -> Result<Vec<StoredRun>> {
        let runs = sqlx::query_as::<_, StoredRun>(
            "SELECT * FROM simulation_runs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    /// Get a run by id.
    pub async fn get_run(&self, id: &str) -> Result<Option<StoredRun>> {
        let run = sqlx::query_as::<_, StoredRun>("SELECT * FROM simulation_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    /// Ticks of a run in order.
    pub async fn get_run_ticks(&self, id: &str) -> Result<Vec<StoredTick>> {
        let ticks = sqlx::query_as::<_, StoredTick>(
            r#"
            SELECT tick_index, price, action, cash_after, shares_after, cash_delta, portfolio_value
            FROM run_ticks WHERE run_id = ? ORDER BY tick_index
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ticks)
    }

    /// Number of stored runs.
    pub async fn count_runs(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM simulation_runs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

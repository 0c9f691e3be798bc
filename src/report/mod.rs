//! Report writers: persist a finished run's audit trail and histories.
//!
//! The simulation core never touches the filesystem. Writers receive the
//! already-assembled [`SimulationOutcome`] and decide where it goes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::SimulationOutcome;
use crate::data::write_values;
use crate::models::{Action, TickRecord};

/// One line of the audit trail file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    #[serde(rename = "stock price")]
    pub price: Decimal,

    #[serde(rename = "cash")]
    pub cash: Decimal,

    #[serde(rename = "shares")]
    pub shares: Decimal,

    #[serde(rename = "value of shares")]
    pub share_value: Decimal,

    #[serde(rename = "action")]
    pub action: Action,

    #[serde(rename = "cash delta")]
    pub cash_delta: Decimal,

    #[serde(rename = "portfolio value")]
    pub portfolio_value: Decimal,
}

impl From<&TickRecord> for AuditRow {
    fn from(tick: &TickRecord) -> Self {
        Self {
            price: tick.price,
            cash: tick.cash_after,
            shares: tick.shares_after,
            share_value: tick.share_value(),
            action: tick.action,
            cash_delta: tick.cash_delta,
            portfolio_value: tick.portfolio_value(),
        }
    }
}

impl AuditRow {
    /// Portfolio value recomputed from the row's own columns.
    pub fn derived_portfolio_value(&self) -> Decimal {
        self.cash + self.shares * self.price
    }
}

/// Paths produced for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub audit: PathBuf,
    pub cash_history: PathBuf,
    pub share_history: PathBuf,
}

/// Destination for finished runs.
pub trait ReportWriter {
    fn write(&mut self, name: &str, outcome: &SimulationOutcome) -> Result<ReportFiles>;
}

/// Writes `<name>_audit.csv`, `<name>_cash.csv` and `<name>_shares.csv` into a
/// directory.
#[derive(Debug, Clone)]
pub struct CsvReportWriter {
    dir: PathBuf,
}

impl CsvReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        Ok(Self { dir })
    }
}

impl ReportWriter for CsvReportWriter {
    fn write(&mut self, name: &str, outcome: &SimulationOutcome) -> Result<ReportFiles> {
        let files = ReportFiles {
            audit: self.dir.join(format!("{name}_audit.csv")),
            cash_history: self.dir.join(format!("{name}_cash.csv")),
            share_history: self.dir.join(format!("{name}_shares.csv")),
        };

        write_audit(&files.audit, &outcome.ticks)?;
        write_values(&files.cash_history, &outcome.cash_history)?;
        write_values(&files.share_history, &outcome.share_history)?;

        info!(run = %name, audit = %files.audit.display(), "Report written");
        Ok(files)
    }
}

/// Write the audit trail with a header row.
pub fn write_audit(path: &Path, ticks: &[TickRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for tick in ticks {
        writer.serialize(AuditRow::from(tick))?;
    }
    writer.flush()?;
    Ok(())
}

/// Rows of an audit trail whose recorded totals disagree with their own
/// columns or with the previous row's cash. Returns the offending row numbers.
pub fn inconsistent_rows(rows: &[AuditRow], initial_cash: Decimal) -> Vec<usize> {
    let mut previous_cash = initial_cash;
    let mut bad = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        if row.portfolio_value != row.derived_portfolio_value()
            || previous_cash + row.cash_delta != row.cash
        {
            bad.push(i);
        }
        previous_cash = row.cash;
    }
    bad
}

/// Read an audit trail written by [`write_audit`].
pub fn read_audit(path: &Path) -> Result<Vec<AuditRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    reader
        .deserialize()
        .map(|row| row.with_context(|| format!("Bad audit row in {}", path.display())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::simulate;
    use crate::trading::SimulationConfig;
    use rust_decimal_macros::dec;

    fn read_column(path: &Path) -> Vec<Decimal> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| line.trim().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_persisted_audit_regenerates_totals() {
        let dir = std::env::temp_dir().join(format!("stonks-report-{}", uuid::Uuid::new_v4()));
        let mut writer = CsvReportWriter::new(&dir).unwrap();

        let prices = [dec!(100), dec!(99), dec!(98.5), dec!(101), dec!(100.5), dec!(103)];
        let outcome = simulate(&SimulationConfig::default(), &prices).unwrap();

        let files = writer.write("run", &outcome).unwrap();
        let rows = read_audit(&files.audit).unwrap();

        assert_eq!(rows.len(), prices.len());
        for (row, tick) in rows.iter().zip(&outcome.ticks) {
            assert_eq!(row.portfolio_value, row.derived_portfolio_value());
            assert_eq!(row.portfolio_value, tick.portfolio_value());
            assert_eq!(row.action, tick.action);
        }

        assert!(inconsistent_rows(&rows, outcome.initial_cash()).is_empty());

        let cash = read_column(&files.cash_history);
        assert_eq!(cash, outcome.cash_history);
        let shares = read_column(&files.share_history);
        assert_eq!(shares.len(), prices.len() + 1);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_tampered_row_is_flagged() {
        let outcome = simulate(
            &SimulationConfig::default(),
            &[dec!(100), dec!(99), dec!(98), dec!(101)],
        )
        .unwrap();
        let mut rows: Vec<AuditRow> = outcome.ticks.iter().map(AuditRow::from).collect();
        rows[2].cash += dec!(1);

        // Row 2 no longer adds up, and row 3 starts from the wrong cash
        assert_eq!(inconsistent_rows(&rows, dec!(100)), vec![2, 3]);
    }

    #[test]
    fn test_audit_header() {
        let dir = std::env::temp_dir().join(format!("stonks-report-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("audit.csv");

        let outcome = simulate(&SimulationConfig::default(), &[dec!(10)]).unwrap();
        write_audit(&path, &outcome.ticks).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "stock price,cash,shares,value of shares,action,cash delta,portfolio value"
        );

        fs::remove_dir_all(dir).ok();
    }
}

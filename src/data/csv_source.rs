//! Flat value lists on disk: one number per row, no header.
//!
//! Used for persisted price series and for raw cash/share histories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::models::PriceSeries;

use super::PriceSeriesSource;

/// Price series stored as a one-column CSV file.
#[derive(Debug, Clone)]
pub struct CsvPriceFile {
    path: PathBuf,
}

impl CsvPriceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PriceSeriesSource for CsvPriceFile {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn load(&mut self) -> Result<PriceSeries> {
        let values = read_values(&self.path)?;
        PriceSeries::new(values)
            .with_context(|| format!("Invalid price series in {}", self.path.display()))
    }
}

/// Read the first column of every row as a decimal.
pub fn read_values(path: &Path) -> Result<Vec<Decimal>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Bad row {} in {}", row + 1, path.display()))?;
        let Some(field) = record.get(0).filter(|f| !f.is_empty()) else {
            continue;
        };
        let value = parse_value(field)
            .with_context(|| format!("Row {} of {}: not a number: {field:?}", row + 1, path.display()))?;
        values.push(value);
    }

    Ok(values)
}

/// Write one value per row.
pub fn write_values(path: &Path, values: &[Decimal]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for value in values {
        writer.write_record([value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV files directly inside `dir`, sorted by name.
pub fn series_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

/// Delete every regular file in `dir`, creating the directory if missing.
pub fn clean_dir(dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn parse_value(field: &str) -> Result<Decimal> {
    // Files written by float-printing tools may use exponent notation
    field
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(field))
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stonks-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_write_then_load_series() {
        let dir = temp_dir();
        let path = dir.join("day.csv");
        write_values(&path, &[dec!(100), dec!(100.25), dec!(99.5)]).unwrap();

        let mut source = CsvPriceFile::new(&path);
        let series = source.load().unwrap();

        assert_eq!(series.prices(), &[dec!(100), dec!(100.25), dec!(99.5)]);
        assert_eq!(source.name(), "day.csv");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_reads_float_notation() {
        let dir = temp_dir();
        let path = dir.join("floats.csv");
        fs::write(&path, "100.0\n 99.87654321 \n1e2\n\n").unwrap();

        let values = read_values(&path).unwrap();
        assert_eq!(values, vec![dec!(100.0), dec!(99.87654321), dec!(100)]);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_rejects_garbage_and_empty() {
        let dir = temp_dir();
        let garbage = dir.join("garbage.csv");
        fs::write(&garbage, "100\nabc\n").unwrap();
        assert!(read_values(&garbage).is_err());

        let empty = dir.join("empty.csv");
        fs::write(&empty, "").unwrap();
        assert!(CsvPriceFile::new(&empty).load().is_err());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_list_and_clean_dir() {
        let dir = temp_dir();
        write_values(&dir.join("b.csv"), &[dec!(1)]).unwrap();
        write_values(&dir.join("a.csv"), &[dec!(2)]).unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();

        let files = series_files_in(&dir).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);

        assert_eq!(clean_dir(&dir).unwrap(), 3);
        assert!(series_files_in(&dir).unwrap().is_empty());
        fs::remove_dir_all(dir).ok();
    }
}

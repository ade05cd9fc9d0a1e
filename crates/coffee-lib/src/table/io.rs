//! Delimited-file loading for historical tables

use super::{normalize, Cell, Table};
use crate::error::{PredictError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback data files tried after the configured path
pub const DEFAULT_DATA_CANDIDATES: &[&str] = &["coffee_clean.csv", "coffee_db.csv"];

/// Read a CSV file with a header row, inferring cell types
pub fn read_csv(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(PredictError::not_found("data file", path));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::parse).collect());
    }
    debug!(path = %path.display(), rows = table.len(), "Loaded CSV table");
    Ok(table)
}

/// Write a table as CSV, creating parent directories as needed
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load and normalize the first candidate path that exists
pub fn load_first_existing(candidates: &[PathBuf]) -> Result<Table> {
    for path in candidates {
        if path.exists() {
            debug!(path = %path.display(), "Using historical data file");
            return Ok(normalize(read_csv(path)?));
        }
    }
    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(PredictError::not_found(
        format!("historical data (tried {})", tried),
        candidates.first().cloned().unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_csv_infers_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("coffee.csv");
        std::fs::write(&path, "Country,Coffee type,año,price\nColombia,Arabica,2019,100\nBrazil,Robusta,2020,\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.columns(), &["Country", "Coffee type", "año", "price"]);
        assert_eq!(table.get(0, "price"), Some(&Cell::Int(100)));
        assert_eq!(table.get(1, "price"), Some(&Cell::Null));
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.csv");
        let second = dir.path().join("second.csv");
        let third = dir.path().join("third.csv");
        std::fs::write(&second, "Country,year\nColombia,2019\n").unwrap();
        std::fs::write(&third, "Country,year\nBrazil,2019\n").unwrap();

        let table = load_first_existing(&[missing, second, third]).unwrap();
        assert_eq!(table.get(0, "country"), Some(&Cell::Text("Colombia".into())));
    }

    #[test]
    fn test_no_candidate_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_first_existing(&[dir.path().join("nope.csv")]).unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/clean.csv");
        let table = Table::from_rows(
            vec!["country".into(), "year".into()],
            vec![vec!["Peru".into(), Cell::Int(2001)]],
        );
        write_csv(&table, &path).unwrap();
        assert_eq!(read_csv(&path).unwrap(), table);
    }
}

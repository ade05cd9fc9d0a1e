//! Score predictions against observed values

use anyhow::{bail, Context, Result};
use coffee_lib::analytics::RegressionReport;
use coffee_lib::table::read_csv;
use coffee_lib::{Cell, Table};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{color_r2, format_value, print_info, print_table, OutputFormat};

/// Row for the metrics table
#[derive(Tabled, Serialize)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Paired numeric values; rows with a missing side are skipped
fn paired_values(table: &Table, actual: &str, predicted: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    for column in [actual, predicted] {
        if !table.has_column(column) {
            bail!("column '{}' not found (available: {})", column, table.columns().join(", "));
        }
    }

    let (a, p): (Vec<f64>, Vec<f64>) = (0..table.len())
        .filter_map(|row| {
            let a = table.get(row, actual).and_then(Cell::as_f64)?;
            let p = table.get(row, predicted).and_then(Cell::as_f64)?;
            Some((a, p))
        })
        .unzip();

    if a.is_empty() {
        bail!("no rows with both '{}' and '{}' values", actual, predicted);
    }
    Ok((a, p))
}

fn report_rows(report: &RegressionReport) -> Vec<MetricRow> {
    let row = |metric: &str, value: String| MetricRow {
        metric: metric.to_string(),
        value,
    };
    vec![
        row("MAE", format_value(report.mae)),
        row("RMSE", format_value(report.rmse)),
        row("MAPE %", format_value(report.mape)),
        row("sMAPE %", format_value(report.smape)),
        row("R²", color_r2(report.r2)),
    ]
}

/// Compute regression metrics for a CSV of actual/predicted pairs
pub fn evaluate_file(path: &Path, actual: &str, predicted: &str, format: OutputFormat) -> Result<()> {
    let table = read_csv(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (a, p) = paired_values(&table, actual, predicted)?;
    let report = RegressionReport::compute(&a, &p);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            print_info(&format!("{} scored rows from {}", a.len(), path.display()));
            print_table(&report_rows(&report), format);
        }
    }
    Ok(())
}

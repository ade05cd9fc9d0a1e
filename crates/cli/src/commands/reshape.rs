//! Build the cleaned historical table from source files

use anyhow::{Context, Result};
use coffee_lib::reshape::{load_coffee_data, load_price_data, merge_prices};
use coffee_lib::table::write_csv;
use std::path::Path;

use crate::output::{print_success, print_warning};

/// Reshape a consumption file, optionally merge yearly prices, and write CSV
pub fn reshape_files(consumption: &Path, prices: Option<&Path>, output: &Path) -> Result<()> {
    let long = load_coffee_data(consumption)
        .with_context(|| format!("Failed to reshape {}", consumption.display()))?;

    let table = match prices {
        Some(path) => {
            let yearly =
                load_price_data(path).with_context(|| format!("Failed to read prices from {}", path.display()))?;
            if yearly.is_empty() {
                print_warning("Price file produced no yearly averages");
            }
            merge_prices(&long, &yearly)
        }
        None => long,
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    write_csv(&table, output).with_context(|| format!("Failed to write {}", output.display()))?;
    print_success(&format!("Wrote {} rows to {}", table.len(), output.display()));
    Ok(())
}

//! Output formatting utilities

use clap::ValueEnum;
use coffee_lib::Interval;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a metric value, rendering undefined results as `n/a`
pub fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{:.3}", value)
    } else {
        "n/a".to_string()
    }
}

/// Format an optional prediction band
pub fn format_interval(band: Option<&Interval>) -> String {
    match band {
        Some(band) => format!("{:.3}–{:.3}", band.lo, band.hi),
        None => "-".to_string(),
    }
}

/// Format a ratio as a percentage
pub fn format_percent(ratio: f64) -> String {
    if ratio.is_finite() {
        format!("{:.2}%", ratio * 100.0)
    } else {
        "n/a".to_string()
    }
}

/// Color a coefficient of determination by fit quality
pub fn color_r2(r2: f64) -> String {
    let formatted = format_value(r2);
    if !r2.is_finite() {
        formatted
    } else if r2 >= 0.8 {
        formatted.green().to_string()
    } else if r2 >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

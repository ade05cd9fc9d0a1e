//! Market and regression metrics
//!
//! Pairwise metrics zip `actual` with `predicted`. Degenerate inputs (empty
//! series, zero totals, non-positive growth bases) yield `NaN`.

use crate::table::{Cell, Table};
use serde::Serialize;
use std::collections::HashMap;

pub const MARKET_SHARE: &str = "market_share";

/// Revenue minus fixed and variable cost
pub fn profit(consumption: f64, price: f64, fixed_cost: f64, variable_cost_per_unit: f64) -> f64 {
    price * consumption - (fixed_cost + variable_cost_per_unit * consumption)
}

/// Profit as a fraction of revenue
pub fn margin(consumption: f64, price: f64, fixed_cost: f64, variable_cost_per_unit: f64) -> f64 {
    let revenue = price * consumption;
    if revenue == 0.0 {
        return f64::NAN;
    }
    profit(consumption, price, fixed_cost, variable_cost_per_unit) / revenue
}

/// Compound annual growth rate over `periods`
pub fn cagr(first: f64, last: f64, periods: i64) -> f64 {
    if periods <= 0 || first <= 0.0 || last <= 0.0 {
        return f64::NAN;
    }
    (last / first).powf(1.0 / periods as f64) - 1.0
}

/// Add a `market_share` column: each row's share of its group's total
///
/// Rows with a null value, and groups summing to zero, get a null share.
pub fn market_share(table: &Table, value_column: &str, group_columns: &[&str]) -> Table {
    let group_key = |row: usize| -> Vec<String> {
        group_columns
            .iter()
            .map(|c| table.get(row, c).map(|v| v.to_string()).unwrap_or_default())
            .collect()
    };
    let value = |row: usize| table.get(row, value_column).and_then(Cell::as_f64);

    let mut totals: HashMap<Vec<String>, f64> = HashMap::new();
    for row in 0..table.len() {
        *totals.entry(group_key(row)).or_default() += value(row).unwrap_or(0.0);
    }

    let shares: Vec<Cell> = (0..table.len())
        .map(|row| {
            let total = totals.get(&group_key(row)).copied().unwrap_or(0.0);
            match value(row) {
                Some(v) if total != 0.0 => Cell::Float(v / total),
                _ => Cell::Null,
            }
        })
        .collect();

    let mut out = table.clone();
    out.add_column(MARKET_SHARE, Cell::Null);
    for (row, share) in shares.into_iter().enumerate() {
        out.set(row, MARKET_SHARE, share);
    }
    out
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()))
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2))).sqrt()
}

/// Coefficient of determination; `NaN` for constant actuals
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let avg = mean(actual.iter().copied());
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - avg).powi(2)).sum();
    if ss_tot == 0.0 || ss_tot.is_nan() {
        return f64::NAN;
    }
    1.0 - ss_res / ss_tot
}

/// Mean absolute percentage error, skipping zero actuals
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(
        actual
            .iter()
            .zip(predicted)
            .filter(|(a, _)| **a != 0.0)
            .map(|(a, p)| ((a - p) / a).abs() * 100.0),
    )
}

/// Symmetric MAPE, skipping pairs where both values are zero
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).filter_map(|(a, p)| {
        let denom = (a.abs() + p.abs()) / 2.0;
        (denom != 0.0).then(|| (p - a).abs() / denom * 100.0)
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionReport {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub smape: f64,
    pub r2: f64,
}

impl RegressionReport {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mae: mae(actual, predicted),
            rmse: rmse(actual, predicted),
            mape: mape(actual, predicted),
            smape: smape(actual, predicted),
            r2: r2(actual, predicted),
        }
    }
}

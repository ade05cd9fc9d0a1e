//! Cleaning raw source files into the historical table
//!
//! Consumption sources come as wide tables with one column per crop year
//! (`1990/91`, `1991/92`, ...); prices come as daily quotes. Both are brought
//! to one row per (country, type, year) and joined on year.

use crate::error::{PredictError, Result};
use crate::table::{read_csv, Cell, Table, COUNTRY, TYPE, YEAR};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

pub const CONSUMPTION: &str = "consumption";
pub const PRICE: &str = "price";

/// Type assigned when a source has no type column
pub const ALL_TYPES: &str = "All";

const COUNTRY_NAMES: [&str; 3] = ["country", "pais", "país"];
const TYPE_NAMES: [&str; 5] = ["coffee type", "tipo", "tipo_cafe", "coffee_type", "tipo de café"];
const YEAR_NAMES: [&str; 3] = ["year", "anio", "año"];
const CONSUMPTION_NAMES: [&str; 2] = ["consumption", "consumo"];

const DATE_ALIASES: [&str; 4] = ["date", "fecha", "price", "precio"];
const CLOSE_ALIASES: [&str; 7] = [
    "close",
    "adj_close",
    "cierre",
    "cierre_ajustado",
    "precio_cierre",
    "closing_price",
    "precio_cierre_ajustado",
];

/// Ticker cell marking export noise rows in price downloads
const TICKER: &str = "KC=F";

static SPAN_RE: OnceLock<Regex> = OnceLock::new();

fn span_re() -> &'static Regex {
    SPAN_RE.get_or_init(|| Regex::new(r"^[0-9]{4}/[0-9]{2}$").expect("span pattern is valid"))
}

/// End year of a crop-year span: `1990/91` is 1991, `1999/00` is 2000
pub fn end_year_from_span(span: &str) -> Option<i32> {
    let (first, second) = span.trim().split_once('/')?;
    let start: i32 = first.parse().ok()?;
    let short: i32 = second.parse().ok()?;
    let century = (start / 100) * 100;
    if short < start % 100 {
        Some(century + 100 + short)
    } else {
        Some(century + short)
    }
}

/// Country and type columns of a source table
///
/// Recognized names win; otherwise the first column is the country and the
/// second, if any, the type.
pub fn detect_id_columns(columns: &[String]) -> Result<(String, Option<String>)> {
    let mut country = None;
    let mut coffee_type = None;
    for column in columns {
        let name = column.trim().to_lowercase();
        if COUNTRY_NAMES.contains(&name.as_str()) {
            country = Some(column.clone());
        }
        if TYPE_NAMES.contains(&name.as_str()) {
            coffee_type = Some(column.clone());
        }
    }
    let country = match country.or_else(|| columns.first().cloned()) {
        Some(c) => c,
        None => return Err(PredictError::MissingColumns("source table has no columns".to_string())),
    };
    if coffee_type.is_none() {
        coffee_type = columns.get(1).cloned();
    }
    Ok((country, coffee_type))
}

/// Unpivot crop-year columns into `country, type, consumption, year`
///
/// Tables without crop-year columns are taken as already long: known column
/// names are standardized and a missing type becomes `All`.
pub fn wide_to_long(table: &Table) -> Result<Table> {
    let (country_col, type_col) = detect_id_columns(table.columns())?;
    let year_cols: Vec<&String> = table.columns().iter().filter(|c| span_re().is_match(c)).collect();

    if year_cols.is_empty() {
        return Ok(standardize_long(table.clone()));
    }

    let text = |row: usize, column: &str| -> Cell {
        match table.get(row, column).and_then(Cell::as_text) {
            Some(v) => Cell::Text(v.trim().to_string()),
            None => Cell::Null,
        }
    };

    let mut rows = Vec::new();
    for span in &year_cols {
        let Some(year) = end_year_from_span(span) else {
            continue;
        };
        for row in 0..table.len() {
            let Some(value) = table.get(row, span).and_then(Cell::as_f64) else {
                continue;
            };
            let coffee_type = match &type_col {
                Some(c) => text(row, c),
                None => Cell::Text(ALL_TYPES.to_string()),
            };
            rows.push(vec![
                text(row, &country_col),
                coffee_type,
                Cell::Float(value),
                Cell::Int(year as i64),
            ]);
        }
    }
    rows.sort_by(|a, b| compare_key(&a[0], &a[1], &a[3], &b[0], &b[1], &b[3]));
    debug!(spans = year_cols.len(), rows = rows.len(), "Unpivoted wide table");

    Ok(Table::from_rows(
        vec![COUNTRY.into(), TYPE.into(), CONSUMPTION.into(), YEAR.into()],
        rows,
    ))
}

fn standardize_long(mut table: Table) -> Table {
    let renames: Vec<(String, &str)> = table
        .columns()
        .iter()
        .filter_map(|c| {
            let name = c.trim().to_lowercase();
            let to = if COUNTRY_NAMES.contains(&name.as_str()) {
                COUNTRY
            } else if TYPE_NAMES.contains(&name.as_str()) {
                TYPE
            } else if YEAR_NAMES.contains(&name.as_str()) {
                YEAR
            } else if CONSUMPTION_NAMES.contains(&name.as_str()) {
                CONSUMPTION
            } else {
                return None;
            };
            Some((c.clone(), to))
        })
        .collect();
    for (from, to) in renames {
        table.rename_column(&from, to);
    }
    table.add_column(TYPE, Cell::Text(ALL_TYPES.to_string()));
    table
}

fn compare_key(ac: &Cell, at: &Cell, ay: &Cell, bc: &Cell, bt: &Cell, by: &Cell) -> Ordering {
    ac.as_text()
        .cmp(&bc.as_text())
        .then_with(|| at.as_text().cmp(&bt.as_text()))
        .then_with(|| ay.as_i64().cmp(&by.as_i64()))
}

/// Read a consumption source and bring it to long form
pub fn load_coffee_data(path: &Path) -> Result<Table> {
    wide_to_long(&read_csv(path)?)
}

/// Read daily quotes and average them per calendar year
pub fn load_price_data(path: &Path) -> Result<Table> {
    annual_prices(&read_csv(path)?)
}

/// Yearly mean closing price as `year, price`
pub fn annual_prices(table: &Table) -> Result<Table> {
    let table = normalize_price_columns(drop_export_noise(table));
    let date_col = pick_date_column(&table)?;
    let close_col = pick_close_column(&table)?;

    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for row in 0..table.len() {
        let date = table.get(row, &date_col).and_then(parse_date);
        let close = table.get(row, &close_col).and_then(Cell::as_f64);
        if let (Some(date), Some(close)) = (date, close) {
            let entry = by_year.entry(date.year()).or_insert((0.0, 0));
            entry.0 += close;
            entry.1 += 1;
        }
    }
    debug!(date = %date_col, close = %close_col, years = by_year.len(), "Averaged daily prices");

    let rows = by_year
        .into_iter()
        .map(|(year, (sum, n))| vec![Cell::Int(year as i64), Cell::Float(sum / n as f64)])
        .collect();
    Ok(Table::from_rows(vec![YEAR.into(), PRICE.into()], rows))
}

/// Drop ticker rows and re-header tables whose real header sits in the data
fn drop_export_noise(table: &Table) -> Table {
    let rows: Vec<Vec<Cell>> = table
        .rows()
        .iter()
        .filter(|r| !r.iter().any(|c| c.as_text().map(|t| t.trim() == TICKER).unwrap_or(false)))
        .cloned()
        .collect();
    let mut columns = table.columns().to_vec();
    let mut rows = rows;

    if let Some(price_idx) = columns.iter().position(|c| c == "Price") {
        let is = |row: &[Cell], value: &str| row[price_idx].as_text().map(|t| t.trim() == value).unwrap_or(false);
        if let Some(header) = rows.iter().position(|r| is(&r[..], "Date")) {
            // Blank header cells keep the original name
            columns = rows[header]
                .iter()
                .zip(&columns)
                .map(|(c, original)| c.as_text().unwrap_or_else(|| original.clone()))
                .collect();
            rows.drain(..=header);
        }
        if let Some(price_idx) = columns.iter().position(|c| c == "Price") {
            rows.retain(|r| !r[price_idx].as_text().map(|t| t.trim() == "Ticker").unwrap_or(false));
        }
    }
    Table::from_rows(columns, rows)
}

fn normalize_price_columns(mut table: Table) -> Table {
    let names: Vec<String> = table.columns().to_vec();
    for name in names {
        let normalized = name.trim().to_lowercase().replace(' ', "_");
        if normalized != name {
            table.rename_column(&name, &normalized);
        }
    }
    table
}

fn share<F: Fn(&Cell) -> bool>(table: &Table, column: &str, pred: F) -> f64 {
    match table.column_values(column) {
        Some(values) if !values.is_empty() => {
            values.iter().filter(|v| pred(v)).count() as f64 / values.len() as f64
        }
        _ => 0.0,
    }
}

fn pick_date_column(table: &Table) -> Result<String> {
    let looks_like_dates = |c: &str| share(table, c, |v| parse_date(v).is_some()) > 0.8;
    DATE_ALIASES
        .iter()
        .map(|c| c.to_string())
        .filter(|c| table.has_column(c))
        .chain(table.columns().iter().cloned())
        .find(|c| looks_like_dates(c))
        .ok_or_else(|| PredictError::MissingColumns("no date column in price data".to_string()))
}

fn pick_close_column(table: &Table) -> Result<String> {
    let numeric = |c: &str| share(table, c, |v| v.as_f64().is_some());
    CLOSE_ALIASES
        .iter()
        .map(|c| c.to_string())
        .find(|c| table.has_column(c) && numeric(c) > 0.8)
        .or_else(|| {
            table
                .columns()
                .iter()
                .find(|c| (c.contains("close") || c.contains("cierre")) && numeric(c) > 0.5)
                .cloned()
        })
        .ok_or_else(|| {
            PredictError::MissingColumns("no closing price column (close/adj_close/cierre)".to_string())
        })
}

/// Parse the date formats seen in price exports
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    let raw = match cell {
        Cell::Text(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.date_naive());
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Left-join yearly prices onto the long table and fill gaps
///
/// Rows are ordered by country, type and year; missing prices are linearly
/// interpolated along that order and extended at both ends.
pub fn merge_prices(coffee_long: &Table, yearly: &Table) -> Table {
    let prices: BTreeMap<i64, f64> = (0..yearly.len())
        .filter_map(|row| {
            let year = yearly.get(row, YEAR).and_then(Cell::as_i64)?;
            let price = yearly.get(row, PRICE).and_then(Cell::as_f64)?;
            Some((year, price))
        })
        .collect();

    let mut merged = coffee_long.clone();
    merged.add_column(PRICE, Cell::Null);
    let mut rows = merged.rows().to_vec();
    let (ci, ti, yi, pi) = (
        merged.column_index(COUNTRY),
        merged.column_index(TYPE),
        merged.column_index(YEAR),
        merged.column_index(PRICE),
    );
    let Some(pi) = pi else {
        return merged;
    };
    for row in &mut rows {
        let year = yi.and_then(|i| row[i].as_i64());
        row[pi] = match year.and_then(|y| prices.get(&y)) {
            Some(p) => Cell::Float(*p),
            None => Cell::Null,
        };
    }
    let null = Cell::Null;
    let at = |row: &Vec<Cell>, idx: Option<usize>| idx.map(|i| row[i].clone()).unwrap_or_else(|| null.clone());
    rows.sort_by(|a, b| compare_key(&at(a, ci), &at(a, ti), &at(a, yi), &at(b, ci), &at(b, ti), &at(b, yi)));

    let mut series: Vec<Option<f64>> = rows.iter().map(|r| r[pi].as_f64()).collect();
    interpolate(&mut series);
    for (row, value) in rows.iter_mut().zip(series) {
        row[pi] = value.map(Cell::Float).unwrap_or(Cell::Null);
    }
    Table::from_rows(merged.columns().to_vec(), rows)
}

/// Linear interpolation over positions, constant beyond the known ends
fn interpolate(values: &mut [Option<f64>]) {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    let (Some(&(first_i, first_v)), Some(&(last_i, last_v))) = (known.first(), known.last()) else {
        return;
    };
    for (i, value) in values.iter_mut().enumerate() {
        if value.is_some() {
            continue;
        }
        *value = Some(if i < first_i {
            first_v
        } else if i > last_i {
            last_v
        } else {
            let right = known.partition_point(|(k, _)| *k < i);
            let (i0, v0) = known[right - 1];
            let (i1, v1) = known[right];
            v0 + (v1 - v0) * (i - i0) as f64 / (i1 - i0) as f64
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_end_year_from_span() {
        assert_eq!(end_year_from_span("1990/91"), Some(1991));
        assert_eq!(end_year_from_span("1999/00"), Some(2000));
        assert_eq!(end_year_from_span("2019/20"), Some(2020));
        assert_eq!(end_year_from_span("1990"), None);
    }

    #[test]
    fn test_detect_id_columns() {
        assert_eq!(
            detect_id_columns(&cols(&["Tipo", "País", "1990/91"])).unwrap(),
            ("País".to_string(), Some("Tipo".to_string()))
        );
        assert_eq!(
            detect_id_columns(&cols(&["Nation", "Variety", "1990/91"])).unwrap(),
            ("Nation".to_string(), Some("Variety".to_string()))
        );
        assert_eq!(detect_id_columns(&cols(&["Nation"])).unwrap(), ("Nation".to_string(), None));
        assert!(detect_id_columns(&[]).is_err());
    }

    #[test]
    fn test_wide_to_long() {
        let wide = Table::from_rows(
            cols(&["Country", "Coffee type", "1990/91", "1991/92", "Total"]),
            vec![
                vec!["Peru ".into(), "Arabica".into(), Cell::Int(5), Cell::Null, Cell::Int(5)],
                vec!["Brazil".into(), "Robusta".into(), Cell::Float(1.5), Cell::Float(2.5), Cell::Int(4)],
            ],
        );
        let long = wide_to_long(&wide).unwrap();
        assert_eq!(long.columns(), cols(&["country", "type", "consumption", "year"]).as_slice());
        assert_eq!(long.len(), 3);
        assert_eq!(
            long.rows()[0],
            vec!["Brazil".into(), "Robusta".into(), Cell::Float(1.5), Cell::Int(1991)]
        );
        assert_eq!(long.get(1, YEAR), Some(&Cell::Int(1992)));
        assert_eq!(long.get(2, COUNTRY), Some(&Cell::Text("Peru".into())));
    }

    #[test]
    fn test_long_table_is_only_renamed() {
        let long = Table::from_rows(
            cols(&["Pais", "Año", "Consumo"]),
            vec![vec!["Peru".into(), Cell::Int(2020), Cell::Int(7)]],
        );
        let out = wide_to_long(&long).unwrap();
        assert_eq!(out.columns(), cols(&["country", "year", "consumption", "type"]).as_slice());
        assert_eq!(out.get(0, TYPE), Some(&Cell::Text(ALL_TYPES.into())));
    }

    #[test]
    fn test_annual_prices_from_clean_export() {
        let daily = Table::from_rows(
            cols(&["Date", "Close", "Volume"]),
            vec![
                vec!["2020-01-02".into(), Cell::Float(1.0), Cell::Int(10)],
                vec!["2020-06-30".into(), Cell::Float(3.0), Cell::Int(10)],
                vec!["2021-01-04".into(), Cell::Float(5.0), Cell::Int(10)],
            ],
        );
        let yearly = annual_prices(&daily).unwrap();
        assert_eq!(yearly.columns(), cols(&["year", "price"]).as_slice());
        assert_eq!(yearly.rows()[0], vec![Cell::Int(2020), Cell::Float(2.0)]);
        assert_eq!(yearly.rows()[1], vec![Cell::Int(2021), Cell::Float(5.0)]);
    }

    #[test]
    fn test_annual_prices_skips_export_noise() {
        let raw = Table::from_rows(
            cols(&["Price", "Close", "High"]),
            vec![
                vec!["Ticker".into(), "KC=F".into(), "KC=F".into()],
                vec!["Date".into(), Cell::Null, Cell::Null],
                vec!["2019-03-01".into(), Cell::Float(100.0), Cell::Float(101.0)],
                vec!["2019-03-04".into(), Cell::Float(110.0), Cell::Float(111.0)],
            ],
        );
        let yearly = annual_prices(&raw).unwrap();
        assert_eq!(yearly.rows(), &[vec![Cell::Int(2019), Cell::Float(105.0)]]);
    }

    #[test]
    fn test_annual_prices_without_close_column() {
        let raw = Table::from_rows(cols(&["date", "volume"]), vec![vec!["2020-01-01".into(), "n/a".into()]]);
        assert_eq!(annual_prices(&raw).unwrap_err().kind(), "MissingColumns");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 15);
        for raw in ["2020-03-15", "2020-03-15 00:00:00", "2020-03-15 00:00:00+00:00", "03/15/2020"] {
            assert_eq!(parse_date(&Cell::Text(raw.into())), expected, "{}", raw);
        }
        assert_eq!(parse_date(&Cell::Int(2020)), None);
    }

    #[test]
    fn test_merge_prices_interpolates() {
        let long = Table::from_rows(
            cols(&["country", "type", "consumption", "year"]),
            vec![
                vec!["Peru".into(), "Arabica".into(), Cell::Int(1), Cell::Int(2001)],
                vec!["Peru".into(), "Arabica".into(), Cell::Int(1), Cell::Int(2000)],
                vec!["Peru".into(), "Arabica".into(), Cell::Int(1), Cell::Int(2002)],
                vec!["Peru".into(), "Arabica".into(), Cell::Int(1), Cell::Int(2003)],
            ],
        );
        let yearly = Table::from_rows(
            cols(&["year", "price"]),
            vec![vec![Cell::Int(2000), Cell::Float(10.0)], vec![Cell::Int(2002), Cell::Float(20.0)]],
        );
        let merged = merge_prices(&long, &yearly);
        let prices: Vec<Cell> = merged.column_values(PRICE).unwrap().into_iter().cloned().collect();
        assert_eq!(
            prices,
            vec![Cell::Float(10.0), Cell::Float(15.0), Cell::Float(20.0), Cell::Float(20.0)]
        );
        assert_eq!(merged.get(0, YEAR), Some(&Cell::Int(2000)));
    }

    #[test]
    fn test_interpolate_extends_edges() {
        let mut values = vec![None, Some(2.0), None, None, Some(8.0), None];
        interpolate(&mut values);
        assert_eq!(values, vec![Some(2.0), Some(2.0), Some(4.0), Some(6.0), Some(8.0), Some(8.0)]);
        let mut empty: Vec<Option<f64>> = vec![None, None];
        interpolate(&mut empty);
        assert_eq!(empty, vec![None, None]);
    }
}

//! Full prediction requests against artifacts and data on disk

use coffee_lib::features::{FeatureSet, Strategy};
use coffee_lib::table::{COUNTRY, TYPE, YEAR};
use coffee_lib::{Cell, FeatureFrame, PredictionService, QueryKey, StructuredLogger, Table};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn history(dir: &Path) -> Table {
    let path = write(
        dir,
        "coffee_clean.csv",
        "Country,Coffee type,year,price\nColombia,Arabica,2019,100\nColombia,Arabica,2020,110\n",
    );
    PredictionService::new(StructuredLogger::new("it")).load_data(&[path]).unwrap()
}

/// Previous year's target per (country, type), ordered by year
fn lag_hook(table: &Table, target: &str) -> anyhow::Result<FeatureSet> {
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&row| table.get(row, YEAR).and_then(Cell::as_i64));

    let mut last: HashMap<(Option<String>, Option<String>), Cell> = HashMap::new();
    let mut lags = vec![Cell::Null; table.len()];
    for row in order {
        let group = (
            table.get(row, COUNTRY).and_then(Cell::as_text),
            table.get(row, TYPE).and_then(Cell::as_text),
        );
        lags[row] = last.get(&group).cloned().unwrap_or(Cell::Null);
        let value = table.get(row, target).cloned().unwrap_or(Cell::Null);
        last.insert(group, value);
    }

    let mut frame = FeatureFrame::new(vec!["lag_price".into()]);
    for (row, lag) in lags.into_iter().enumerate() {
        let id = table.row_id(row).ok_or_else(|| anyhow::anyhow!("table has no row ids"))?;
        frame.push(id, vec![lag]);
    }
    Ok(FeatureSet {
        columns: vec!["lag_price".into()],
        labels: None,
        frame,
        strategy: Strategy::Hook,
    })
}

fn lag_service() -> PredictionService {
    PredictionService::new(StructuredLogger::new("it")).with_hook(Arc::new(lag_hook))
}

const LAG_MODEL: &str = r#"{"kind": "linear", "feature_names": ["lag_price"], "coefficients": [1.0], "intercept": 10.0}"#;

#[test]
fn test_absent_year_is_synthesized_and_predicted() {
    let dir = TempDir::new().unwrap();
    let table = history(dir.path());
    let artifact = write(dir.path(), "price_model.json", LAG_MODEL);

    let result = lag_service()
        .predict(&table, &artifact, &QueryKey::new("Colombia", "Arabica", 2021))
        .unwrap();
    assert_eq!(result.pred, 120.0);
    assert_eq!(result.target, "price");

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("pi80").is_none());
    assert!(json.get("pi95").is_none());
}

#[test]
fn test_present_key_with_declared_features() {
    let dir = TempDir::new().unwrap();
    let table = history(dir.path());
    let artifact = write(
        dir.path(),
        "bundle.json",
        r#"{
            "model": {"kind": "linear", "coefficients": [1.0, 0.0], "intercept": 10.0},
            "y_col": "price",
            "feat_cols": ["lag_price", "rainfall"],
            "PI80_abs": 4.0,
            "PI95_abs": 9.0
        }"#,
    );

    let result = lag_service()
        .predict(&table, &artifact, &QueryKey::new("colombia", "arabica", 2020))
        .unwrap();
    assert_eq!(result.pred, 110.0);
    assert_eq!(result.key, QueryKey::new("Colombia", "Arabica", 2020));
    let pi80 = result.pi80.unwrap();
    let pi95 = result.pi95.unwrap();
    assert_eq!((pi80.lo, pi80.hi), (106.0, 114.0));
    assert_eq!((pi95.lo, pi95.hi), (101.0, 119.0));
}

#[test]
fn test_duplicate_rows_take_the_last_match() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "dupes.csv",
        "country,type,year,price\nColombia,Arabica,2020,110\nColombia,Arabica,2020,130\n",
    );
    let table = PredictionService::new(StructuredLogger::new("it")).load_data(&[path]).unwrap();
    let artifact = write(
        dir.path(),
        "price_model.json",
        r#"{"kind": "linear", "feature_names": ["price"], "coefficients": [1.0]}"#,
    );

    let bundle = write(
        dir.path(),
        "price_bundle.json",
        r#"{"model": {"kind": "linear", "feature_names": ["price"], "coefficients": [1.0]}, "feat_cols": ["price"]}"#,
    );
    let service = PredictionService::new(StructuredLogger::new("it"));
    let result = service
        .predict(&table, &bundle, &QueryKey::new("Colombia", "Arabica", 2020))
        .unwrap();
    assert_eq!(result.pred, 130.0);

    // A bare estimator declares its columns through its own feature names
    let result = service
        .predict(&table, &artifact, &QueryKey::new("Colombia", "Arabica", 2020))
        .unwrap();
    assert_eq!(result.pred, 130.0);
}

#[test]
fn test_raw_column_pipeline() {
    let dir = TempDir::new().unwrap();
    let table = history(dir.path());
    let artifact = write(
        dir.path(),
        "price_pipeline.json",
        r#"{
            "kind": "pipeline",
            "feature_names": ["year", "country", "type"],
            "steps": [
                {"name": "encode", "step": {
                    "kind": "one_hot",
                    "passthrough": ["year"],
                    "encode": [{"column": "country", "categories": ["Colombia", "Peru"]}]
                }},
                {"name": "model", "step": {"kind": "linear", "coefficients": [1.0, 5.0, 50.0], "intercept": -2000.0}}
            ]
        }"#,
    );

    let service = PredictionService::new(StructuredLogger::new("it"));
    let colombia = service
        .predict(&table, &artifact, &QueryKey::new("Colombia", "Arabica", 2022))
        .unwrap();
    assert_eq!(colombia.pred, 27.0);

    // Peru is not in the history; the synthetic row still carries it
    let peru = service
        .predict(&table, &artifact, &QueryKey::new("Peru", "Arabica", 2022))
        .unwrap();
    assert_eq!(peru.pred, 72.0);
}

#[test]
fn test_failures_surface_their_kind() {
    let dir = TempDir::new().unwrap();
    let table = history(dir.path());
    let service = PredictionService::new(StructuredLogger::new("it"));

    let missing = service
        .predict(&table, &dir.path().join("nope.json"), &QueryKey::new("Colombia", "Arabica", 2020))
        .unwrap_err();
    assert_eq!(missing.kind(), "NotFound");

    let disjoint = write(
        dir.path(),
        "disjoint.json",
        r#"{"model": {"kind": "linear", "coefficients": [1.0]}, "feat_cols": ["rainfall"]}"#,
    );
    let err = service
        .predict(&table, &disjoint, &QueryKey::new("Colombia", "Arabica", 2020))
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidFeatureSpec");

    let no_keys = Table::from_rows(vec!["price".into()], vec![vec![Cell::Int(1)]]);
    let plain = write(dir.path(), "plain.json", r#"{"kind": "linear", "coefficients": [1.0]}"#);
    let err = service
        .predict(&no_keys, &plain, &QueryKey::new("Colombia", "Arabica", 2020))
        .unwrap_err();
    assert_eq!(err.kind(), "MissingColumns");
}

//! One-shot prediction command

use anyhow::Result;
use coffee_lib::{BotConfig, PredictCommand, PredictionResult, PredictionService};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_interval, print_table, OutputFormat};

/// Row for the prediction table
#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Type")]
    coffee_type: String,
    #[tabled(rename = "Year")]
    year: i32,
    #[tabled(rename = "Prediction")]
    pred: String,
    #[tabled(rename = "PI80")]
    pi80: String,
    #[tabled(rename = "PI95")]
    pi95: String,
}

impl From<&PredictionResult> for PredictionRow {
    fn from(result: &PredictionResult) -> Self {
        Self {
            target: result.target.clone(),
            country: result.key.country.clone(),
            coffee_type: result.key.coffee_type.clone(),
            year: result.key.year,
            pred: format!("{:.3}", result.pred),
            pi80: format_interval(result.pi80.as_ref()),
            pi95: format_interval(result.pi95.as_ref()),
        }
    }
}

/// Predict one (country, type, year) key for a target
pub fn run_prediction(
    config: &BotConfig,
    service: &PredictionService,
    command: &PredictCommand,
    format: OutputFormat,
) -> Result<()> {
    let table = service.load_data(&config.data_candidates())?;
    let result = service.predict(&table, config.artifact_for(command.target), &command.key())?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print_table(&[PredictionRow::from(&result)], format),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffee_lib::{Interval, QueryKey};

    #[test]
    fn test_row_renders_bands() {
        let result = PredictionResult {
            target: "price".into(),
            key: QueryKey::new("Costa Rica", "Arabica", 2021),
            pred: 12.0,
            pi80: Some(Interval::around(12.0, 0.5)),
            pi95: None,
        };
        let row = PredictionRow::from(&result);
        assert_eq!(row.pred, "12.000");
        assert_eq!(row.pi80, "11.500–12.500");
        assert_eq!(row.pi95, "-");
        assert_eq!(row.country, "Costa Rica");
    }
}

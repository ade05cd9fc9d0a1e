//! Bot configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then environment variables (`DATA_CLEAN`, `ART_PRICE`,
//! `ART_CONSUMPTION`, `ART_PROFIT`, `GEMINI_API_KEY`, `GEMINI_MODEL`).

use crate::command::Target;
use crate::table::DEFAULT_DATA_CANDIDATES;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_PATH: &str = "data/coffee_clean.csv";
pub const DEFAULT_PRICE_ARTIFACT: &str = "models/price_model.json";
pub const DEFAULT_CONSUMPTION_ARTIFACT: &str = "models/consumption_model.json";
pub const DEFAULT_PROFIT_ARTIFACT: &str = "models/profit_model.json";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Environment variables read by [`BotConfig::load`]
const ENV_KEYS: [&str; 6] = [
    "DATA_CLEAN",
    "ART_PRICE",
    "ART_CONSUMPTION",
    "ART_PROFIT",
    "GEMINI_API_KEY",
    "GEMINI_MODEL",
];

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BotConfig {
    /// Preferred historical data file
    pub data_clean: PathBuf,
    pub art_price: PathBuf,
    pub art_consumption: PathBuf,
    pub art_profit: PathBuf,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            data_clean: DEFAULT_DATA_PATH.into(),
            art_price: DEFAULT_PRICE_ARTIFACT.into(),
            art_consumption: DEFAULT_CONSUMPTION_ARTIFACT.into(),
            art_profit: DEFAULT_PROFIT_ARTIFACT.into(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl BotConfig {
    /// Load from defaults, `file` (if any) and the process environment
    ///
    /// A missing `file` is an error only when `file_required` is set.
    pub fn load(file: Option<&Path>, file_required: bool) -> Result<Self> {
        let env = ENV_KEYS
            .iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
            .collect();
        Self::load_from(file, file_required, env)
    }

    /// Load with an explicit environment map
    pub fn load_from(file: Option<&Path>, file_required: bool, env: HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("data_clean", defaults.data_clean.to_string_lossy().into_owned())?
            .set_default("art_price", defaults.art_price.to_string_lossy().into_owned())?
            .set_default("art_consumption", defaults.art_consumption.to_string_lossy().into_owned())?
            .set_default("art_profit", defaults.art_profit.to_string_lossy().into_owned())?
            .set_default("gemini_model", defaults.gemini_model)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(file_required));
        }

        // Empty values count as unset
        let env: HashMap<String, String> = env.into_iter().filter(|(_, v)| !v.trim().is_empty()).collect();
        builder = builder.add_source(Environment::default().source(Some(env)));

        let config: Self = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        Ok(config)
    }

    /// Artifact path configured for a target
    pub fn artifact_for(&self, target: Target) -> &Path {
        match target {
            Target::Precio => &self.art_price,
            Target::Consumo => &self.art_consumption,
            Target::Utilidad => &self.art_profit,
        }
    }

    /// Historical data paths in lookup order
    pub fn data_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.data_clean.clone()];
        for fallback in DEFAULT_DATA_CANDIDATES {
            let path = PathBuf::from(fallback);
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }
        candidates
    }

    pub fn has_api_key(&self) -> bool {
        self.gemini_api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

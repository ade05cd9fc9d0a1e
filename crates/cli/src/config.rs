//! Configuration management for the CLI

use anyhow::{Context, Result};
use coffee_lib::BotConfig;
use std::path::{Path, PathBuf};

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data: Option<PathBuf>,
    pub art_price: Option<PathBuf>,
    pub art_consumption: Option<PathBuf>,
    pub art_profit: Option<PathBuf>,
    pub model: Option<String>,
}

/// Load the bot configuration
///
/// An explicit `--config` file must exist; the default location is optional.
pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<BotConfig> {
    let mut config = match explicit {
        Some(path) => BotConfig::load(Some(path), true)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => {
            let default = config_path().ok();
            BotConfig::load(default.as_deref(), false)?
        }
    };
    apply(&mut config, overrides);
    Ok(config)
}

fn apply(config: &mut BotConfig, overrides: Overrides) {
    if let Some(path) = overrides.data {
        config.data_clean = path;
    }
    if let Some(path) = overrides.art_price {
        config.art_price = path;
    }
    if let Some(path) = overrides.art_consumption {
        config.art_consumption = path;
    }
    if let Some(path) = overrides.art_profit {
        config.art_profit = path;
    }
    if let Some(model) = overrides.model {
        config.gemini_model = model;
    }
}

/// Get the default configuration file path
pub fn config_path() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("coffeebot").join("config.toml"))
}

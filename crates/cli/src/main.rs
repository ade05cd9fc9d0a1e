//! CoffeeBot CLI
//!
//! Chat about the coffee market and get local model predictions for a
//! (country, type, year) key, plus the offline dataset and evaluation tools.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coffee_lib::{PredictCommand, PredictionService, StructuredLogger, Target};
use commands::{chat, evaluate, predict, reshape};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CoffeeBot CLI
#[derive(Parser)]
#[command(name = "coffeebot")]
#[command(author, version, about = "Coffee market chat bot and predictor", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); defaults to ~/.config/coffeebot/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Historical data file
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Price artifact
    #[arg(long, global = true)]
    pub art_price: Option<PathBuf>,

    /// Consumption artifact
    #[arg(long, global = true)]
    pub art_consumption: Option<PathBuf>,

    /// Profit artifact
    #[arg(long, global = true)]
    pub art_profit: Option<PathBuf>,

    /// Chat model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Chat model endpoint
    #[arg(long, env = "GEMINI_BASE_URL", default_value = client::DEFAULT_BASE_URL, global = true)]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,

    /// Predict a target for one country, type and year
    Predict {
        /// Target: precio, consumo or utilidad
        target: Target,

        /// Country name
        #[arg(long)]
        country: String,

        /// Coffee type
        #[arg(long = "type")]
        coffee_type: String,

        /// Year
        #[arg(long)]
        year: i32,
    },

    /// Score predictions in a CSV against observed values
    Evaluate {
        /// CSV file with observed and predicted columns
        file: PathBuf,

        /// Observed value column
        #[arg(long, default_value = "actual")]
        actual: String,

        /// Predicted value column
        #[arg(long, default_value = "predicted")]
        predicted: String,
    },

    /// Build the cleaned historical table from source files
    Reshape {
        /// Consumption source (wide crop-year columns or long form)
        #[arg(long)]
        consumption: PathBuf,

        /// Daily price quotes to average per year and merge
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Output CSV path
        #[arg(long, short, default_value = "data/coffee_clean.csv")]
        output: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let overrides = config::Overrides {
        data: cli.data,
        art_price: cli.art_price,
        art_consumption: cli.art_consumption,
        art_profit: cli.art_profit,
        model: cli.model,
    };
    let bot_config = config::load(cli.config.as_deref(), overrides)?;

    let logger = StructuredLogger::new(chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string());
    let service = PredictionService::new(logger.clone());

    // Execute command
    let result = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let backend = client::GeminiClient::new(
                &cli.api_url,
                bot_config.gemini_api_key.clone(),
                bot_config.gemini_model.clone(),
            )?;
            chat::run_chat(bot_config, service, backend, logger).await
        }
        Commands::Predict {
            target,
            country,
            coffee_type,
            year,
        } => {
            let command = PredictCommand {
                target,
                country,
                coffee_type,
                year,
            };
            predict::run_prediction(&bot_config, &service, &command, cli.format)
        }
        Commands::Evaluate {
            file,
            actual,
            predicted,
        } => evaluate::evaluate_file(&file, &actual, &predicted, cli.format),
        Commands::Reshape {
            consumption,
            prices,
            output,
        } => reshape::reshape_files(&consumption, prices.as_deref(), &output),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

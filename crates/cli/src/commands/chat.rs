//! Interactive chat loop

use anyhow::{Context, Result};
use coffee_lib::{BotConfig, BotMetrics, ChatBackend, PredictionService, Session, StructuredLogger, TurnOutcome};
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::output::{print_info, print_warning};

const METRICS_COMMAND: &str = "/metrics";

fn prompt() -> Result<()> {
    print!("{} ", "you>".cyan().bold());
    std::io::stdout().flush().context("Failed to flush stdout")
}

fn banner(config: &BotConfig, model: &str) {
    println!("{}", "☕ CoffeeBot".bold());
    print_info("Ask anything about coffee, or request a prediction:");
    println!("    /pred precio pais=Colombia tipo=Arabica año=2021");
    println!("    /pred consumo pais=\"Costa Rica\" tipo=Robusta año=2020");
    print_info(&format!("Chat model: {}. Type 'salir' to quit.", model));
    if !config.has_api_key() {
        print_warning("GEMINI_API_KEY is not set; only /pred commands will be answered");
    }
}

/// Run the chat loop on stdin until an exit word or end of input
pub async fn run_chat<B: ChatBackend>(
    config: BotConfig,
    service: PredictionService,
    backend: B,
    logger: StructuredLogger,
) -> Result<()> {
    let model = backend.model_name().to_string();
    banner(&config, &model);
    logger.log_startup(env!("CARGO_PKG_VERSION"), &model);

    let mut session = Session::new(config, service, backend, logger.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let reason = loop {
        prompt()?;
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            println!();
            break "end_of_input";
        };

        if line.trim() == METRICS_COMMAND {
            print!("{}", BotMetrics::new().render());
            continue;
        }

        match session.handle_turn(&line).await {
            TurnOutcome::Reply(reply) => println!("{} {}\n", "bot>".green().bold(), reply),
            TurnOutcome::Exit => {
                println!("¡Hasta luego!");
                break "user_exit";
            }
            TurnOutcome::Ignored => {}
        }
    };

    logger.log_shutdown(reason);
    Ok(())
}

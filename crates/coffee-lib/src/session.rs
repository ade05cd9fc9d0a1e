//! One interactive conversation
//!
//! Each turn is either a `/pred` command, answered locally from the data and
//! artifacts, or free text, forwarded to the chat backend. Failures of either
//! kind become the turn's reply; a turn never ends the session by error.

use crate::aligner::PredictionResult;
use crate::chat::{ChatBackend, Transcript};
use crate::command::{parse_command, PredictCommand};
use crate::config::BotConfig;
use crate::error::PredictError;
use crate::observability::{BotMetrics, StructuredLogger};
use crate::service::PredictionService;

pub const SYSTEM_PROMPT: &str = "You are CoffeeBot. Answer clearly and in the user's language. \
If the user writes '/pred <target> pais=<p> tipo=<t> año=<y>', the prediction is computed \
with local models (targets: precio, consumo, utilidad). Ask precisely for any missing data.";

const EXIT_WORDS: [&str; 3] = ["salir", "exit", "quit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply(String),
    Exit,
    /// Blank input
    Ignored,
}

pub struct Session<B> {
    config: BotConfig,
    service: PredictionService,
    backend: B,
    transcript: Transcript,
    metrics: BotMetrics,
    logger: StructuredLogger,
}

impl<B: ChatBackend> Session<B> {
    pub fn new(config: BotConfig, service: PredictionService, backend: B, logger: StructuredLogger) -> Self {
        Self {
            config,
            service,
            backend,
            transcript: Transcript::with_system_prompt(SYSTEM_PROMPT),
            metrics: BotMetrics::new(),
            logger,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn handle_turn(&mut self, input: &str) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() {
            return TurnOutcome::Ignored;
        }
        if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
            return TurnOutcome::Exit;
        }

        let reply = match parse_command(input) {
            Some(command) => self.run_command(&command),
            None => self.ask_backend(input).await,
        };
        self.transcript.record_turn(input, &reply);
        TurnOutcome::Reply(reply)
    }

    /// Answer a prediction command
    pub fn run_command(&self, command: &PredictCommand) -> String {
        match self.predict(command) {
            Ok(result) => format_prediction(command, &result),
            Err(e) => format!("❌ Prediction failed: {}: {}", e.kind(), e),
        }
    }

    fn predict(&self, command: &PredictCommand) -> Result<PredictionResult, PredictError> {
        let table = self
            .service
            .load_data(&self.config.data_candidates())
            .inspect_err(|e| {
                self.metrics.inc_prediction_errors(e.kind());
                self.logger.log_prediction_failed(command.target.column(), e);
            })?;
        self.service
            .predict(&table, self.config.artifact_for(command.target), &command.key())
    }

    async fn ask_backend(&self, message: &str) -> String {
        self.metrics.inc_chat_requests();
        match self.backend.complete(self.transcript.messages(), message).await {
            Ok(answer) => answer,
            Err(e) => {
                self.metrics.inc_chat_errors();
                self.logger.log_chat_failure(&e.to_string());
                format!("Could not get an answer from the chat model: {}", e)
            }
        }
    }
}

/// Render a prediction for display
pub fn format_prediction(command: &PredictCommand, result: &PredictionResult) -> String {
    let mut line = format!("- pred: {:.3}", result.pred);
    if let Some(band) = &result.pi80 {
        line.push_str(&format!(" (PI80: {:.3}–{:.3})", band.lo, band.hi));
    }
    if let Some(band) = &result.pi95 {
        line.push_str(&format!(" (PI95: {:.3}–{:.3})", band.lo, band.hi));
    }
    format!("✅ {} for {}\n{}", command.target.label(), result.key, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::{Interval, QueryKey};
    use crate::chat::{ChatMessage, Role};
    use crate::command::Target;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingBackend {
        seen: Mutex<Vec<(usize, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        async fn complete(&self, history: &[ChatMessage], message: &str) -> Result<String> {
            self.seen.lock().unwrap().push((history.len(), message.to_string()));
            if self.fail {
                return Err(PredictError::UpstreamUnavailable("missing GEMINI_API_KEY".to_string()));
            }
            Ok(format!("echo: {}", message))
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn fixture() -> (TempDir, BotConfig) {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("coffee.csv");
        std::fs::write(&data, "Country,Coffee type,year,price\nColombia,Arabica,2019,100\nColombia,Arabica,2020,110\n")
            .unwrap();
        let artifact = dir.path().join("price_model.json");
        std::fs::write(
            &artifact,
            r#"{"model": {"kind": "linear", "feature_names": ["year"], "coefficients": [2.0], "intercept": -4000.0},
                "feat_cols": ["year"], "PI80_abs": 1.5}"#,
        )
        .unwrap();
        let config = BotConfig {
            data_clean: data,
            art_price: artifact,
            art_consumption: dir.path().join("missing_consumption.json"),
            ..BotConfig::default()
        };
        (dir, config)
    }

    fn session(config: BotConfig, backend: RecordingBackend) -> Session<RecordingBackend> {
        let logger = StructuredLogger::new("test");
        Session::new(config, PredictionService::new(logger.clone()), backend, logger)
    }

    #[tokio::test]
    async fn test_prediction_command_reply() {
        let (_dir, config) = fixture();
        let mut session = session(config, RecordingBackend::default());
        let outcome = session
            .handle_turn("/pred precio pais=colombia tipo=arabica año=2021")
            .await;
        assert_eq!(
            outcome,
            TurnOutcome::Reply("✅ Precio for Colombia / Arabica / 2021\n- pred: 42.000 (PI80: 40.500–43.500)".to_string())
        );
        assert!(session.backend().seen.lock().unwrap().is_empty());
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_prediction_is_a_reply() {
        let (_dir, config) = fixture();
        let mut session = session(config, RecordingBackend::default());
        let outcome = session
            .handle_turn("/pred consumo pais=Colombia tipo=Arabica año=2021")
            .await;
        let TurnOutcome::Reply(text) = outcome else {
            panic!("expected a reply");
        };
        assert!(text.starts_with("❌ Prediction failed: NotFound:"), "{}", text);
        assert_eq!(session.transcript().messages()[2].content, text);
    }

    #[tokio::test]
    async fn test_free_text_goes_to_backend_with_history() {
        let (_dir, config) = fixture();
        let mut session = session(config, RecordingBackend::default());
        session.handle_turn("hola").await;
        let outcome = session.handle_turn("¿qué es arabica?").await;
        assert_eq!(outcome, TurnOutcome::Reply("echo: ¿qué es arabica?".to_string()));

        // History excludes the message being asked
        let seen = session.backend().seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(1, "hola".to_string()), (3, "¿qué es arabica?".to_string())]);
        assert_eq!(session.transcript().messages()[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_backend_failure_is_rendered() {
        let (_dir, config) = fixture();
        let backend = RecordingBackend {
            fail: true,
            ..RecordingBackend::default()
        };
        let mut session = session(config, backend);
        let TurnOutcome::Reply(text) = session.handle_turn("hola").await else {
            panic!("expected a reply");
        };
        assert!(text.starts_with("Could not get an answer from the chat model:"));
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_exit_and_blank_input() {
        let (_dir, config) = fixture();
        let mut session = session(config, RecordingBackend::default());
        assert_eq!(session.handle_turn("   ").await, TurnOutcome::Ignored);
        assert_eq!(session.handle_turn(" Salir ").await, TurnOutcome::Exit);
        assert_eq!(session.handle_turn("QUIT").await, TurnOutcome::Exit);
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_format_prediction_omits_missing_bands() {
        let command = PredictCommand {
            target: Target::Utilidad,
            country: "Peru".into(),
            coffee_type: "Arabica".into(),
            year: 2022,
        };
        let mut result = PredictionResult {
            target: "profit".into(),
            key: QueryKey::new("Peru", "Arabica", 2022),
            pred: 1.23456,
            pi80: None,
            pi95: None,
        };
        assert_eq!(format_prediction(&command, &result), "✅ Utilidad for Peru / Arabica / 2022\n- pred: 1.235");

        result.pi95 = Some(Interval::around(1.23456, 1.0));
        assert!(format_prediction(&command, &result).ends_with("- pred: 1.235 (PI95: 0.235–2.235)"));
    }
}

//! Observability for the prediction bot
//!
//! Provides:
//! - Prometheus metrics (predictions served, errors by kind, prediction latency, chat calls)
//! - Structured logging with tracing

use crate::aligner::PredictionResult;
use crate::artifact::ArtifactDescriptor;
use crate::error::PredictError;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<BotMetricsInner> = OnceLock::new();

struct BotMetricsInner {
    predictions_served: IntCounter,
    prediction_errors: IntCounterVec,
    prediction_latency_seconds: Histogram,
    chat_requests: IntCounter,
    chat_errors: IntCounter,
}

impl BotMetricsInner {
    fn new() -> Self {
        Self {
            predictions_served: register_int_counter!(
                "coffeebot_predictions_served_total",
                "Total number of predictions returned to the user"
            )
            .expect("Failed to register predictions_served"),

            prediction_errors: register_int_counter_vec!(
                "coffeebot_prediction_errors_total",
                "Failed prediction requests by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors"),

            prediction_latency_seconds: register_histogram!(
                "coffeebot_prediction_latency_seconds",
                "Time from command to prediction, including artifact and data loading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            chat_requests: register_int_counter!(
                "coffeebot_chat_requests_total",
                "Free-text messages forwarded to the chat model"
            )
            .expect("Failed to register chat_requests"),

            chat_errors: register_int_counter!(
                "coffeebot_chat_errors_total",
                "Chat model calls that failed"
            )
            .expect("Failed to register chat_errors"),
        }
    }
}

/// Bot metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct BotMetrics {
    _private: (),
}

impl Default for BotMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BotMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(BotMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &BotMetricsInner {
        GLOBAL_METRICS.get_or_init(BotMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_served(&self) {
        self.inner().predictions_served.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner().prediction_errors.with_label_values(&[kind]).inc();
    }

    pub fn inc_chat_requests(&self) {
        self.inner().chat_requests.inc();
    }

    pub fn inc_chat_errors(&self) {
        self.inner().chat_errors.inc();
    }

    pub fn predictions_served(&self) -> u64 {
        self.inner().predictions_served.get()
    }

    pub fn prediction_errors(&self, kind: &str) -> u64 {
        self.inner().prediction_errors.with_label_values(&[kind]).get()
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for bot events
#[derive(Clone)]
pub struct StructuredLogger {
    session: String,
}

impl StructuredLogger {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn log_startup(&self, version: &str, chat_model: &str) {
        info!(
            event = "bot_started",
            session = %self.session,
            version = %version,
            chat_model = %chat_model,
            "CoffeeBot started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "bot_shutdown",
            session = %self.session,
            reason = %reason,
            "CoffeeBot shutting down"
        );
    }

    pub fn log_artifact_loaded(&self, artifact: &ArtifactDescriptor) {
        info!(
            event = "artifact_loaded",
            session = %self.session,
            path = %artifact.path.display(),
            shape = artifact.shape.as_str(),
            target = %artifact.target_column,
            model = %artifact.model.describe(),
            checksum = %artifact.checksum,
            "Artifact loaded"
        );
    }

    pub fn log_prediction(&self, result: &PredictionResult, elapsed_ms: u128) {
        info!(
            event = "prediction_served",
            session = %self.session,
            target = %result.target,
            country = %result.key.country,
            coffee_type = %result.key.coffee_type,
            year = result.key.year,
            pred = result.pred,
            has_pi80 = result.pi80.is_some(),
            has_pi95 = result.pi95.is_some(),
            elapsed_ms = elapsed_ms,
            "Prediction served"
        );
    }

    pub fn log_prediction_failed(&self, target: &str, error: &PredictError) {
        warn!(
            event = "prediction_failed",
            session = %self.session,
            target = %target,
            kind = error.kind(),
            error = %error,
            "Prediction failed"
        );
    }

    pub fn log_chat_failure(&self, detail: &str) {
        warn!(
            event = "chat_failed",
            session = %self.session,
            error = %detail,
            "Chat model call failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_metrics_counters() {
        let metrics = BotMetrics::new();
        let before = metrics.prediction_errors("RowNotFound");
        metrics.inc_prediction_errors("RowNotFound");
        metrics.observe_prediction_latency(0.002);
        metrics.inc_chat_requests();
        assert_eq!(metrics.prediction_errors("RowNotFound"), before + 1);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        let metrics = BotMetrics::new();
        metrics.inc_predictions_served();
        let text = metrics.render();
        assert!(text.contains("coffeebot_predictions_served_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-session");
        assert_eq!(logger.session(), "test-session");
    }
}

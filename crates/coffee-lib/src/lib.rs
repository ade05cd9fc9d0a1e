//! Coffee market prediction library
//!
//! This crate provides the core functionality for:
//! - Loading and normalizing historical coffee market tables
//! - Loading regression artifacts of varying shape
//! - Rebuilding features and predicting a single (country, type, year) row
//! - Parsing `/pred` commands and running chat sessions
//! - Market analytics and source-file reshaping

pub mod aligner;
pub mod analytics;
pub mod artifact;
pub mod chat;
pub mod command;
pub mod config;
pub mod error;
pub mod features;
pub mod observability;
pub mod predictor;
pub mod reshape;
pub mod service;
pub mod session;
pub mod table;

pub use aligner::{Interval, PredictionResult, QueryKey};
pub use artifact::{load_artifact, ArtifactDescriptor, ArtifactShape};
pub use chat::{ChatBackend, ChatMessage, Role, Transcript};
pub use command::{parse_command, PredictCommand, Target};
pub use config::BotConfig;
pub use error::{PredictError, Result};
pub use features::{FeatureBuilder, FeatureHook, FeatureSet, Strategy};
pub use observability::{BotMetrics, StructuredLogger};
pub use service::PredictionService;
pub use session::{Session, TurnOutcome};
pub use table::{Cell, FeatureFrame, Table};

//! `SeaGuard` - LLM proxy and coastal safety guidance
//!
//! This library provides prompt proxying to an OpenAI-compatible model,
//! nearest-station tide lookups against KHOA OceanGrid, LLM-generated
//! safety assessments and disaster scenario simulation.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod marine;
pub mod models;
pub mod ocean;
pub mod scenario;
pub mod telemetry;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use config::SeaguardConfig;
pub use error::SeaguardError;
pub use llm::{CompletionRequest, LanguageModel, OpenAiClient};
pub use marine::{KhoaClient, MarineDataSource};
pub use models::{Coordinate, RiskLevel, SafetyAssessment, Station, StreamChunk};
pub use ocean::{SafetyGuideService, TideLocator};
pub use scenario::ScenarioSimulator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SeaguardError>;

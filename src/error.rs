//! Error types and handling for the `SeaGuard` service

use thiserror::Error;

/// Main error type for the `SeaGuard` service
#[derive(Error, Debug)]
pub enum SeaguardError {
    /// A provider credential or setting required by the endpoint is absent
    #[error("Configuration missing: {message}")]
    ConfigurationMissing { message: String },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed coordinate, date or request body
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Upstream language model failure (auth, rate limit, timeout, bad payload)
    #[error("LLM provider error{}: {message}", status_suffix(.status))]
    LlmProvider { status: Option<u16>, message: String },

    /// Upstream marine-data provider failure
    #[error("Marine provider error{}: {body}", status_suffix(.status))]
    MarineProvider { status: Option<u16>, body: String },

    /// Station list could not be obtained
    #[error("Station lookup failed: {message}")]
    StationLookup { message: String },

    /// No candidate station carries usable coordinates
    #[error("No station found: {message}")]
    NoStationFound { message: String },

    /// Observation data could not be fetched for the station and date
    #[error("Observation fetch failed: {message}")]
    ObservationFetch { message: String },

    /// The model's structured output did not match the assessment shape
    #[error("Assessment parse error: {message}")]
    AssessmentParse { message: String },

    /// A token stream ended without a terminal marker
    #[error("Stream truncated: upstream ended without a terminal marker")]
    StreamTruncated,

    /// Anything else
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl SeaguardError {
    /// Create a new configuration-missing error
    pub fn configuration_missing<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationMissing {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid-request error
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a new LLM provider error
    pub fn llm<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::LlmProvider {
            status,
            message: message.into(),
        }
    }

    /// Create a new marine provider error
    pub fn marine<S: Into<String>>(status: Option<u16>, body: S) -> Self {
        Self::MarineProvider {
            status,
            body: body.into(),
        }
    }

    pub fn station_lookup<S: Into<String>>(message: S) -> Self {
        Self::StationLookup {
            message: message.into(),
        }
    }

    pub fn no_station_found<S: Into<String>>(message: S) -> Self {
        Self::NoStationFound {
            message: message.into(),
        }
    }

    pub fn observation_fetch<S: Into<String>>(message: S) -> Self {
        Self::ObservationFetch {
            message: message.into(),
        }
    }

    pub fn assessment_parse<S: Into<String>>(message: S) -> Self {
        Self::AssessmentParse {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code this error is surfaced with
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            SeaguardError::ConfigurationMissing { .. } => 503,
            SeaguardError::InvalidRequest { .. } | SeaguardError::NoStationFound { .. } => 400,
            SeaguardError::LlmProvider { .. }
            | SeaguardError::MarineProvider { .. }
            | SeaguardError::StationLookup { .. }
            | SeaguardError::ObservationFetch { .. } => 502,
            SeaguardError::AssessmentParse { .. }
            | SeaguardError::Config { .. }
            | SeaguardError::StreamTruncated
            | SeaguardError::Internal { .. } => 500,
        }
    }

    /// Get a user-facing error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SeaguardError::ConfigurationMissing { message } => {
                format!("Service unavailable: {message}")
            }
            SeaguardError::InvalidRequest { message } => format!("Invalid request: {message}"),
            SeaguardError::NoStationFound { message } => message.clone(),
            SeaguardError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            SeaguardError::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

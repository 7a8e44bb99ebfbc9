//! Configuration management for the `SeaGuard` service
//!
//! Handles loading configuration from an optional TOML file and environment
//! variables, and validates every setting before the server starts.
//! Provider credentials are optional here: a missing key disables the
//! dependent endpoints instead of aborting startup.

use crate::SeaguardError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `SeaGuard` service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeaguardConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub marine: MarineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for non-streaming requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Serve HTTPS when both paths are set
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Language model provider settings (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; falls back to `OPENAI_API_KEY`
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model name; `MODEL_NAME` overrides the default
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Connect and per-read timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

/// KHOA OceanGrid settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarineConfig {
    /// Service key; falls back to `BADA_NURI_OPENAPI_SERVICE_KEY`
    pub service_key: Option<String>,
    #[serde(default = "default_marine_base_url")]
    pub base_url: String,
    #[serde(default = "default_marine_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_marine_max_retries")]
    pub max_retries: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// OpenTelemetry export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP/HTTP endpoint; export is disabled when unset
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u32 {
    120
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_llm_timeout() -> u32 {
    60
}

fn default_llm_max_retries() -> u32 {
    1
}

fn default_marine_base_url() -> String {
    "http://www.khoa.go.kr/api/oceangrid".to_string()
}

fn default_marine_timeout() -> u32 {
    10
}

fn default_marine_max_retries() -> u32 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_service_name() -> String {
    "seaguard".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
            tls: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_llm_timeout(),
            max_retries: default_llm_max_retries(),
        }
    }
}

impl Default for MarineConfig {
    fn default() -> Self {
        Self {
            service_key: None,
            base_url: default_marine_base_url(),
            timeout_seconds: default_marine_timeout(),
            max_retries: default_marine_max_retries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

impl SeaguardConfig {
    /// Load configuration from the default file location and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // SEAGUARD_LLM__MODEL=gpt-4o overrides llm.model
        builder = builder.add_source(
            Environment::with_prefix("SEAGUARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: SeaguardConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_conventional_env(|name| std::env::var(name).ok());
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("seaguard").join("config.toml"))
    }

    /// Honour the variable names the provider SDKs use by convention
    pub fn apply_conventional_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENAI_API_KEY");
        }
        if let Some(model) = lookup("MODEL_NAME").filter(|m| !m.trim().is_empty()) {
            self.llm.model = model;
        }
        if self.marine.service_key.is_none() {
            self.marine.service_key = lookup("BADA_NURI_OPENAPI_SERVICE_KEY");
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_llm_base_url();
        }
        if self.llm.model.is_empty() {
            self.llm.model = default_model();
        }
        if self.llm.max_tokens == 0 {
            self.llm.max_tokens = default_max_tokens();
        }
        if self.llm.timeout_seconds == 0 {
            self.llm.timeout_seconds = default_llm_timeout();
        }
        if self.marine.base_url.is_empty() {
            self.marine.base_url = default_marine_base_url();
        }
        if self.marine.timeout_seconds == 0 {
            self.marine.timeout_seconds = default_marine_timeout();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        // Blank keys count as missing
        if self.llm.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.llm.api_key = None;
        }
        if self
            .marine
            .service_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.marine.service_key = None;
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(
                SeaguardError::config("LLM temperature must be between 0.0 and 2.0").into(),
            );
        }

        if self.llm.timeout_seconds > 600 {
            return Err(SeaguardError::config("LLM timeout cannot exceed 600 seconds").into());
        }

        if self.marine.timeout_seconds > 300 {
            return Err(
                SeaguardError::config("Marine API timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.llm.max_retries > 10 || self.marine.max_retries > 10 {
            return Err(SeaguardError::config("Max retries cannot exceed 10").into());
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(SeaguardError::config("Request timeout must be positive").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(SeaguardError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(SeaguardError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("LLM base URL", &self.llm.base_url),
            ("Marine base URL", &self.marine.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SeaguardError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SeaguardConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "gpt-4-turbo-preview");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.marine.timeout_seconds, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.llm.api_key.is_none());
        assert!(config.marine.service_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_conventional_env_fills_missing_keys() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4o-mini"),
            ("BADA_NURI_OPENAPI_SERVICE_KEY", "khoa-key"),
        ]);
        let mut config = SeaguardConfig::default();
        config.apply_conventional_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.marine.service_key.as_deref(), Some("khoa-key"));
    }

    #[test]
    fn test_explicit_key_wins_over_conventional_env() {
        let mut config = SeaguardConfig::default();
        config.llm.api_key = Some("from-file".to_string());
        config.apply_conventional_env(|_| Some("from-env".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_blank_keys_are_treated_as_missing() {
        let mut config = SeaguardConfig::default();
        config.llm.api_key = Some("   ".to_string());
        config.marine.service_key = Some(String::new());
        config.apply_defaults();
        assert!(config.llm.api_key.is_none());
        assert!(config.marine.service_key.is_none());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = SeaguardConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_temperature_range() {
        let mut config = SeaguardConfig::default();
        config.llm.temperature = 2.5;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn test_config_validation_base_url_scheme() {
        let mut config = SeaguardConfig::default();
        config.marine.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("seaguard-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[llm]\nmodel = \"gpt-4o\"\ntemperature = 0.2\n",
        )
        .unwrap();

        let config = SeaguardConfig::load_from_path(Some(path.clone())).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, 2048);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = SeaguardConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("seaguard"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}

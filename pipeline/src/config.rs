//! Endpoint and timeout configuration.
//!
//! The three service URLs are the only deployment-specific settings. They can
//! come from a TOML file, from environment variables, or from the built-in
//! defaults that point at a development backend on `localhost:8000`.
//!
//! ```toml
//! [endpoints]
//! classification_url = "https://ai.example.org/predict_animal"
//! risk_url = "https://ai.example.org/risk_map"
//! ingestion_url = "https://reports.example.org/reports"
//!
//! [timeouts]
//! classification_ms = 15000
//! risk_ms = 10000
//! submission_ms = 20000
//!
//! [ingestion]
//! format = "multipart"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

pub const ENV_CLASSIFICATION_URL: &str = "ECOGUARD_CLASSIFICATION_URL";
pub const ENV_RISK_URL: &str = "ECOGUARD_RISK_URL";
pub const ENV_INGESTION_URL: &str = "ECOGUARD_INGESTION_URL";
pub const ENV_CLASSIFICATION_TIMEOUT_MS: &str = "ECOGUARD_CLASSIFICATION_TIMEOUT_MS";
pub const ENV_RISK_TIMEOUT_MS: &str = "ECOGUARD_RISK_TIMEOUT_MS";
pub const ENV_SUBMISSION_TIMEOUT_MS: &str = "ECOGUARD_SUBMISSION_TIMEOUT_MS";
pub const ENV_INGESTION_FORMAT: &str = "ECOGUARD_INGESTION_FORMAT";

/// How a completed draft is encoded for the ingestion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionFormat {
    /// JSON body carrying the SHA-256 image reference only
    #[default]
    JsonReference,
    /// JSON body with the image embedded as base64
    JsonInline,
    /// Multipart form: `file` part plus a `report` JSON part
    Multipart,
}

impl FromStr for IngestionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json_reference" | "json" | "reference" => Ok(Self::JsonReference),
            "json_inline" | "inline" => Ok(Self::JsonInline),
            "multipart" | "form" => Ok(Self::Multipart),
            _ => Err(format!("Unknown ingestion format: {}", s)),
        }
    }
}

impl fmt::Display for IngestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JsonReference => "json_reference",
            Self::JsonInline => "json_inline",
            Self::Multipart => "multipart",
        };
        f.write_str(name)
    }
}

/// Service endpoint URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    #[serde(default = "default_classification_url")]
    pub classification_url: String,
    #[serde(default = "default_risk_url")]
    pub risk_url: String,
    #[serde(default = "default_ingestion_url")]
    pub ingestion_url: String,
}

/// Upper bounds for each remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_classification_timeout_ms")]
    pub classification_ms: u64,
    #[serde(default = "default_risk_timeout_ms")]
    pub risk_ms: u64,
    #[serde(default = "default_submission_timeout_ms")]
    pub submission_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionSettings {
    #[serde(default)]
    pub format: IngestionFormat,
}

fn default_classification_url() -> String {
    "http://localhost:8000/predict_animal".to_string()
}

fn default_risk_url() -> String {
    "http://localhost:8000/risk_map".to_string()
}

fn default_ingestion_url() -> String {
    "http://localhost:8000/reports".to_string()
}

fn default_classification_timeout_ms() -> u64 {
    15_000
}

fn default_risk_timeout_ms() -> u64 {
    10_000
}

fn default_submission_timeout_ms() -> u64 {
    20_000
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            classification_url: default_classification_url(),
            risk_url: default_risk_url(),
            ingestion_url: default_ingestion_url(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            classification_ms: default_classification_timeout_ms(),
            risk_ms: default_risk_timeout_ms(),
            submission_ms: default_submission_timeout_ms(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub endpoints: EndpointSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub ingestion: IngestionSettings,
}

impl PipelineConfig {
    /// Build a configuration from the defaults overlaid with environment
    /// variables.
    ///
    /// # Environment Variables
    /// - `ECOGUARD_CLASSIFICATION_URL`, `ECOGUARD_RISK_URL`, `ECOGUARD_INGESTION_URL`
    /// - `ECOGUARD_CLASSIFICATION_TIMEOUT_MS`, `ECOGUARD_RISK_TIMEOUT_MS`,
    ///   `ECOGUARD_SUBMISSION_TIMEOUT_MS`
    /// - `ECOGUARD_INGESTION_FORMAT`: `json_reference` | `json_inline` | `multipart`
    ///
    /// # Errors
    /// Returns a configuration error if a variable is set but unparsable, or
    /// if the resulting configuration fails [`PipelineConfig::validate`].
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Environment variables still
    /// override file values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            PipelineError::configuration(format!("Failed to parse config file: {}", e))
        })?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the first `ecoguard.toml` found in the
    /// standard locations, falling back to [`PipelineConfig::from_env`].
    ///
    /// Searches:
    /// 1. Current directory
    /// 2. `pipeline/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> PipelineResult<Self> {
        let search_paths = [
            PathBuf::from("ecoguard.toml"),
            PathBuf::from("pipeline/ecoguard.toml"),
            PathBuf::from("../ecoguard.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Self::from_env()
    }

    fn apply_env(&mut self) -> PipelineResult<()> {
        if let Ok(url) = env::var(ENV_CLASSIFICATION_URL) {
            self.endpoints.classification_url = url;
        }
        if let Ok(url) = env::var(ENV_RISK_URL) {
            self.endpoints.risk_url = url;
        }
        if let Ok(url) = env::var(ENV_INGESTION_URL) {
            self.endpoints.ingestion_url = url;
        }
        if let Some(ms) = env_millis(ENV_CLASSIFICATION_TIMEOUT_MS)? {
            self.timeouts.classification_ms = ms;
        }
        if let Some(ms) = env_millis(ENV_RISK_TIMEOUT_MS)? {
            self.timeouts.risk_ms = ms;
        }
        if let Some(ms) = env_millis(ENV_SUBMISSION_TIMEOUT_MS)? {
            self.timeouts.submission_ms = ms;
        }
        if let Ok(format) = env::var(ENV_INGESTION_FORMAT) {
            self.ingestion.format = format
                .parse()
                .map_err(PipelineError::configuration)?;
        }
        Ok(())
    }

    /// Check that every URL is http(s) and every timeout is non-zero.
    pub fn validate(&self) -> PipelineResult<()> {
        let urls = [
            ("classification_url", &self.endpoints.classification_url),
            ("risk_url", &self.endpoints.risk_url),
            ("ingestion_url", &self.endpoints.ingestion_url),
        ];
        for (name, url) in urls {
            let parsed = reqwest::Url::parse(url).map_err(|e| {
                PipelineError::configuration(format!("{} '{}' is not a valid URL: {}", name, url, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(PipelineError::configuration(format!(
                    "{} must use http or https, got '{}'",
                    name,
                    parsed.scheme()
                )));
            }
        }

        let timeouts = [
            ("classification_ms", self.timeouts.classification_ms),
            ("risk_ms", self.timeouts.risk_ms),
            ("submission_ms", self.timeouts.submission_ms),
        ];
        for (name, ms) in timeouts {
            if ms == 0 {
                return Err(PipelineError::configuration(format!(
                    "timeout {} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Configuration with all three endpoints under one base URL, using the
    /// paths of the development backend.
    pub fn for_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            endpoints: EndpointSettings {
                classification_url: format!("{}/predict_animal", base),
                risk_url: format!("{}/risk_map", base),
                ingestion_url: format!("{}/reports", base),
            },
            ..Default::default()
        }
    }

    pub fn classification_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.classification_ms)
    }

    pub fn risk_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.risk_ms)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.submission_ms)
    }
}

fn env_millis(key: &str) -> PipelineResult<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PipelineError::configuration(format!("{} must be an integer number of milliseconds", key))),
        Err(_) => Ok(None),
    }
}

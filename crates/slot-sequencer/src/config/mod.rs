use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::sequencing::domain::OnExhausted;

/// Distinguishes runtime behavior for different stages of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the sequencer tooling.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub store: StoreConfig,
    pub playback: PlaybackConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("SLOTSEQ_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let database_path = env::var("SLOTSEQ_DB_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("slotseq.db"));

        let on_exhausted = match env::var("SLOTSEQ_ON_EXHAUSTED") {
            Ok(value) => value
                .parse::<OnExhausted>()
                .map_err(|_| ConfigError::InvalidOnExhausted { value })?,
            Err(_) => OnExhausted::default(),
        };

        let log_level = env::var("SLOTSEQ_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            store: StoreConfig { database_path },
            playback: PlaybackConfig { on_exhausted },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Where the SQLite configuration store lives.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

/// Behavior applied to every playback session.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackConfig {
    pub on_exhausted: OnExhausted,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidOnExhausted { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidOnExhausted { value } => write!(
                f,
                "SLOTSEQ_ON_EXHAUSTED must be `wrap` or `stop`, got '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

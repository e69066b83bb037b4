// src/error.rs - Top-level errors surfaced by the relay host
use relay_shared::PinError;
use relay_shared::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pin error: {0}")]
    Pin(#[from] PinError),
    #[error("Console IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

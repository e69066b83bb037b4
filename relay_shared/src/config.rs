//! # Relay Controller Configuration
//!
//! Loaded once at startup and immutable afterwards.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [gpio]
//! output_pins = [2, 3, 4, 17, 27, 22, 10, 9]
//! input_pins = [26]
//! safe_mode = true
//! allowed_pins = [4, 17]
//! graceful_shutdown = true
//! active_low = true
//! driver = "native"
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! - `output_pins` are the relay channels, in the order cycles visit them.
//! - `input_pins` are reserved for sensors (e.g. IR) and never writable.
//! - `allowed_pins` only matters when `safe_mode` is on.

use crate::types::PinNumber;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the relay controller.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which hardware backend to probe at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Native,
    Simulated,
    Null,
}

/// Pin layout and access policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpioConfig {
    #[serde(default = "default_output_pins")]
    pub output_pins: Vec<PinNumber>,
    #[serde(default)]
    pub input_pins: Vec<PinNumber>,
    #[serde(default)]
    pub safe_mode: bool,
    #[serde(default)]
    pub allowed_pins: Vec<PinNumber>,
    #[serde(default = "default_graceful_shutdown")]
    pub graceful_shutdown: bool,
    #[serde(default)]
    pub active_low: bool,
    #[serde(default = "default_driver")]
    pub driver: DriverKind,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            output_pins: default_output_pins(),
            input_pins: Vec::new(),
            safe_mode: false,
            allowed_pins: Vec::new(),
            graceful_shutdown: default_graceful_shutdown(),
            active_low: false,
            driver: default_driver(),
        }
    }
}

impl GpioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for pin in self.output_pins.iter().chain(self.input_pins.iter()) {
            if !seen.insert(*pin) {
                return Err(ConfigError::Invalid(format!(
                    "pin {} is listed more than once across output_pins/input_pins",
                    pin
                )));
            }
        }
        if let Some(pin) = self.allowed_pins.iter().find(|p| !self.output_pins.contains(p)) {
            return Err(ConfigError::Invalid(format!(
                "allowed pin {} is not a configured output pin",
                pin
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

// Default value functions
fn default_output_pins() -> Vec<PinNumber> { vec![2, 3, 4, 17, 27, 22, 10, 9] }
fn default_graceful_shutdown() -> bool { true }
fn default_driver() -> DriverKind { DriverKind::Native }
fn default_log_level() -> String { "info".to_string() }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.gpio.validate()?;
    Ok(config)
}

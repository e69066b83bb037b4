// relay_shared/src/types.rs - Logical pin model
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BCM pin number as used by the board's GPIO numbering scheme.
pub type PinNumber = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Input,
    Output,
}

/// Logical pin state. Active-high/active-low wiring is resolved by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    On,
    Off,
}

impl PinState {
    pub fn toggled(self) -> Self {
        match self {
            PinState::On => PinState::Off,
            PinState::Off => PinState::On,
        }
    }

    pub fn is_on(self) -> bool {
        self == PinState::On
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinMode::Input => f.pad("input"),
            PinMode::Output => f.pad("output"),
        }
    }
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinState::On => f.pad("ON"),
            PinState::Off => f.pad("OFF"),
        }
    }
}

impl FromStr for PinState {
    type Err = String;

    /// Accepts the console's `1`/`0` as well as `on`/`off`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "high" => Ok(PinState::On),
            "off" | "0" | "low" => Ok(PinState::Off),
            other => Err(format!("Invalid pin state '{}', expected on/off", other)),
        }
    }
}

impl FromStr for PinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "input" => Ok(PinMode::Input),
            "out" | "output" => Ok(PinMode::Output),
            other => Err(format!("Invalid pin mode '{}', expected input/output", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parsing_accepts_console_digits() {
        assert_eq!("1".parse::<PinState>(), Ok(PinState::On));
        assert_eq!(" off ".parse::<PinState>(), Ok(PinState::Off));
        assert!("2".parse::<PinState>().is_err());
    }

    #[test]
    fn test_toggle() {
        assert_eq!(PinState::On.toggled(), PinState::Off);
        assert_eq!(PinState::Off.toggled(), PinState::On);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("OUT".parse::<PinMode>(), Ok(PinMode::Output));
        assert_eq!("input".parse::<PinMode>(), Ok(PinMode::Input));
        assert!("pwm".parse::<PinMode>().is_err());
    }
}

// relay_shared/src/error.rs - Error taxonomy for pin operations
use crate::types::PinNumber;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("Pin {pin} is not configured")]
    UnknownPin { pin: PinNumber },
    #[error("Pin {pin} is invalid for this operation: {reason}")]
    InvalidPin { pin: PinNumber, reason: String },
    #[error("Pin {pin} cannot be modified while safe mode is enabled")]
    SafeModeRestricted { pin: PinNumber },
    #[error("Pin {pin} is reserved for a sensor and cannot be modified")]
    ReservedPin { pin: PinNumber },
    #[error("GPIO driver is not initialized")]
    DriverNotInitialized,
    #[error("Pin {pin} already has a scheduled task")]
    AlreadyScheduled { pin: PinNumber },
    #[error("Failed to write pin {pin}: {reason}")]
    HardwareWriteFailed { pin: PinNumber, reason: String },
    #[error("Another relay cycle is already running")]
    CycleInProgress,
}

impl PinError {
    pub fn invalid(pin: PinNumber, reason: impl Into<String>) -> Self {
        PinError::InvalidPin { pin, reason: reason.into() }
    }

    pub fn write_failed(pin: PinNumber, reason: impl ToString) -> Self {
        PinError::HardwareWriteFailed { pin, reason: reason.to_string() }
    }

    /// The pin this error refers to, if any.
    pub fn pin(&self) -> Option<PinNumber> {
        match self {
            PinError::UnknownPin { pin }
            | PinError::InvalidPin { pin, .. }
            | PinError::SafeModeRestricted { pin }
            | PinError::ReservedPin { pin }
            | PinError::AlreadyScheduled { pin }
            | PinError::HardwareWriteFailed { pin, .. } => Some(*pin),
            PinError::DriverNotInitialized | PinError::CycleInProgress => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_pin_number() {
        let err = PinError::SafeModeRestricted { pin: 5 };
        assert_eq!(err.to_string(), "Pin 5 cannot be modified while safe mode is enabled");
        assert_eq!(err.pin(), Some(5));
        assert_eq!(PinError::DriverNotInitialized.pin(), None);
    }
}

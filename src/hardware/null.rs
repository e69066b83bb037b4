// src/hardware/null.rs - Driver for platforms without a GPIO interface
use relay_shared::{HardwareDriver, PinError, PinMode, PinNumber, PinState, ProbeStatus};

/// Stand-in used when probing found no usable hardware. Every operation
/// fails with `DriverNotInitialized`, so the rest of the system keeps serving
/// last-known state from the registry without touching a device.
#[derive(Debug, Clone, Default)]
pub struct NullDriver {
    reason: String,
}

impl NullDriver {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl HardwareDriver for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    fn probe(&self) -> ProbeStatus {
        ProbeStatus::Unsupported(self.reason.clone())
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn read(&self, _pin: PinNumber) -> Result<PinState, PinError> {
        Err(PinError::DriverNotInitialized)
    }

    fn write(&self, _pin: PinNumber, _mode: PinMode, _state: PinState) -> Result<(), PinError> {
        Err(PinError::DriverNotInitialized)
    }

    fn shutdown(&self, _graceful: bool) -> Vec<PinNumber> {
        Vec::new()
    }
}

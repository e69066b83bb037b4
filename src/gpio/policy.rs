// src/gpio/policy.rs - Safe-mode and reserved-pin access checks
use crate::gpio::registry::PinRegistry;
use relay_shared::config::GpioConfig;
use relay_shared::{PinError, PinNumber};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct AccessPolicy {
    registry: Arc<PinRegistry>,
    reserved: HashSet<PinNumber>,
    outputs: Vec<PinNumber>,
    safe_mode: bool,
    allow_list: HashSet<PinNumber>,
}

impl AccessPolicy {
    pub fn new(registry: Arc<PinRegistry>, config: &GpioConfig) -> Self {
        Self {
            registry,
            reserved: config.input_pins.iter().copied().collect(),
            outputs: config.output_pins.clone(),
            safe_mode: config.safe_mode,
            allow_list: config.allowed_pins.iter().copied().collect(),
        }
    }

    /// `Ok(())` when the access is allowed, otherwise the denial reason.
    /// Reads of known pins are always allowed.
    pub fn authorize(&self, pin: PinNumber, intended_write: bool) -> Result<(), PinError> {
        if !self.registry.contains(pin) {
            return Err(PinError::UnknownPin { pin });
        }
        if !intended_write {
            return Ok(());
        }
        if self.reserved.contains(&pin) {
            return Err(PinError::ReservedPin { pin });
        }
        if self.safe_mode && !self.allow_list.contains(&pin) {
            return Err(PinError::SafeModeRestricted { pin });
        }
        Ok(())
    }

    pub fn is_output(&self, pin: PinNumber) -> bool {
        self.outputs.contains(&pin)
    }

    /// Configured relay pins, in configuration order.
    pub fn output_pins(&self) -> &[PinNumber] {
        &self.outputs
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(safe_mode: bool) -> AccessPolicy {
        let config = GpioConfig {
            output_pins: vec![4, 5, 17],
            input_pins: vec![26],
            safe_mode,
            allowed_pins: vec![4, 17],
            ..Default::default()
        };
        let registry = Arc::new(PinRegistry::new(&config.output_pins, &config.input_pins));
        AccessPolicy::new(registry, &config)
    }

    #[test]
    fn test_unknown_pin_denied() {
        let policy = policy(false);
        assert_eq!(policy.authorize(40, false), Err(PinError::UnknownPin { pin: 40 }));
        assert_eq!(policy.authorize(40, true), Err(PinError::UnknownPin { pin: 40 }));
    }

    #[test]
    fn test_safe_mode_restricts_writes_only() {
        let policy = policy(true);
        assert_eq!(policy.authorize(5, true), Err(PinError::SafeModeRestricted { pin: 5 }));
        assert_eq!(policy.authorize(5, false), Ok(()));
        assert_eq!(policy.authorize(4, true), Ok(()));
        assert_eq!(policy.authorize(17, true), Ok(()));
    }

    #[test]
    fn test_reserved_pin_never_writable() {
        for safe_mode in [false, true] {
            let policy = policy(safe_mode);
            assert_eq!(policy.authorize(26, true), Err(PinError::ReservedPin { pin: 26 }));
            assert_eq!(policy.authorize(26, false), Ok(()));
        }
    }

    #[test]
    fn test_without_safe_mode_all_outputs_writable() {
        let policy = policy(false);
        for pin in [4, 5, 17] {
            assert_eq!(policy.authorize(pin, true), Ok(()));
        }
        assert!(policy.is_output(5));
        assert!(!policy.is_output(26));
    }
}

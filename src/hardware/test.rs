// src/hardware/test.rs - Tests for the GPIO backends
#[cfg(test)]
mod tests {
    use super::super::*;
    use relay_shared::{PinError, PinMode, PinState};

    #[test]
    fn test_operations_fail_before_probe() {
        let driver = SimulatedDriver::new();
        assert_eq!(driver.write(4, PinMode::Output, PinState::On), Err(PinError::DriverNotInitialized));
        assert_eq!(driver.read(4), Err(PinError::DriverNotInitialized));
        assert!(driver.history().is_empty());
    }

    #[tokio::test]
    async fn test_simulated_write_and_read() {
        let driver = SimulatedDriver::new();
        assert_eq!(driver.probe(), ProbeStatus::Initialized);

        driver.write(4, PinMode::Output, PinState::On).unwrap();
        assert_eq!(driver.read(4), Ok(PinState::On));

        // Same write twice is harmless
        driver.write(4, PinMode::Output, PinState::On).unwrap();
        assert_eq!(driver.read(4), Ok(PinState::On));
        assert_eq!(driver.history_for(4).len(), 2);
    }

    #[tokio::test]
    async fn test_input_write_leaves_state_undriven() {
        let driver = SimulatedDriver::new();
        driver.probe();
        driver.write(17, PinMode::Output, PinState::Off).unwrap();
        driver.write(17, PinMode::Input, PinState::On).unwrap();
        assert_eq!(driver.level(17), Some(PinState::Off));
    }

    #[test]
    fn test_read_unconfigured_pin_is_invalid() {
        let driver = SimulatedDriver::new();
        driver.probe();
        assert!(matches!(driver.read(22), Err(PinError::InvalidPin { pin: 22, .. })));

        driver.set_input_level(22, PinState::On);
        assert_eq!(driver.read(22), Ok(PinState::On));
    }

    #[tokio::test]
    async fn test_graceful_shutdown_closes_outputs_once() {
        let driver = SimulatedDriver::new();
        driver.probe();
        driver.write(4, PinMode::Output, PinState::On).unwrap();
        driver.write(17, PinMode::Output, PinState::Off).unwrap();
        driver.set_input_level(26, PinState::On);

        assert_eq!(driver.shutdown(true), vec![4]);
        assert_eq!(driver.level(4), Some(PinState::Off));
        assert_eq!(driver.level(26), Some(PinState::On));
        assert!(!driver.is_initialized());

        // Second call is a no-op
        assert!(driver.shutdown(true).is_empty());
        assert_eq!(driver.write(4, PinMode::Output, PinState::On), Err(PinError::DriverNotInitialized));
    }

    #[tokio::test]
    async fn test_forced_shutdown_leaves_outputs() {
        let driver = SimulatedDriver::new();
        driver.probe();
        driver.write(4, PinMode::Output, PinState::On).unwrap();
        assert!(driver.shutdown(false).is_empty());
        assert_eq!(driver.level(4), Some(PinState::On));
    }

    #[test]
    fn test_injected_write_failure() {
        let driver = SimulatedDriver::new();
        driver.probe();
        driver.fail_writes_on(9);
        assert!(matches!(
            driver.write(9, PinMode::Output, PinState::On),
            Err(PinError::HardwareWriteFailed { pin: 9, .. })
        ));
        driver.clear_failures();
        assert!(driver.write(9, PinMode::Output, PinState::On).is_ok());
    }

    #[test]
    fn test_null_driver_rejects_everything() {
        let driver = NullDriver::new("no gpio here");
        assert_eq!(driver.probe(), ProbeStatus::Unsupported("no gpio here".to_string()));
        assert!(!driver.is_initialized());
        assert_eq!(driver.write(4, PinMode::Output, PinState::On), Err(PinError::DriverNotInitialized));
        assert_eq!(driver.read(4), Err(PinError::DriverNotInitialized));
        assert!(driver.shutdown(true).is_empty());
    }

    #[test]
    fn test_unsupported_probe_falls_back_to_null() {
        let (driver, status) = probe_or_fallback(std::sync::Arc::new(SimulatedDriver::unsupported()));
        assert!(matches!(status, ProbeStatus::Unsupported(_)));
        assert_eq!(driver.name(), "null");
        assert_eq!(driver.write(4, PinMode::Output, PinState::On), Err(PinError::DriverNotInitialized));
    }

    #[test]
    fn test_select_simulated_driver() {
        let config = relay_shared::config::GpioConfig {
            driver: relay_shared::config::DriverKind::Simulated,
            ..Default::default()
        };
        let (driver, status) = select_driver(&config);
        assert_eq!(status, ProbeStatus::Initialized);
        assert_eq!(driver.name(), "simulated");
        assert!(driver.is_initialized());
    }

    #[cfg(not(all(feature = "rpi", target_os = "linux")))]
    #[test]
    fn test_native_driver_unsupported_without_rpi_feature() {
        let driver = NativeGpioDriver::new(true);
        assert!(matches!(driver.probe(), ProbeStatus::Unsupported(_)));
        assert_eq!(driver.write(4, PinMode::Output, PinState::On), Err(PinError::DriverNotInitialized));
        assert!(driver.shutdown(true).is_empty());
    }
}

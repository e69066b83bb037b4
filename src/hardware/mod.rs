// src/hardware/mod.rs - GPIO backend selection
pub mod native;
pub mod null;
pub mod simulated;

#[cfg(test)]
mod test;

pub use native::NativeGpioDriver;
pub use null::NullDriver;
pub use simulated::{SimulatedDriver, Transition};

use relay_shared::config::{DriverKind, GpioConfig};
use relay_shared::{HardwareDriver, ProbeStatus};
use std::sync::Arc;

/// Builds the configured backend and probes it once. When the platform turns
/// out to be unsupported the null driver is returned instead, so nothing
/// further down the stack needs to check the platform again.
pub fn select_driver(config: &GpioConfig) -> (Arc<dyn HardwareDriver>, ProbeStatus) {
    let candidate: Arc<dyn HardwareDriver> = match config.driver {
        DriverKind::Native => Arc::new(NativeGpioDriver::new(config.active_low)),
        DriverKind::Simulated => Arc::new(SimulatedDriver::new()),
        DriverKind::Null => Arc::new(NullDriver::new("null driver selected in configuration")),
    };
    probe_or_fallback(candidate)
}

pub fn probe_or_fallback(candidate: Arc<dyn HardwareDriver>) -> (Arc<dyn HardwareDriver>, ProbeStatus) {
    match candidate.probe() {
        ProbeStatus::Initialized => {
            tracing::info!("GPIO driver '{}' initialized", candidate.name());
            (candidate, ProbeStatus::Initialized)
        }
        ProbeStatus::Unsupported(reason) => {
            tracing::warn!(
                "Failed to initialize GPIO driver '{}' ({}). Pin control is disabled.",
                candidate.name(),
                reason
            );
            let status = ProbeStatus::Unsupported(reason.clone());
            (Arc::new(NullDriver::new(reason)), status)
        }
    }
}

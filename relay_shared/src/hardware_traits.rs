// Trait-based interface for GPIO hardware backends (shared)

use crate::error::PinError;
use crate::types::{PinMode, PinNumber, PinState};

/// Outcome of probing the platform for a usable GPIO interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Initialized,
    Unsupported(String),
}

/// A GPIO backend. Implementations own the process-wide hardware handle and
/// are the only place a physical write happens.
///
/// `probe` must succeed before any other operation; until then every call
/// fails with [`PinError::DriverNotInitialized`]. After `shutdown` the driver
/// behaves as if it had never been probed.
pub trait HardwareDriver: Send + Sync {
    fn name(&self) -> &'static str;

    fn probe(&self) -> ProbeStatus;

    fn is_initialized(&self) -> bool;

    /// Reads the logical state of a pin the driver has configured.
    fn read(&self, pin: PinNumber) -> Result<PinState, PinError>;

    /// Sets the mode, then drives `state` when the mode is `Output`.
    /// An `Input` write only reconfigures the pin.
    fn write(&self, pin: PinNumber, mode: PinMode, state: PinState) -> Result<(), PinError>;

    /// Releases the hardware handle. When `graceful`, every pin that is
    /// currently an output and on is driven off first; those pins are
    /// returned. Calling it again is a no-op.
    fn shutdown(&self, graceful: bool) -> Vec<PinNumber>;
}

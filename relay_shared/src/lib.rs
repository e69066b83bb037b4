// relay_shared: pin data model, errors, configuration and driver traits shared by the host and tests

pub mod config;
pub mod error;
pub mod event_interface;
pub mod hardware_traits;
pub mod types;

pub use error::PinError;
pub use event_interface::{EventSink, PinEvent};
pub use hardware_traits::{HardwareDriver, ProbeStatus};
pub use types::{PinMode, PinNumber, PinState};

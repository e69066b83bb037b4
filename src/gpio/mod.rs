// src/gpio/mod.rs - Pin control core: registry, access policy, scheduler, cycles
pub mod controller;
pub mod cycle;
pub mod events;
pub mod morse;
pub mod policy;
pub mod registry;
pub mod scheduler;

pub use controller::{PinController, PinSnapshot};
pub use cycle::{CycleDefinition, CycleEngine, CycleKind, CycleReport, CycleState, CycleStep, PinAction};
pub use events::EventBus;
pub use policy::AccessPolicy;
pub use registry::{PinGuard, PinRecord, PinRegistry, PinUpdate, ScheduledRevert};
pub use scheduler::Scheduler;

use relay_shared::{EventSink, HardwareDriver, PinError, PinEvent, PinMode, PinState};

/// Physical write followed by the record update, for a pin whose lock the
/// caller already holds. The record is left untouched when the driver fails.
pub(crate) fn drive_locked(
    driver: &dyn HardwareDriver,
    events: &EventBus,
    record: &mut PinRecord,
    mode: PinMode,
    state: PinState,
) -> Result<(), PinError> {
    let pin = record.pin;
    driver.write(pin, mode, state)?;
    record.apply(PinUpdate::write(mode, state));
    tracing::trace!("Configured ({}) gpio pin to ({}) state with ({}) mode.", pin, state, mode);
    events.publish(PinEvent::PinWritten { pin, mode, state });
    Ok(())
}

// src/gpio/registry.rs - Authoritative per-pin configuration records
use chrono::{DateTime, Local};
use relay_shared::{PinError, PinMode, PinNumber, PinState};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Cancellable reference to the timer task behind a scheduled revert.
#[derive(Clone)]
pub struct RevertHandle {
    id: Uuid,
    abort: Arc<AbortHandle>,
}

impl RevertHandle {
    pub(crate) fn new(id: Uuid, abort: AbortHandle) -> Self {
        Self { id, abort: Arc::new(abort) }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn abort(&self) {
        self.abort.abort();
    }
}

impl fmt::Debug for RevertHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevertHandle").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledRevert {
    pub target_state: PinState,
    pub fire_at: Instant,
    pub fire_at_wallclock: DateTime<Local>,
    pub handle: RevertHandle,
}

#[derive(Debug, Clone)]
pub struct PinRecord {
    pub pin: PinNumber,
    pub mode: PinMode,
    pub state: PinState,
    pub scheduled_revert: Option<ScheduledRevert>,
}

impl PinRecord {
    pub fn new(pin: PinNumber, mode: PinMode) -> Self {
        Self { pin, mode, state: PinState::Off, scheduled_revert: None }
    }

    pub fn is_on(&self) -> bool {
        self.mode == PinMode::Output && self.state.is_on()
    }

    pub fn has_pending_revert(&self) -> bool {
        self.scheduled_revert.is_some()
    }

    pub fn apply(&mut self, update: PinUpdate) {
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(revert) = update.revert {
            self.scheduled_revert = revert;
        }
    }
}

impl fmt::Display for PinRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin {:>2} | {:<6} | {:<3}", self.pin, self.mode, self.state)?;
        if let Some(revert) = &self.scheduled_revert {
            write!(
                f,
                " | turns {} at {}",
                revert.target_state,
                revert.fire_at_wallclock.format("%H:%M:%S")
            )?;
        }
        Ok(())
    }
}

/// Fields to replace on a record. `None` leaves a field untouched;
/// `revert: Some(None)` clears a pending revert.
#[derive(Debug, Clone, Default)]
pub struct PinUpdate {
    pub mode: Option<PinMode>,
    pub state: Option<PinState>,
    pub revert: Option<Option<ScheduledRevert>>,
}

impl PinUpdate {
    pub fn write(mode: PinMode, state: PinState) -> Self {
        Self { mode: Some(mode), state: Some(state), revert: None }
    }

    pub fn clear_revert() -> Self {
        Self { revert: Some(None), ..Default::default() }
    }
}

/// Exclusive access to one pin's record. Holding it serializes every
/// mutation of that pin; other pins stay independent.
pub type PinGuard = OwnedMutexGuard<PinRecord>;

/// Fixed set of pin records declared at startup.
#[derive(Debug)]
pub struct PinRegistry {
    pins: BTreeMap<PinNumber, Arc<Mutex<PinRecord>>>,
}

impl PinRegistry {
    pub fn new(output_pins: &[PinNumber], input_pins: &[PinNumber]) -> Self {
        let mut pins = BTreeMap::new();
        for pin in output_pins {
            pins.insert(*pin, Arc::new(Mutex::new(PinRecord::new(*pin, PinMode::Output))));
        }
        for pin in input_pins {
            pins.insert(*pin, Arc::new(Mutex::new(PinRecord::new(*pin, PinMode::Input))));
        }
        Self { pins }
    }

    pub fn contains(&self, pin: PinNumber) -> bool {
        self.pins.contains_key(&pin)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Registered pins in ascending order.
    pub fn pins(&self) -> Vec<PinNumber> {
        self.pins.keys().copied().collect()
    }

    pub async fn lock(&self, pin: PinNumber) -> Result<PinGuard, PinError> {
        let slot = self.pins.get(&pin).ok_or(PinError::UnknownPin { pin })?;
        Ok(slot.clone().lock_owned().await)
    }

    pub async fn get(&self, pin: PinNumber) -> Result<PinRecord, PinError> {
        Ok(self.lock(pin).await?.clone())
    }

    pub async fn update(&self, pin: PinNumber, update: PinUpdate) -> Result<PinRecord, PinError> {
        let mut record = self.lock(pin).await?;
        record.apply(update);
        Ok(record.clone())
    }

    pub async fn snapshot(&self) -> Vec<PinRecord> {
        let mut records = Vec::with_capacity(self.pins.len());
        for slot in self.pins.values() {
            records.push(slot.lock().await.clone());
        }
        records
    }
}

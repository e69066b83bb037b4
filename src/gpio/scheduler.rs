// src/gpio/scheduler.rs - One-shot delayed pin state changes
//!
//! Each pin holds at most one pending revert, stored in its `PinRecord`
//! together with the handle of the timer task. Arming, cancelling and firing
//! all happen under the pin's lock, so a cancel racing a fire either wins
//! (the fire finds its revert gone and does nothing) or loses (the fire has
//! already applied and cleared it).

use crate::gpio::drive_locked;
use crate::gpio::events::EventBus;
use crate::gpio::registry::{PinRecord, PinRegistry, PinUpdate, RevertHandle, ScheduledRevert};
use chrono::{DateTime, Local};
use relay_shared::{EventSink, HardwareDriver, PinError, PinEvent, PinNumber, PinState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

pub struct Scheduler {
    registry: Arc<PinRegistry>,
    driver: Arc<dyn HardwareDriver>,
    events: EventBus,
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl Scheduler {
    pub fn new(registry: Arc<PinRegistry>, driver: Arc<dyn HardwareDriver>, events: EventBus) -> Self {
        Self {
            registry,
            driver,
            events,
            tasks: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Schedules `pin` to be driven to `target` after `after`. Rejected with
    /// `AlreadyScheduled` if the pin already has a pending revert.
    pub async fn arm(&self, pin: PinNumber, target: PinState, after: Duration) -> Result<Instant, PinError> {
        let mut record = self.registry.lock(pin).await?;
        self.arm_locked(&mut record, target, after)
    }

    /// Same as [`Scheduler::arm`] for a pin whose lock the caller holds.
    pub fn arm_locked(&self, record: &mut PinRecord, target: PinState, after: Duration) -> Result<Instant, PinError> {
        let pin = record.pin;
        if self.closed.load(Ordering::SeqCst) {
            return Err(PinError::DriverNotInitialized);
        }
        if record.has_pending_revert() {
            tracing::warn!("Pin {} already has a scheduled task, not replacing it", pin);
            self.events.publish(PinEvent::ScheduleRejected { pin });
            return Err(PinError::AlreadyScheduled { pin });
        }

        let (fire_at, fire_at_wallclock) = deadline(pin, after)?;
        let id = Uuid::new_v4();
        let task = fire(
            self.registry.clone(),
            self.driver.clone(),
            self.events.clone(),
            pin,
            id,
            target,
            fire_at,
        );
        let abort = {
            let mut tasks = self.tasks();
            while tasks.try_join_next().is_some() {}
            tasks.spawn(task)
        };

        record.scheduled_revert = Some(ScheduledRevert {
            target_state: target,
            fire_at,
            fire_at_wallclock,
            handle: RevertHandle::new(id, abort),
        });
        tracing::debug!("Armed task {} for pin {} -> {} in {:?}", id, pin, target, after);
        self.events.publish(PinEvent::ScheduleArmed { pin, target, fire_at: fire_at_wallclock });
        Ok(fire_at)
    }

    /// Cancels the pending revert of `pin`; returns whether one existed.
    pub async fn cancel(&self, pin: PinNumber) -> Result<bool, PinError> {
        let mut record = self.registry.lock(pin).await?;
        Ok(self.cancel_locked(&mut record))
    }

    pub fn cancel_locked(&self, record: &mut PinRecord) -> bool {
        match record.scheduled_revert.take() {
            Some(revert) => {
                revert.handle.abort();
                self.events.publish(PinEvent::ScheduleCancelled { pin: record.pin });
                true
            }
            None => false,
        }
    }

    /// Number of timer tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Stops accepting new schedules, aborts every timer and waits for them
    /// to finish, then clears all pending reverts from the registry.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut tasks = std::mem::take(&mut *self.tasks());
        let outstanding = tasks.len();
        tasks.shutdown().await;
        if outstanding > 0 {
            tracing::info!("Cancelled {} outstanding scheduled task(s)", outstanding);
        }
        for pin in self.registry.pins() {
            if let Ok(mut record) = self.registry.lock(pin).await {
                record.apply(PinUpdate::clear_revert());
            }
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Monotonic and wall-clock fire times for a revert `after` from now.
/// Delays past what either clock can represent are rejected.
pub fn deadline(pin: PinNumber, after: Duration) -> Result<(Instant, DateTime<Local>), PinError> {
    let out_of_range = || PinError::invalid(pin, format!("delay of {:?} is out of range", after));
    let fire_at = Instant::now().checked_add(after).ok_or_else(out_of_range)?;
    let fire_at_wallclock = chrono::Duration::from_std(after)
        .ok()
        .and_then(|delta| Local::now().checked_add_signed(delta))
        .ok_or_else(out_of_range)?;
    Ok((fire_at, fire_at_wallclock))
}

async fn fire(
    registry: Arc<PinRegistry>,
    driver: Arc<dyn HardwareDriver>,
    events: EventBus,
    pin: PinNumber,
    id: Uuid,
    target: PinState,
    fire_at: Instant,
) {
    tokio::time::sleep_until(fire_at).await;
    let Ok(mut record) = registry.lock(pin).await else {
        return;
    };
    if record.scheduled_revert.as_ref().map(|r| r.handle.id()) != Some(id) {
        tracing::debug!("Task {} for pin {} was cancelled before firing", id, pin);
        return;
    }
    // Cleared whatever the outcome; a failed revert is not retried.
    record.apply(PinUpdate::clear_revert());
    let mode = record.mode;
    match drive_locked(driver.as_ref(), &events, &mut record, mode, target) {
        Ok(()) => {
            tracing::info!("Successfully finished execution of the task: {} pin set to {}.", pin, target);
            events.publish(PinEvent::ScheduleFired { pin, target });
        }
        Err(e) => {
            tracing::error!("Scheduled task for pin {} failed: {}", pin, e);
            events.publish(PinEvent::ScheduleFailed { pin, target, reason: e.to_string() });
        }
    }
}

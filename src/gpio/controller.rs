// src/gpio/controller.rs - PinController facade used by the console and lifecycle
use crate::gpio::cycle::{CycleEngine, CycleKind, CycleReport, CycleState};
use crate::gpio::events::EventBus;
use crate::gpio::morse;
use crate::gpio::policy::AccessPolicy;
use crate::gpio::registry::{PinRecord, PinRegistry, PinUpdate};
use crate::gpio::scheduler::{self, Scheduler};
use crate::gpio::drive_locked;
use chrono::{DateTime, Local};
use relay_shared::config::GpioConfig;
use relay_shared::{EventSink, HardwareDriver, PinError, PinEvent, PinMode, PinNumber, PinState};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Serializable view of a pin record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinSnapshot {
    pub pin: PinNumber,
    pub mode: PinMode,
    pub state: PinState,
    pub revert_to: Option<PinState>,
    pub revert_at: Option<DateTime<Local>>,
}

impl From<&PinRecord> for PinSnapshot {
    fn from(record: &PinRecord) -> Self {
        Self {
            pin: record.pin,
            mode: record.mode,
            state: record.state,
            revert_to: record.scheduled_revert.as_ref().map(|r| r.target_state),
            revert_at: record.scheduled_revert.as_ref().map(|r| r.fire_at_wallclock),
        }
    }
}

/// Entry point for everything outside the pin core. Every mutation of a pin
/// runs authorize, write and record update under that pin's lock.
pub struct PinController {
    registry: Arc<PinRegistry>,
    driver: Arc<dyn HardwareDriver>,
    policy: Arc<AccessPolicy>,
    scheduler: Scheduler,
    cycles: CycleEngine,
    events: EventBus,
    shut_down: AtomicBool,
}

impl PinController {
    /// `driver` must already have been probed (see `hardware::select_driver`).
    pub fn new(config: &GpioConfig, driver: Arc<dyn HardwareDriver>) -> Self {
        Self::with_events(config, driver, EventBus::default())
    }

    /// Like [`PinController::new`], publishing on a bus the caller may
    /// already be subscribed to.
    pub fn with_events(config: &GpioConfig, driver: Arc<dyn HardwareDriver>, events: EventBus) -> Self {
        let registry = Arc::new(PinRegistry::new(&config.output_pins, &config.input_pins));
        let policy = Arc::new(AccessPolicy::new(registry.clone(), config));
        let scheduler = Scheduler::new(registry.clone(), driver.clone(), events.clone());
        let cycles = CycleEngine::new(registry.clone(), driver.clone(), policy.clone(), events.clone());

        if driver.is_initialized() {
            for pin in &config.input_pins {
                if let Err(e) = driver.write(*pin, PinMode::Input, PinState::Off) {
                    tracing::warn!("Failed to configure sensor pin {} as input: {}", pin, e);
                }
            }
            events.publish(PinEvent::DriverInitialized { driver: driver.name().to_string() });
        } else {
            events.publish(PinEvent::DriverUnavailable {
                driver: driver.name().to_string(),
                reason: "no usable GPIO interface, serving recorded state only".to_string(),
            });
        }
        if config.safe_mode {
            tracing::warn!(
                "Safe mode enabled. Only preconfigured gpio pins {:?} are allowed to be modified.",
                config.allowed_pins
            );
        }

        Self {
            registry,
            driver,
            policy,
            scheduler,
            cycles,
            events,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PinEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_driver_ready(&self) -> bool {
        self.driver.is_initialized()
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub fn safe_mode(&self) -> bool {
        self.policy.safe_mode()
    }

    pub fn output_pins(&self) -> &[PinNumber] {
        self.policy.output_pins()
    }

    pub async fn set_pin(&self, pin: PinNumber, mode: PinMode, state: PinState) -> Result<PinRecord, PinError> {
        self.policy.authorize(pin, true)?;
        let mut record = self.registry.lock(pin).await?;
        drive_locked(self.driver.as_ref(), &self.events, &mut record, mode, state)?;
        Ok(record.clone())
    }

    /// Sets the pin now and schedules it back to the opposite state after
    /// `after`. When the pin already has a pending revert the new state still
    /// applies, but `AlreadyScheduled` is returned and nothing is scheduled.
    pub async fn set_pin_with_delay(
        &self,
        pin: PinNumber,
        mode: PinMode,
        state: PinState,
        after: Duration,
    ) -> Result<Instant, PinError> {
        self.policy.authorize(pin, true)?;
        // An unschedulable delay must fail before the state is applied
        scheduler::deadline(pin, after)?;
        let mut record = self.registry.lock(pin).await?;
        drive_locked(self.driver.as_ref(), &self.events, &mut record, mode, state)?;
        self.scheduler.arm_locked(&mut record, state.toggled(), after)
    }

    /// Writes the pin and schedules it off after `duration`. Returns
    /// `Ok(false)` without writing when a revert is already pending.
    pub async fn write_with_timeout(
        &self,
        pin: PinNumber,
        mode: PinMode,
        state: PinState,
        duration: Duration,
    ) -> Result<bool, PinError> {
        self.policy.authorize(pin, true)?;
        scheduler::deadline(pin, duration)?;
        let mut record = self.registry.lock(pin).await?;
        if record.has_pending_revert() {
            return Ok(false);
        }
        drive_locked(self.driver.as_ref(), &self.events, &mut record, mode, state)?;
        self.scheduler.arm_locked(&mut record, PinState::Off, duration)?;
        Ok(true)
    }

    /// Flips an output pin and returns its new state.
    pub async fn toggle_pin(&self, pin: PinNumber) -> Result<PinState, PinError> {
        self.policy.authorize(pin, true)?;
        let mut record = self.registry.lock(pin).await?;
        let next = if record.is_on() { PinState::Off } else { PinState::On };
        drive_locked(self.driver.as_ref(), &self.events, &mut record, PinMode::Output, next)?;
        Ok(next)
    }

    /// Schedules a relay to move to `state` later without touching it now.
    ///
    /// The decision is made from the pin's state at call time; the timer
    /// applies `state` when it fires without looking again.
    pub async fn schedule_state(&self, pin: PinNumber, state: PinState, after: Duration) -> Result<Instant, PinError> {
        self.policy.authorize(pin, true)?;
        if !self.policy.is_output(pin) {
            return Err(PinError::invalid(pin, "not in the relay pin category"));
        }
        let mut record = self.registry.lock(pin).await?;
        if record.is_on() == state.is_on() {
            return Err(PinError::invalid(pin, format!("already {}", state)));
        }
        self.scheduler.arm_locked(&mut record, state, after)
    }

    pub async fn cancel_schedule(&self, pin: PinNumber) -> Result<bool, PinError> {
        self.policy.authorize(pin, true)?;
        self.scheduler.cancel(pin).await
    }

    pub async fn get_pin_status(&self, pin: PinNumber) -> Result<PinRecord, PinError> {
        self.policy.authorize(pin, false)?;
        self.registry.get(pin).await
    }

    pub async fn pin_statuses(&self) -> Vec<PinRecord> {
        self.registry.snapshot().await
    }

    /// Live reading from the hardware, as opposed to the recorded state.
    pub async fn read_pin(&self, pin: PinNumber) -> Result<PinState, PinError> {
        self.policy.authorize(pin, false)?;
        let _record = self.registry.lock(pin).await?;
        self.driver.read(pin)
    }

    pub async fn run_cycle(
        &self,
        kind: CycleKind,
        pins: &[PinNumber],
        single_channel: Option<PinNumber>,
    ) -> Result<CycleReport, PinError> {
        self.cycles.run(kind, pins, single_channel).await
    }

    pub async fn run_morse(&self, text: &str, pin: PinNumber) -> Result<CycleReport, PinError> {
        if !self.policy.is_output(pin) {
            return Err(PinError::invalid(pin, "not a relay output pin"));
        }
        let definition = morse::definition(text, morse::DEFAULT_UNIT)
            .ok_or_else(|| PinError::invalid(pin, "text has nothing to translate to morse"))?;
        tracing::info!("Keying '{}' on pin {}", morse::encode(text), pin);
        self.cycles.run_definitions("morse", &[definition], &[pin]).await
    }

    pub fn cycle_state(&self) -> CycleState {
        self.cycles.state()
    }

    /// Drains pending timers, then releases the hardware. Only the first
    /// call does anything.
    pub async fn shutdown_all(&self, graceful: bool) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down gpio pin controller (graceful: {})", graceful);
        self.scheduler.shutdown().await;
        let closed_pins = self.driver.shutdown(graceful);
        for pin in &closed_pins {
            if let Err(e) = self.registry.update(*pin, PinUpdate::write(PinMode::Output, PinState::Off)).await {
                tracing::warn!("Failed to record shutdown state of pin {}: {}", pin, e);
            }
        }
        self.events.publish(PinEvent::Shutdown { graceful, closed_pins });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{NullDriver, SimulatedDriver};

    fn controller() -> (PinController, Arc<SimulatedDriver>) {
        let config = GpioConfig {
            output_pins: vec![4, 17],
            input_pins: vec![26],
            ..Default::default()
        };
        let driver = Arc::new(SimulatedDriver::new());
        driver.probe();
        (PinController::new(&config, driver.clone()), driver)
    }

    #[tokio::test]
    async fn test_inputs_configured_at_startup() {
        let (_controller, driver) = controller();
        let writes = driver.history();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].pin, 26);
        assert_eq!(writes[0].mode, PinMode::Input);
    }

    #[tokio::test]
    async fn test_toggle_pin() {
        let (controller, driver) = controller();
        assert_eq!(controller.toggle_pin(4).await, Ok(PinState::On));
        assert_eq!(controller.toggle_pin(4).await, Ok(PinState::Off));
        assert_eq!(driver.history_for(4).len(), 2);
        assert_eq!(controller.toggle_pin(26).await, Err(PinError::ReservedPin { pin: 26 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_with_timeout_skips_when_pending() {
        let (controller, driver) = controller();
        let first = controller
            .write_with_timeout(4, PinMode::Output, PinState::On, Duration::from_secs(5))
            .await;
        assert_eq!(first, Ok(true));
        let second = controller
            .write_with_timeout(4, PinMode::Output, PinState::On, Duration::from_secs(50))
            .await;
        assert_eq!(second, Ok(false));
        assert_eq!(driver.history_for(4).len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(controller.get_pin_status(4).await.unwrap().state, PinState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_state_does_not_write_now() {
        let (controller, driver) = controller();
        controller.schedule_state(17, PinState::On, Duration::from_secs(3)).await.unwrap();
        assert!(driver.history_for(17).is_empty());
        assert!(matches!(
            controller.schedule_state(4, PinState::Off, Duration::from_secs(3)).await,
            Err(PinError::InvalidPin { pin: 4, .. })
        ));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(driver.level(17), Some(PinState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_schedule() {
        let (controller, driver) = controller();
        controller
            .set_pin_with_delay(4, PinMode::Output, PinState::On, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(controller.cancel_schedule(4).await, Ok(true));
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(driver.level(4), Some(PinState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_rejected_without_writing() {
        let (controller, driver) = controller();
        let huge = Duration::from_secs(u64::MAX / 2);
        assert!(matches!(
            controller.set_pin_with_delay(4, PinMode::Output, PinState::On, huge).await,
            Err(PinError::InvalidPin { pin: 4, .. })
        ));
        assert!(matches!(
            controller.write_with_timeout(4, PinMode::Output, PinState::On, huge).await,
            Err(PinError::InvalidPin { pin: 4, .. })
        ));
        assert!(matches!(
            controller
                .schedule_state(17, PinState::On, Duration::from_secs(1_000_000_000_000 * 60))
                .await,
            Err(PinError::InvalidPin { pin: 17, .. })
        ));
        assert!(driver.history_for(4).is_empty());
        let record = controller.get_pin_status(4).await.unwrap();
        assert_eq!(record.state, PinState::Off);
        assert!(!record.has_pending_revert());
        assert!(!controller.get_pin_status(17).await.unwrap().has_pending_revert());
    }

    #[tokio::test]
    async fn test_read_pin_reports_live_level() {
        let (controller, driver) = controller();
        driver.set_input_level(26, PinState::On);
        assert_eq!(controller.read_pin(26).await, Ok(PinState::On));
        assert_eq!(controller.get_pin_status(26).await.unwrap().state, PinState::Off);
    }

    #[tokio::test]
    async fn test_morse_rejects_empty_text() {
        let (controller, _driver) = controller();
        assert!(matches!(controller.run_morse("  ", 4).await, Err(PinError::InvalidPin { pin: 4, .. })));
        assert!(matches!(controller.run_morse("sos", 26).await, Err(PinError::InvalidPin { pin: 26, .. })));
    }

    #[tokio::test]
    async fn test_null_driver_keeps_serving_status() {
        let config = GpioConfig { output_pins: vec![4], ..Default::default() };
        let controller = PinController::new(&config, Arc::new(NullDriver::new("no gpio")));
        assert!(!controller.is_driver_ready());
        assert_eq!(
            controller.set_pin(4, PinMode::Output, PinState::On).await.unwrap_err(),
            PinError::DriverNotInitialized
        );
        let record = controller.get_pin_status(4).await.unwrap();
        assert_eq!(record.state, PinState::Off);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let (controller, _driver) = controller();
        controller.set_pin(4, PinMode::Output, PinState::On).await.unwrap();
        let snapshots: Vec<PinSnapshot> = controller.pin_statuses().await.iter().map(PinSnapshot::from).collect();
        let json = serde_json::to_value(&snapshots).unwrap();
        assert_eq!(json[0]["pin"], 4);
        assert_eq!(json[0]["state"], "on");
        assert!(json[0]["revert_to"].is_null());
    }
}

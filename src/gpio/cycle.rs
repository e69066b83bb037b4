// src/gpio/cycle.rs - Timed relay test sequences
use crate::gpio::events::EventBus;
use crate::gpio::policy::AccessPolicy;
use crate::gpio::registry::PinRegistry;
use crate::gpio::drive_locked;
use relay_shared::{EventSink, HardwareDriver, PinError, PinEvent, PinMode, PinNumber, PinState};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const SINGLE_HOLD: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleKind {
    Cycle,
    OneTwo,
    OneOne,
    OneMany,
    Single,
    Default,
    Base,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleKind::Cycle => "cycle",
            CycleKind::OneTwo => "one-two",
            CycleKind::OneOne => "one-one",
            CycleKind::OneMany => "one-many",
            CycleKind::Single => "single",
            CycleKind::Default => "default",
            CycleKind::Base => "base",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CycleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "cycle" => Ok(CycleKind::Cycle),
            "onetwo" => Ok(CycleKind::OneTwo),
            "oneone" => Ok(CycleKind::OneOne),
            "onemany" => Ok(CycleKind::OneMany),
            "single" => Ok(CycleKind::Single),
            "default" => Ok(CycleKind::Default),
            "base" => Ok(CycleKind::Base),
            _ => Err(format!("Unknown relay cycle '{}'", s)),
        }
    }
}

/// What happens to a single pin within an `EachPin` step.
#[derive(Debug, Clone, PartialEq)]
pub enum PinAction {
    Set(PinState),
    Wait(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleStep {
    /// Drive every pin to `state` in order, holding `per_pin` after each.
    /// Pins already in that state are not rewritten.
    Sweep { state: PinState, per_pin: Duration },
    Pause(Duration),
    /// Run the whole action script on one pin before moving to the next.
    EachPin(Vec<PinAction>),
}

/// A named, fixed-timing test pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleDefinition {
    pub name: String,
    pub steps: Vec<CycleStep>,
}

impl CycleDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<CycleStep>) -> Self {
        Self { name: name.into(), steps }
    }

    pub fn one_two() -> Self {
        use CycleStep::*;
        Self::new(
            "one-two",
            vec![
                Sweep { state: PinState::Off, per_pin: ms(30) },
                Sweep { state: PinState::On, per_pin: ms(400) },
                Pause(ms(500)),
                Sweep { state: PinState::Off, per_pin: ms(150) },
                Pause(ms(700)),
                Sweep { state: PinState::On, per_pin: ms(200) },
                Pause(ms(500)),
                Sweep { state: PinState::Off, per_pin: ms(120) },
            ],
        )
    }

    pub fn one_one() -> Self {
        Self::new(
            "one-one",
            vec![
                CycleStep::Sweep { state: PinState::Off, per_pin: ms(50) },
                CycleStep::EachPin(vec![
                    PinAction::Set(PinState::On),
                    PinAction::Wait(ms(500)),
                    PinAction::Set(PinState::Off),
                    PinAction::Wait(ms(100)),
                ]),
            ],
        )
    }

    pub fn one_many() -> Self {
        let mut actions = vec![PinAction::Set(PinState::On)];
        for _ in 0..6 {
            actions.push(PinAction::Wait(ms(200)));
            actions.push(PinAction::Set(PinState::Off));
            actions.push(PinAction::Wait(ms(500)));
            actions.push(PinAction::Set(PinState::On));
        }
        actions.push(PinAction::Set(PinState::Off));
        Self::new(
            "one-many",
            vec![
                CycleStep::Sweep { state: PinState::Off, per_pin: ms(50) },
                CycleStep::EachPin(actions),
            ],
        )
    }

    pub fn single() -> Self {
        Self::new(
            "single",
            vec![CycleStep::EachPin(vec![
                PinAction::Set(PinState::On),
                PinAction::Wait(SINGLE_HOLD),
                PinAction::Set(PinState::Off),
            ])],
        )
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running { cycle: String, step: usize },
    Completed { cycle: String, success: bool },
    Aborted { cycle: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: String,
    pub success: bool,
    /// Names of the sub-cycles that finished successfully, in order.
    pub completed: Vec<String>,
}

pub struct CycleEngine {
    registry: Arc<PinRegistry>,
    driver: Arc<dyn HardwareDriver>,
    policy: Arc<AccessPolicy>,
    events: EventBus,
    state: Mutex<CycleState>,
}

impl CycleEngine {
    pub fn new(
        registry: Arc<PinRegistry>,
        driver: Arc<dyn HardwareDriver>,
        policy: Arc<AccessPolicy>,
        events: EventBus,
    ) -> Self {
        Self { registry, driver, policy, events, state: Mutex::new(CycleState::Idle) }
    }

    pub fn state(&self) -> CycleState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Runs a named cycle over `pins`. `channel` selects the pin for `Single`;
    /// without one the first of `pins` is used.
    pub async fn run(
        &self,
        kind: CycleKind,
        pins: &[PinNumber],
        channel: Option<PinNumber>,
    ) -> Result<CycleReport, PinError> {
        let plan = match kind {
            CycleKind::OneTwo => vec![CycleDefinition::one_two()],
            CycleKind::OneOne => vec![CycleDefinition::one_one()],
            CycleKind::OneMany => vec![CycleDefinition::one_many()],
            CycleKind::Single => {
                let Some(pin) = channel.or_else(|| pins.first().copied()) else {
                    // Same outcome as any other cycle over no pins
                    return self.run_definitions(&kind.to_string(), &[CycleDefinition::single()], &[]).await;
                };
                if !self.policy.is_output(pin) {
                    return Err(PinError::invalid(pin, "not a relay output pin"));
                }
                return self.run_definitions(&kind.to_string(), &[CycleDefinition::single()], &[pin]).await;
            }
            CycleKind::Cycle | CycleKind::Default | CycleKind::Base => {
                if kind != CycleKind::Cycle {
                    tracing::info!("{} cycle requested, running the full cycle test", kind);
                }
                vec![CycleDefinition::one_two(), CycleDefinition::one_one(), CycleDefinition::one_many()]
            }
        };
        self.run_definitions(&kind.to_string(), &plan, pins).await
    }

    /// Runs definitions in order, stopping at the first that fails.
    pub async fn run_definitions(
        &self,
        name: &str,
        definitions: &[CycleDefinition],
        pins: &[PinNumber],
    ) -> Result<CycleReport, PinError> {
        let mut run = RunGuard::start(self, name)?;
        if pins.is_empty() {
            tracing::warn!("No pins specified.");
            run.finish(false);
            return Ok(CycleReport { cycle: name.to_string(), success: false, completed: Vec::new() });
        }

        tracing::info!("Relay test service started!");
        self.events.publish(PinEvent::CycleStarted { cycle: name.to_string() });
        let mut completed = Vec::new();
        for definition in definitions {
            if !self.execute(definition, pins).await {
                tracing::warn!("One or more tests failed.");
                self.events.publish(PinEvent::CycleAborted { cycle: name.to_string(), completed: completed.clone() });
                run.abort();
                return Ok(CycleReport { cycle: name.to_string(), success: false, completed });
            }
            completed.push(definition.name.clone());
        }
        tracing::info!("Relay {} test passed!", name);
        self.events.publish(PinEvent::CycleCompleted { cycle: name.to_string(), success: true });
        run.finish(true);
        Ok(CycleReport { cycle: name.to_string(), success: true, completed })
    }

    async fn execute(&self, definition: &CycleDefinition, pins: &[PinNumber]) -> bool {
        for (index, step) in definition.steps.iter().enumerate() {
            self.set_state(CycleState::Running { cycle: definition.name.clone(), step: index });
            self.events.publish(PinEvent::CycleStep { cycle: definition.name.clone(), step: index });
            match step {
                CycleStep::Sweep { state, per_pin } => {
                    for pin in pins {
                        if !self.step_pin(*pin, *state, true).await {
                            return false;
                        }
                        sleep(*per_pin).await;
                    }
                }
                CycleStep::Pause(duration) => sleep(*duration).await,
                CycleStep::EachPin(actions) => {
                    for pin in pins {
                        for action in actions {
                            match action {
                                PinAction::Set(state) => {
                                    if !self.step_pin(*pin, *state, false).await {
                                        return false;
                                    }
                                }
                                PinAction::Wait(duration) => sleep(*duration).await,
                            }
                        }
                    }
                }
            }
        }
        true
    }

    /// Writes one pin as part of a step. Returns false only when the driver
    /// is unavailable; any other failure is logged and the step moves on.
    async fn step_pin(&self, pin: PinNumber, state: PinState, skip_if_same: bool) -> bool {
        match self.drive(pin, state, skip_if_same).await {
            Ok(()) => true,
            Err(PinError::DriverNotInitialized) => {
                tracing::error!("GPIO driver is not initialized, aborting relay test");
                false
            }
            Err(e) => {
                tracing::warn!("Skipping pin {} in relay test: {}", pin, e);
                true
            }
        }
    }

    async fn drive(&self, pin: PinNumber, state: PinState, skip_if_same: bool) -> Result<(), PinError> {
        self.policy.authorize(pin, true)?;
        // Held only for this pin's write, not the whole step.
        let mut record = self.registry.lock(pin).await?;
        if skip_if_same && record.mode == PinMode::Output && record.state == state {
            return Ok(());
        }
        drive_locked(self.driver.as_ref(), &self.events, &mut record, PinMode::Output, state)
    }

    fn set_state(&self, state: CycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// Marks the engine busy for one run; a run dropped midway is recorded as aborted.
struct RunGuard<'a> {
    engine: &'a CycleEngine,
    name: String,
    done: bool,
}

impl<'a> RunGuard<'a> {
    fn start(engine: &'a CycleEngine, name: &str) -> Result<Self, PinError> {
        let mut state = engine.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, CycleState::Running { .. }) {
            return Err(PinError::CycleInProgress);
        }
        *state = CycleState::Running { cycle: name.to_string(), step: 0 };
        Ok(Self { engine, name: name.to_string(), done: false })
    }

    fn finish(&mut self, success: bool) {
        self.engine.set_state(CycleState::Completed { cycle: self.name.clone(), success });
        self.done = true;
    }

    fn abort(&mut self) {
        self.engine.set_state(CycleState::Aborted { cycle: self.name.clone() });
        self.done = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.engine.set_state(CycleState::Aborted { cycle: self.name.clone() });
        }
    }
}

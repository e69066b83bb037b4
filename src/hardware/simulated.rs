// src/hardware/simulated.rs - In-memory GPIO board for tests and --simulate runs
use relay_shared::{HardwareDriver, PinError, PinMode, PinNumber, PinState, ProbeStatus};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;

/// One physical write observed by the simulated board.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub pin: PinNumber,
    pub mode: PinMode,
    pub state: PinState,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct SimPin {
    mode: PinMode,
    state: PinState,
}

/// Simulated board. Every write is recorded with a `tokio::time::Instant`
/// so paused-clock tests can check exact timing.
#[derive(Debug)]
pub struct SimulatedDriver {
    supported: bool,
    initialized: AtomicBool,
    pins: Mutex<BTreeMap<PinNumber, SimPin>>,
    history: Mutex<Vec<Transition>>,
    failing: Mutex<HashSet<PinNumber>>,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::with_support(true)
    }

    /// A board whose probe reports the platform as unsupported.
    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            supported,
            initialized: AtomicBool::new(false),
            pins: Mutex::new(BTreeMap::new()),
            history: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Makes every subsequent write to `pin` fail with `HardwareWriteFailed`.
    pub fn fail_writes_on(&self, pin: PinNumber) {
        lock(&self.failing).insert(pin);
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Drives an input pin as an external sensor would.
    pub fn set_input_level(&self, pin: PinNumber, state: PinState) {
        let mut pins = lock(&self.pins);
        pins.insert(pin, SimPin { mode: PinMode::Input, state });
    }

    pub fn history(&self) -> Vec<Transition> {
        lock(&self.history).clone()
    }

    pub fn history_for(&self, pin: PinNumber) -> Vec<Transition> {
        lock(&self.history).iter().filter(|t| t.pin == pin).cloned().collect()
    }

    /// Current physical level, without the initialization check.
    pub fn level(&self, pin: PinNumber) -> Option<PinState> {
        lock(&self.pins).get(&pin).map(|p| p.state)
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareDriver for SimulatedDriver {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn probe(&self) -> ProbeStatus {
        if !self.supported {
            return ProbeStatus::Unsupported("simulated board reports no GPIO interface".to_string());
        }
        self.initialized.store(true, Ordering::SeqCst);
        ProbeStatus::Initialized
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn read(&self, pin: PinNumber) -> Result<PinState, PinError> {
        if !self.is_initialized() {
            return Err(PinError::DriverNotInitialized);
        }
        lock(&self.pins)
            .get(&pin)
            .map(|p| p.state)
            .ok_or_else(|| PinError::invalid(pin, "pin mode is not configured"))
    }

    fn write(&self, pin: PinNumber, mode: PinMode, state: PinState) -> Result<(), PinError> {
        if !self.is_initialized() {
            return Err(PinError::DriverNotInitialized);
        }
        if lock(&self.failing).contains(&pin) {
            return Err(PinError::write_failed(pin, "simulated write failure"));
        }
        let mut pins = lock(&self.pins);
        let entry = pins.entry(pin).or_insert(SimPin { mode, state: PinState::Off });
        entry.mode = mode;
        if mode == PinMode::Output {
            entry.state = state;
        }
        let recorded = entry.state;
        drop(pins);
        lock(&self.history).push(Transition { pin, mode, state: recorded, at: Instant::now() });
        Ok(())
    }

    fn shutdown(&self, graceful: bool) -> Vec<PinNumber> {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return Vec::new();
        }
        let mut closed = Vec::new();
        if graceful {
            let mut pins = lock(&self.pins);
            for (pin, sim) in pins.iter_mut() {
                if sim.mode == PinMode::Output && sim.state.is_on() {
                    sim.state = PinState::Off;
                    closed.push(*pin);
                }
            }
            drop(pins);
            let now = Instant::now();
            let mut history = lock(&self.history);
            for pin in &closed {
                history.push(Transition { pin: *pin, mode: PinMode::Output, state: PinState::Off, at: now });
            }
        }
        closed
    }
}

// A poisoned lock only means a test thread panicked mid-write; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

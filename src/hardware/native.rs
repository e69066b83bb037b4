// src/hardware/native.rs - Raspberry Pi GPIO through rppal
//!
//! Only compiled against real hardware with the `rpi` feature on Linux.
//! Any other build still provides `NativeGpioDriver`, but its probe reports
//! the platform as unsupported so startup falls back to the null driver.

use relay_shared::{HardwareDriver, PinError, PinMode, PinNumber, PinState, ProbeStatus};
use std::sync::Mutex;

#[cfg(all(feature = "rpi", target_os = "linux"))]
mod board {
    use relay_shared::{PinError, PinMode, PinNumber, PinState};
    use rppal::gpio::{Gpio, IoPin, Level, Mode};
    use std::collections::BTreeMap;

    /// Live hardware session plus every pin claimed through it.
    pub struct Board {
        gpio: Gpio,
        pins: BTreeMap<PinNumber, IoPin>,
        active_low: bool,
    }

    impl Board {
        pub fn open(active_low: bool) -> Result<Self, String> {
            let gpio = Gpio::new().map_err(|e| e.to_string())?;
            Ok(Self { gpio, pins: BTreeMap::new(), active_low })
        }

        fn level_for(&self, state: PinState) -> Level {
            match (state, self.active_low) {
                (PinState::On, false) | (PinState::Off, true) => Level::High,
                (PinState::Off, false) | (PinState::On, true) => Level::Low,
            }
        }

        fn state_for(&self, mode: Mode, level: Level) -> PinState {
            // Sensor inputs are read as wired; only relay outputs are inverted.
            let inverted = self.active_low && mode == Mode::Output;
            match (level, inverted) {
                (Level::High, false) | (Level::Low, true) => PinState::On,
                (Level::Low, false) | (Level::High, true) => PinState::Off,
            }
        }

        pub fn read(&self, pin: PinNumber) -> Result<PinState, PinError> {
            let io = self
                .pins
                .get(&pin)
                .ok_or_else(|| PinError::invalid(pin, "pin mode is not configured"))?;
            Ok(self.state_for(io.mode(), io.read()))
        }

        pub fn write(&mut self, pin: PinNumber, mode: PinMode, state: PinState) -> Result<(), PinError> {
            let rppal_mode = match mode {
                PinMode::Input => Mode::Input,
                PinMode::Output => Mode::Output,
            };
            let level = self.level_for(state);
            if !self.pins.contains_key(&pin) {
                let mut io = self
                    .gpio
                    .get(pin)
                    .map_err(|e| PinError::write_failed(pin, e))?
                    .into_io(rppal_mode);
                // Relays keep their position when the handle is released.
                io.set_reset_on_drop(false);
                self.pins.insert(pin, io);
            }
            let io = self
                .pins
                .get_mut(&pin)
                .ok_or_else(|| PinError::write_failed(pin, "pin handle missing"))?;
            io.set_mode(rppal_mode);
            if mode == PinMode::Output {
                io.write(level);
            }
            Ok(())
        }

        /// Drives every output that is on to off; returns those pins.
        pub fn close_outputs(&mut self) -> Vec<PinNumber> {
            let off = self.level_for(PinState::Off);
            let mut closed = Vec::new();
            let pins: Vec<PinNumber> = self.pins.keys().copied().collect();
            for pin in pins {
                let is_on = match self.pins.get(&pin) {
                    Some(io) => io.mode() == Mode::Output && self.state_for(Mode::Output, io.read()).is_on(),
                    None => false,
                };
                if is_on {
                    if let Some(io) = self.pins.get_mut(&pin) {
                        io.write(off);
                        closed.push(pin);
                    }
                }
            }
            closed
        }
    }
}

#[cfg(not(all(feature = "rpi", target_os = "linux")))]
mod board {
    use relay_shared::{PinError, PinMode, PinNumber, PinState};

    pub struct Board;

    impl Board {
        pub fn open(_active_low: bool) -> Result<Self, String> {
            Err(unsupported_reason().to_string())
        }

        pub fn read(&self, _pin: PinNumber) -> Result<PinState, PinError> {
            Err(PinError::DriverNotInitialized)
        }

        pub fn write(&mut self, _pin: PinNumber, _mode: PinMode, _state: PinState) -> Result<(), PinError> {
            Err(PinError::DriverNotInitialized)
        }

        pub fn close_outputs(&mut self) -> Vec<PinNumber> {
            Vec::new()
        }
    }

    fn unsupported_reason() -> &'static str {
        if cfg!(target_os = "linux") {
            "built without the `rpi` feature"
        } else {
            "GPIO control is only supported on Linux"
        }
    }
}

/// GPIO driver backed by the board's native interface.
pub struct NativeGpioDriver {
    active_low: bool,
    board: Mutex<Option<board::Board>>,
}

impl NativeGpioDriver {
    pub fn new(active_low: bool) -> Self {
        Self { active_low, board: Mutex::new(None) }
    }

    fn with_board<T>(
        &self,
        f: impl FnOnce(&mut board::Board) -> Result<T, PinError>,
    ) -> Result<T, PinError> {
        let mut guard = self.board.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(board) => f(board),
            None => Err(PinError::DriverNotInitialized),
        }
    }
}

impl HardwareDriver for NativeGpioDriver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn probe(&self) -> ProbeStatus {
        let mut guard = self.board.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return ProbeStatus::Initialized;
        }
        match board::Board::open(self.active_low) {
            Ok(board) => {
                *guard = Some(board);
                ProbeStatus::Initialized
            }
            Err(reason) => ProbeStatus::Unsupported(reason),
        }
    }

    fn is_initialized(&self) -> bool {
        self.board.lock().map(|b| b.is_some()).unwrap_or(false)
    }

    fn read(&self, pin: PinNumber) -> Result<PinState, PinError> {
        self.with_board(|board| board.read(pin))
    }

    fn write(&self, pin: PinNumber, mode: PinMode, state: PinState) -> Result<(), PinError> {
        self.with_board(|board| board.write(pin, mode, state))
    }

    fn shutdown(&self, graceful: bool) -> Vec<PinNumber> {
        let mut guard = self.board.lock().unwrap_or_else(|e| e.into_inner());
        let Some(mut board) = guard.take() else {
            return Vec::new();
        };
        let closed = if graceful { board.close_outputs() } else { Vec::new() };
        for pin in &closed {
            tracing::info!("Closed pin {} as part of shutdown process.", pin);
        }
        drop(board);
        closed
    }
}

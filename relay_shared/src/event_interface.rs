// relay_shared/src/event_interface.rs - Notifications for logging/push collaborators
use crate::types::{PinMode, PinNumber, PinState};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PinEvent {
    DriverInitialized { driver: String },
    DriverUnavailable { driver: String, reason: String },
    PinWritten { pin: PinNumber, mode: PinMode, state: PinState },
    ScheduleArmed { pin: PinNumber, target: PinState, fire_at: DateTime<Local> },
    ScheduleRejected { pin: PinNumber },
    ScheduleFired { pin: PinNumber, target: PinState },
    ScheduleFailed { pin: PinNumber, target: PinState, reason: String },
    ScheduleCancelled { pin: PinNumber },
    CycleStarted { cycle: String },
    CycleStep { cycle: String, step: usize },
    CycleCompleted { cycle: String, success: bool },
    CycleAborted { cycle: String, completed: Vec<String> },
    Shutdown { graceful: bool, closed_pins: Vec<PinNumber> },
}

impl fmt::Display for PinEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinEvent::DriverInitialized { driver } => write!(f, "GPIO driver '{}' initialized", driver),
            PinEvent::DriverUnavailable { driver, reason } => {
                write!(f, "GPIO driver '{}' unavailable: {}", driver, reason)
            }
            PinEvent::PinWritten { pin, mode, state } => {
                write!(f, "Configured pin {} to {} with {} mode", pin, state, mode)
            }
            PinEvent::ScheduleArmed { pin, target, fire_at } => write!(
                f,
                "Scheduled pin {} to turn {} at {}",
                pin,
                target,
                fire_at.format("%H:%M:%S")
            ),
            PinEvent::ScheduleRejected { pin } => {
                write!(f, "Pin {} already has a scheduled task, request rejected", pin)
            }
            PinEvent::ScheduleFired { pin, target } => {
                write!(f, "Finished scheduled task: pin {} set to {}", pin, target)
            }
            PinEvent::ScheduleFailed { pin, target, reason } => {
                write!(f, "Scheduled task for pin {} ({}) failed: {}", pin, target, reason)
            }
            PinEvent::ScheduleCancelled { pin } => write!(f, "Cancelled scheduled task for pin {}", pin),
            PinEvent::CycleStarted { cycle } => write!(f, "Relay test '{}' started", cycle),
            PinEvent::CycleStep { cycle, step } => write!(f, "Relay test '{}' step {}", cycle, step),
            PinEvent::CycleCompleted { cycle, success } => write!(
                f,
                "Relay test '{}' {}",
                cycle,
                if *success { "passed" } else { "failed" }
            ),
            PinEvent::CycleAborted { cycle, completed } => write!(
                f,
                "Relay test '{}' aborted after [{}]",
                cycle,
                completed.join(", ")
            ),
            PinEvent::Shutdown { graceful, closed_pins } => write!(
                f,
                "GPIO shutdown (graceful: {}), closed pins {:?}",
                graceful, closed_pins
            ),
        }
    }
}

/// Receiver of human-readable pin events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: PinEvent);
}

// src/gpio/events.rs - Broadcast bus carrying PinEvents to notification collaborators
use relay_shared::{EventSink, PinEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PinEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PinEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: PinEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

/// Forwards every event to the log as a human-readable line. Pin writes are
/// frequent during cycles and go to debug.
pub fn spawn_log_forwarder(mut rx: broadcast::Receiver<PinEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event @ PinEvent::PinWritten { .. }) | Ok(event @ PinEvent::CycleStep { .. }) => {
                    tracing::debug!("{}", event)
                }
                Ok(event @ PinEvent::ScheduleFailed { .. }) | Ok(event @ PinEvent::DriverUnavailable { .. }) => {
                    tracing::warn!("{}", event)
                }
                Ok(event) => tracing::info!("{}", event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log forwarder lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

// src/console.rs - Interactive relay console over any async line reader/writer
//!
//! Top level keys:
//!
//! - `m` prints the command menu
//! - `r` relay command menu (toggle a relay or schedule a change)
//! - `c` relay cycle menu
//! - `k` key text as morse on the first relay
//! - `s` pin status table
//! - `q` shut down
//!
//! Menus that ask for a value re-prompt at most `MAX_INPUT_ATTEMPTS` times,
//! then drop back to the top level.

use crate::error::AppError;
use crate::gpio::{CycleKind, PinController};
use relay_shared::{PinNumber, PinState};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_INPUT_ATTEMPTS: usize = 2;

const COMMAND_MENU_KEY: &str = "m";

/// What the top-level loop should do after handling a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<R, W> {
    controller: Arc<PinController>,
    reader: R,
    writer: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(controller: Arc<PinController>, reader: R, writer: W) -> Self {
        Self { controller, reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Runs until `q` or end of input.
    pub async fn run(&mut self) -> Result<(), AppError> {
        self.say(&format!("Press {} for the console command menu.", COMMAND_MENU_KEY)).await?;
        while let Some(line) = self.read_line().await? {
            if self.dispatch(line.trim()).await? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    pub async fn dispatch(&mut self, key: &str) -> Result<Flow, AppError> {
        match key {
            "" => {}
            "m" => self.command_menu().await?,
            "q" => {
                self.say("Shutting down relay controller...").await?;
                return Ok(Flow::Quit);
            }
            "s" => self.status().await?,
            "r" | "c" | "k" if !self.controller.is_driver_ready() => {
                self.say("Running on a device without GPIO support. Pin controls are disabled.")
                    .await?;
            }
            "r" => self.relay_command_menu().await?,
            "c" => self.relay_cycle_menu().await?,
            "k" => self.morse().await?,
            other => {
                self.say(&format!(
                    "Unknown command '{}'. Press {} for the command menu.",
                    other, COMMAND_MENU_KEY
                ))
                .await?
            }
        }
        Ok(Flow::Continue)
    }

    async fn command_menu(&mut self) -> Result<(), AppError> {
        self.say("------------------------- COMMAND WINDOW -------------------------").await?;
        self.say("q - Shutdown relay controller.").await?;
        if self.controller.is_driver_ready() {
            self.say("r - Display relay pin control menu.").await?;
            self.say("c - Display relay cycle control menu.").await?;
            self.say("k - Morse code generator for the specified text.").await?;
        }
        self.say("s - Display pin status.").await?;
        self.say("-------------------------------------------------------------------").await
    }

    async fn status(&mut self) -> Result<(), AppError> {
        self.say(&format!(
            "Driver: {} | safe mode: {}",
            self.controller.driver_name(),
            if self.controller.safe_mode() { "on" } else { "off" }
        ))
        .await?;
        for record in self.controller.pin_statuses().await {
            self.say(&record.to_string()).await?;
        }
        self.say(&format!("Relay test: {:?}", self.controller.cycle_state())).await
    }

    async fn relay_command_menu(&mut self) -> Result<(), AppError> {
        let relays = self.controller.output_pins().to_vec();
        self.say("-------------------- RELAY COMMAND MENU --------------------").await?;
        for (index, pin) in relays.iter().enumerate().take(8) {
            self.say(&format!("{} | Relay pin {} (gpio {})", index + 1, index + 1, pin)).await?;
        }
        self.say("9 | Schedule task for specified relay pin").await?;
        self.say("0 | Exit menu").await?;

        let Some(choice) = self.prompt::<usize>("Select an option (0 - 9):").await? else {
            return self.menu_closed().await;
        };
        match choice {
            0 => {}
            9 => self.schedule_task().await?,
            n if n <= relays.len().min(8) => {
                let pin = relays[n - 1];
                match self.controller.toggle_pin(pin).await {
                    Ok(state) => self.say(&format!("Successfully set {} pin to {}.", pin, state)).await?,
                    Err(e) => self.say(&format!("Failed to toggle pin {}: {}", pin, e)).await?,
                }
            }
            _ => self.say("No relay is configured for that option.").await?,
        }
        self.menu_closed().await
    }

    async fn schedule_task(&mut self) -> Result<(), AppError> {
        let Some(pin) = self.prompt_where::<PinNumber>("Please enter the pin you want to configure:", |p| *p > 0).await?
        else {
            return Ok(());
        };
        let Some(minutes) = self
            .prompt_where::<u64>("Please enter the delay before the task runs (in minutes):", |m| *m > 0)
            .await?
        else {
            return Ok(());
        };
        let Some(state) = self
            .prompt_where::<u8>("Please enter the status you want the task to configure: (0 = OFF, 1 = ON)", |s| {
                *s <= 1
            })
            .await?
        else {
            return Ok(());
        };
        let state = if state == 1 { PinState::On } else { PinState::Off };

        let Some(seconds) = minutes.checked_mul(60) else {
            return self.say(&format!("A delay of {} minutes is too long.", minutes)).await;
        };
        match self.controller.schedule_state(pin, state, Duration::from_secs(seconds)).await {
            Ok(_) => self.say(&format!("Successfully scheduled a task: set {} pin to {}", pin, state)).await,
            Err(e) => self.say(&format!("Could not schedule task: {}", e)).await,
        }
    }

    async fn relay_cycle_menu(&mut self) -> Result<(), AppError> {
        self.say("-------------------- MODE MENU --------------------").await?;
        self.say("1 | Relay Cycle").await?;
        self.say("2 | Relay OneMany").await?;
        self.say("3 | Relay OneOne").await?;
        self.say("4 | Relay OneTwo").await?;
        self.say("5 | Relay Single").await?;
        self.say("6 | Relay Default").await?;
        self.say("0 | Exit").await?;

        let Some(choice) = self.prompt::<u8>("Select an option (0 - 6):").await? else {
            return self.say("Relay menu closed.").await;
        };
        let kind = match choice {
            1 => CycleKind::Cycle,
            2 => CycleKind::OneMany,
            3 => CycleKind::OneOne,
            4 => CycleKind::OneTwo,
            5 => CycleKind::Single,
            6 => CycleKind::Default,
            _ => {
                self.say("Exiting from menu...").await?;
                return Ok(());
            }
        };
        let channel = if kind == CycleKind::Single {
            match self.prompt::<PinNumber>("Please select the channel (3, 4, 17, 2, 27, 10, 22, 9, etc):").await? {
                Some(pin) => Some(pin),
                None => return self.say("Relay menu closed.").await,
            }
        } else {
            None
        };

        let pins = self.controller.output_pins().to_vec();
        match self.controller.run_cycle(kind, &pins, channel).await {
            Ok(report) if report.success => self.say("Test successful!").await?,
            Ok(_) => self.say("Test Failed!").await?,
            Err(e) => self.say(&format!("Could not start relay test: {}", e)).await?,
        }
        self.say("Relay menu closed.").await
    }

    async fn morse(&mut self) -> Result<(), AppError> {
        let Some(pin) = self.controller.output_pins().first().copied() else {
            return self.say("No relay pins are configured.").await;
        };
        self.say("Enter text to convert to Morse:").await?;
        let Some(text) = self.read_line().await? else {
            return Ok(());
        };
        match self.controller.run_morse(text.trim(), pin).await {
            Ok(report) if report.success => self.say("Morse sequence finished.").await,
            Ok(_) => self.say("Morse sequence failed.").await,
            Err(e) => self.say(&format!("Could not key morse: {}", e)).await,
        }
    }

    async fn menu_closed(&mut self) -> Result<(), AppError> {
        self.say("Command menu closed.").await?;
        self.say(&format!("Press {} for the console command menu.", COMMAND_MENU_KEY)).await
    }

    async fn prompt<T: FromStr>(&mut self, question: &str) -> Result<Option<T>, AppError> {
        self.prompt_where(question, |_| true).await
    }

    /// Asks `question` until the answer parses and passes `accept`, at most
    /// `MAX_INPUT_ATTEMPTS` times. `None` means the user gave up or input ended.
    async fn prompt_where<T: FromStr>(
        &mut self,
        question: &str,
        accept: impl Fn(&T) -> bool,
    ) -> Result<Option<T>, AppError> {
        self.say(question).await?;
        for attempt in 1..=MAX_INPUT_ATTEMPTS {
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            match line.trim().parse::<T>() {
                Ok(value) if accept(&value) => return Ok(Some(value)),
                _ if attempt < MAX_INPUT_ATTEMPTS => {
                    self.say("Your input is incorrect. Please enter again.").await?;
                }
                _ => {
                    self.say(&format!(
                        "Your input is incorrect again. Press {} for menu, and start again!",
                        COMMAND_MENU_KEY
                    ))
                    .await?;
                }
            }
        }
        Ok(None)
    }

    async fn read_line(&mut self) -> Result<Option<String>, AppError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    async fn say(&mut self, text: &str) -> Result<(), AppError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{NullDriver, SimulatedDriver};
    use relay_shared::HardwareDriver;
    use relay_shared::config::GpioConfig;

    fn controller() -> (Arc<PinController>, Arc<SimulatedDriver>) {
        let config = GpioConfig { output_pins: vec![4, 17], input_pins: vec![26], ..Default::default() };
        let driver = Arc::new(SimulatedDriver::new());
        driver.probe();
        (Arc::new(PinController::new(&config, driver.clone())), driver)
    }

    async fn run_script(controller: Arc<PinController>, script: &str) -> String {
        let mut console = Console::new(controller, script.as_bytes(), Vec::new());
        console.run().await.unwrap();
        String::from_utf8(console.into_writer()).unwrap()
    }

    #[tokio::test]
    async fn test_toggle_from_relay_menu() {
        let (controller, driver) = controller();
        let output = run_script(controller, "r\n2\nq\n").await;
        assert!(output.contains("Successfully set 17 pin to ON."));
        assert_eq!(driver.level(17), Some(PinState::On));
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let (controller, driver) = controller();
        // Pin prompt gets two bad answers, the rest is treated as top-level keys
        let output = run_script(controller, "r\n9\nabc\n-1\ns\nq\n").await;
        assert!(output.contains("Your input is incorrect. Please enter again."));
        assert!(output.contains("Your input is incorrect again."));
        assert!(output.contains("Driver: simulated"));
        assert!(driver.history_for(4).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_from_relay_menu() {
        let (controller, driver) = controller();
        let output = run_script(controller.clone(), "r\n9\n4\n1\n1\nq\n").await;
        assert!(output.contains("Successfully scheduled a task: set 4 pin to ON"));
        assert!(controller.get_pin_status(4).await.unwrap().has_pending_revert());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(driver.level(4), Some(PinState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_rejects_oversized_delay() {
        let (controller, _driver) = controller();
        let script = format!("r\n9\n4\n{}\n1\nr\n9\n4\n1000000000000\n1\nq\n", u64::MAX);
        let output = run_script(controller.clone(), &script).await;
        assert!(output.contains(&format!("A delay of {} minutes is too long.", u64::MAX)));
        assert!(output.contains("Could not schedule task"));
        assert!(output.contains("out of range"));
        assert!(!controller.get_pin_status(4).await.unwrap().has_pending_revert());
    }

    #[tokio::test]
    async fn test_schedule_rejects_input_pin() {
        let (controller, _driver) = controller();
        let output = run_script(controller, "r\n9\n26\n1\n1\nq\n").await;
        assert!(output.contains("Could not schedule task"));
    }

    #[tokio::test]
    async fn test_pin_menus_disabled_without_driver() {
        let config = GpioConfig { output_pins: vec![4], ..Default::default() };
        let controller = Arc::new(PinController::new(&config, Arc::new(NullDriver::new("no gpio"))));
        let output = run_script(controller, "m\nc\nq\n").await;
        assert!(!output.contains("r - Display relay pin control menu."));
        assert!(output.contains("Pin controls are disabled."));
    }

    #[tokio::test]
    async fn test_end_of_input_stops() {
        let (controller, _driver) = controller();
        let output = run_script(controller, "s\n").await;
        assert!(output.contains("Pin  4"));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let (controller, _driver) = controller();
        let mut console = Console::new(
            controller,
            tokio::io::BufReader::new(tokio_test::io::Builder::new().build()),
            Vec::new(),
        );
        assert_eq!(console.dispatch("x").await.unwrap(), Flow::Continue);
        assert_eq!(console.dispatch("q").await.unwrap(), Flow::Quit);
        let output = String::from_utf8(console.into_writer()).unwrap();
        assert!(output.contains("Unknown command 'x'"));
    }
}

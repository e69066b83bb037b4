// src/main.rs - relay-host entrypoint: config, driver probe, console and shutdown
use clap::{Parser, Subcommand};
use relay_rs::config::{self, Config, DriverKind};
use relay_rs::console::Console;
use relay_rs::error::AppError;
use relay_rs::gpio::events::spawn_log_forwarder;
use relay_rs::gpio::{CycleKind, EventBus, PinController, PinSnapshot};
use relay_rs::{hardware, logging};
use relay_shared::PinNumber;
use std::sync::Arc;
use tokio::io::BufReader;

/// Relay board controller
#[derive(Parser, Debug)]
#[command(name = "relay-host", version, about = "Controls GPIO relays and runs timed relay tests.")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "relay.toml")]
    config: String,

    /// Force safe mode on regardless of the configuration
    #[arg(long)]
    safe: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Use the in-memory simulated board instead of real GPIO
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive console (default)
    Run,
    /// Print the pin table and exit
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Run one relay test cycle over all relay pins and exit
    Cycle {
        /// cycle, one-two, one-one, one-many, single, default or base
        name: CycleKind,
        /// Pin used by the single cycle
        #[arg(long)]
        channel: Option<PinNumber>,
    },
    /// Key text as morse code on a relay and exit
    Morse {
        text: String,
        /// Defaults to the first relay pin
        #[arg(long)]
        pin: Option<PinNumber>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            // The subscriber is not up yet, so report with the defaults
            let _ = logging::init_logging("info", cli.debug);
            tracing::error!("Failed to load config from '{}': {}", cli.config, e);
            tracing::error!("Please ensure the configuration file exists and is properly formatted");
            return Err(AppError::from(e).into());
        }
    };
    logging::init_logging(&config.logging.level, cli.debug)?;
    let config = apply_overrides(config, &cli);

    tracing::info!("Starting relay-host {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Relay pins: {:?}, sensor pins: {:?}", config.gpio.output_pins, config.gpio.input_pins);

    let events = EventBus::default();
    let forwarder = spawn_log_forwarder(events.subscribe());
    let (driver, _status) = hardware::select_driver(&config.gpio);
    let controller = Arc::new(PinController::with_events(&config.gpio, driver, events));

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_console(controller.clone()).await,
        Command::Status { json } => print_status(&controller, json).await,
        Command::Cycle { name, channel } => {
            let pins = controller.output_pins().to_vec();
            controller
                .run_cycle(name, &pins, channel)
                .await
                .map(|report| tracing::info!("Relay test {} finished (success: {})", report.cycle, report.success))
                .map_err(AppError::from)
        }
        Command::Morse { text, pin } => match pin.or_else(|| controller.output_pins().first().copied()) {
            Some(pin) => controller.run_morse(&text, pin).await.map(|_| ()).map_err(AppError::from),
            None => {
                tracing::warn!("No relay pins are configured.");
                Ok(())
            }
        },
    };

    controller.shutdown_all(config.gpio.graceful_shutdown).await;
    drop(controller);
    forwarder.abort();

    if let Err(e) = result {
        tracing::error!("relay-host stopped with an error: {}", e);
        return Err(e.into());
    }
    tracing::info!("relay-host stopped");
    Ok(())
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if cli.safe {
        config.gpio.safe_mode = true;
    }
    if cli.simulate {
        config.gpio.driver = DriverKind::Simulated;
    }
    config
}

async fn run_console(controller: Arc<PinController>) -> Result<(), AppError> {
    let mut console = Console::new(controller, BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    tokio::select! {
        result = console.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}

async fn print_status(controller: &PinController, json: bool) -> Result<(), AppError> {
    let records = controller.pin_statuses().await;
    if json {
        let snapshots: Vec<PinSnapshot> = records.iter().map(PinSnapshot::from).collect();
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
    } else {
        println!("Driver: {} (ready: {})", controller.driver_name(), controller.is_driver_ready());
        for record in records {
            println!("{}", record);
        }
    }
    Ok(())
}

// src/lib.rs - Relay controller library: hardware backends, pin control core, console
pub mod console;
pub mod error;
pub mod gpio;
pub mod hardware;
pub mod logging;

pub use relay_shared;
pub use relay_shared::config;

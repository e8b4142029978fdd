//! `relayctl`: console front-end, device emulator and port listing.
//!
//! The binary in `main.rs` is a thin shell over the pieces here so they
//! can be tested without a terminal or a serial port.

pub mod config;
pub mod console;
pub mod emulate;
pub mod error;
pub mod logging;

pub use config::RunnerConfig;
pub use console::{Console, ConsoleCommand, RelayDriver};
pub use error::RunnerError;

//! Relay controller firmware core.
//!
//! This is the device half of the relaybank protocol. It owns a bank of
//! relay outputs, reads command lines from a serial console, applies them in
//! arrival order, and answers every line with a reply.
//!
//! The crate is `no_std` with `alloc`. The controller is generic over
//! [`embedded_hal::digital::OutputPin`], [`embedded_hal::delay::DelayNs`]
//! and [`SerialIo`], so the same code drives a board HAL or the host-side
//! emulator. The `std` feature (on by default) adds the [`sim`]
//! peripherals, the [`IoSerial`] adapter and metrics.
//!
//! # Example
//!
//! ```rust
//! use relaybank_firmware::{RelayBank, RelayController, RelayTable};
//! use relaybank_firmware::sim::{MemorySerial, SimPin};
//!
//! let table = RelayTable::default();
//! let bank = RelayBank::new(&table, SimPin::new).unwrap();
//! let mut controller = RelayController::new(bank, MemorySerial::new());
//!
//! controller.serial_mut().feed(b"GP10ON\r");
//! controller.poll().unwrap();
//! assert_eq!(controller.serial_mut().take_output(), b"GP10 is now ON\r\n");
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

mod bank;
mod config;
mod controller;
mod error;
mod serial;
#[cfg(feature = "std")]
pub mod sim;

pub use bank::RelayBank;
pub use config::{ChannelConfig, RelayTable};
pub use controller::{ControllerStats, RelayController, POLL_INTERVAL_MS};
pub use error::{ConfigError, RelayError};
#[cfg(feature = "std")]
pub use serial::IoSerial;
pub use serial::SerialIo;

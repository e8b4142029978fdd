//! Relay bank serial protocol
//!
//! This crate provides the types and codec for the line-based text protocol
//! spoken between a host and a microcontroller driving a bank of relays.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → device): ASCII text terminated with `\r`
//! - **Replies** (device → host): ASCII text terminated with `\r\n`
//!
//! There are exactly two commands:
//!
//! - `PING` - liveness check, answered with any non-empty line (`PONG`)
//! - `GPxxON` / `GPxxOFF` - set the relay on channel `xx`
//!
//! Pin identifiers are always four characters (`GP` plus two digits) so the
//! device can split a line at a fixed offset without any tokenizer.
//!
//! # Example
//!
//! ```rust
//! use relaybank_protocol::{Command, PinId, PinSet, RelayState};
//!
//! let pins = PinSet::default();
//! let pin = PinId::new(10).unwrap();
//!
//! let cmd = Command::set_relay(pin, RelayState::On);
//! assert_eq!(cmd.encode(), b"GP10ON\r");
//!
//! let decoded = Command::decode(b"GP10ON\r", &pins)?;
//! assert_eq!(decoded, cmd);
//! # Ok::<(), relaybank_protocol::ProtocolError>(())
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod codec;
mod commands;
mod error;
mod pin;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use pin::*;
pub use responses::*;

/// Fixed baud rate of the relay controller's serial console.
pub const PROTOCOL_BAUD_RATE: u32 = 9600;

//! Error types for the relay controller.

use relaybank_protocol::PinId;
use thiserror::Error;

/// Invalid relay table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The same pin is listed twice.
    #[error("pin {0} is configured more than once")]
    DuplicatePin(PinId),

    /// A mirror line is also used as a relay or mirrors itself.
    #[error("mirror {mirror} of {pin} is already in use")]
    MirrorConflict {
        /// The primary channel.
        pin: PinId,
        /// The conflicting mirror line.
        mirror: PinId,
    },

    /// No channels configured.
    #[error("relay table has no channels")]
    Empty,
}

/// Errors raised while driving relay outputs.
#[derive(Error, Debug)]
pub enum RelayError<E: core::fmt::Debug> {
    /// The relay table is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The pin is not part of the bank.
    #[error("unknown pin {0}")]
    UnknownPin(PinId),

    /// The output line refused the new level.
    #[error("failed to drive {pin}: {error:?}")]
    Output {
        /// The line that failed.
        pin: PinId,
        /// The HAL error.
        error: E,
    },
}

//! Protocol error types.

use alloc::string::String;
use thiserror::Error;

/// Errors that can occur when decoding protocol lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line is not a valid command.
    #[error("malformed command: {0}")]
    Malformed(String),

    /// GPIO number does not fit the two-digit pin identifier.
    #[error("GPIO {0} is out of range (max {max})", max = crate::MAX_GPIO)]
    PinOutOfRange(u8),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

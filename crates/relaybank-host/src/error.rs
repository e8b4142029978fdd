//! Error types for the host side.

use std::io;
use std::path::PathBuf;

use relaybank_protocol::PinId;
use thiserror::Error;

/// Errors from device discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// No candidate port answered the ping.
    #[error("no relay controller found")]
    NoDeviceFound,

    /// The OS port list could not be read.
    #[error("failed to enumerate serial ports: {0}")]
    Enumeration(#[source] io::Error),
}

/// Errors from sending a command.
///
/// Any error means the command is not guaranteed delivered.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Serial I/O failed. The connection has been dropped.
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    /// No device is connected.
    #[error("not connected")]
    NotConnected,

    /// The pin is not one of the configured relay channels.
    #[error("unknown pin {0}")]
    UnknownPin(PinId),
}

impl TransportError {
    /// Short label used in metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TransportError::Io(_) => "io",
            TransportError::NotConnected => "not_connected",
            TransportError::UnknownPin(_) => "unknown_pin",
        }
    }
}

/// Errors reading or writing the notes file.
#[derive(Error, Debug)]
pub enum NotesError {
    /// File I/O failed.
    #[error("notes file {}: {source}", .path.display())]
    Io {
        /// The notes file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

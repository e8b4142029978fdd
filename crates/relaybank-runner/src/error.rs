//! Errors surfaced by `relayctl`.

use std::path::PathBuf;

use relaybank_host::NotesError;
use thiserror::Error;

/// Errors that stop `relayctl` at startup.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Notes(#[from] NotesError),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("relay controller error: {0}")]
    Device(String),

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

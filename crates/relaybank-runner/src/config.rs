//! YAML configuration for `relayctl`.
//!
//! Every field is optional; a missing file section falls back to the
//! defaults of the reference board (GP10-GP13, 9600 baud, 2 s heartbeat).
//!
//! ```yaml
//! heartbeat_interval_ms: 2000
//! retry_interval_ms: 2000
//! discovery:
//!   read_timeout_ms: 1000
//!   settle_delay_ms: 2000
//!   expected_reply: PONG
//! pins: [10, 11, 12, 13]
//! notes_path: notes.conf
//! device:
//!   invert_outputs: false
//!   channels:
//!     - pin: 10
//!       mirror: 25
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relaybank_firmware::RelayTable;
use relaybank_host::{DiscoveryConfig, SupervisorConfig};
use relaybank_protocol::{PinSet, PROTOCOL_BAUD_RATE};
use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// Default notes file, next to the working directory.
pub const DEFAULT_NOTES_PATH: &str = "notes.conf";

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_PATH: &str = "relayctl.yaml";

/// Discovery section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySection {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub expected_reply: Option<String>,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        DiscoverySection {
            baud_rate: PROTOCOL_BAUD_RATE,
            read_timeout_ms: 1000,
            settle_delay_ms: 2000,
            expected_reply: None,
        }
    }
}

/// The whole config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Heartbeat period while connected.
    pub heartbeat_interval_ms: u64,
    /// Discovery retry period while disconnected.
    pub retry_interval_ms: u64,
    /// Port probing.
    pub discovery: DiscoverySection,
    /// Relay channels the host may drive.
    pub pins: PinSet,
    /// Where per-channel notes are kept.
    pub notes_path: PathBuf,
    /// Serve Prometheus metrics here (needs the `prometheus` feature).
    pub metrics_listen: Option<SocketAddr>,
    /// Relay table used by `relayctl emulate`.
    pub device: RelayTable,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            heartbeat_interval_ms: 2000,
            retry_interval_ms: 2000,
            discovery: DiscoverySection::default(),
            pins: PinSet::default(),
            notes_path: PathBuf::from(DEFAULT_NOTES_PATH),
            metrics_listen: None,
            device: RelayTable::default(),
        }
    }
}

impl RunnerConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text).map_err(|source| RunnerError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `path`, or `relayctl.yaml` if present, or the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, RunnerError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(Path::new(DEFAULT_CONFIG_PATH)),
            None => Ok(Self::default()),
        }
    }

    /// Parse YAML without validating.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.pins.is_empty() {
            return Err(RunnerError::InvalidConfig("pins must not be empty".to_string()));
        }
        if self.heartbeat_interval_ms == 0 || self.retry_interval_ms == 0 {
            return Err(RunnerError::InvalidConfig(
                "heartbeat and retry intervals must be positive".to_string(),
            ));
        }
        if self.discovery.baud_rate == 0 {
            return Err(RunnerError::InvalidConfig("baud_rate must be positive".to_string()));
        }
        self.device
            .validate()
            .map_err(|e| RunnerError::InvalidConfig(format!("device: {}", e)))
    }

    /// Supervisor parameters.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            discovery: DiscoveryConfig {
                baud_rate: self.discovery.baud_rate,
                read_timeout: Duration::from_millis(self.discovery.read_timeout_ms),
                settle_delay: Duration::from_millis(self.discovery.settle_delay_ms),
                expected_reply: self.discovery.expected_reply.clone(),
            },
            pins: self.pins.clone(),
        }
    }
}

//! Relay table: which pins are relays and which lines mirror them.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use relaybank_protocol::{PinId, PinSet, DEFAULT_GPIOS};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// The relay output, addressed by commands.
    pub pin: PinId,
    /// Optional indicator line that follows the relay.
    #[serde(default)]
    pub mirror: Option<PinId>,
}

impl ChannelConfig {
    /// A channel without a mirror line.
    pub fn new(pin: PinId) -> Self {
        ChannelConfig { pin, mirror: None }
    }

    /// Add a mirror line.
    pub fn with_mirror(mut self, mirror: PinId) -> Self {
        self.mirror = Some(mirror);
        self
    }
}

/// Pin-to-output configuration handed to the controller at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTable {
    /// Drive outputs low for ON (active-low relay boards).
    #[serde(default)]
    pub invert_outputs: bool,
    /// Relay channels.
    pub channels: Vec<ChannelConfig>,
}

impl Default for RelayTable {
    fn default() -> Self {
        RelayTable {
            invert_outputs: false,
            channels: DEFAULT_GPIOS
                .iter()
                .filter_map(|&gpio| PinId::new(gpio))
                .map(ChannelConfig::new)
                .collect(),
        }
    }
}

impl RelayTable {
    /// The pins commands may address.
    pub fn pins(&self) -> PinSet {
        self.channels.iter().map(|c| c.pin).collect()
    }

    /// Check that every output line is used exactly once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut primaries = BTreeSet::new();
        for channel in &self.channels {
            if !primaries.insert(channel.pin) {
                return Err(ConfigError::DuplicatePin(channel.pin));
            }
        }

        let mut mirrors = BTreeSet::new();
        for channel in &self.channels {
            if let Some(mirror) = channel.mirror {
                if primaries.contains(&mirror) || !mirrors.insert(mirror) {
                    return Err(ConfigError::MirrorConflict {
                        pin: channel.pin,
                        mirror,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(gpio: u8) -> PinId {
        PinId::new(gpio).unwrap()
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = RelayTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.pins(), PinSet::default());
    }

    #[test]
    fn test_duplicate_pin_rejected() {
        let table = RelayTable {
            invert_outputs: false,
            channels: vec![ChannelConfig::new(pin(10)), ChannelConfig::new(pin(10))],
        };
        assert_eq!(table.validate(), Err(ConfigError::DuplicatePin(pin(10))));
    }

    #[test]
    fn test_mirror_conflicts_rejected() {
        let onto_primary = RelayTable {
            invert_outputs: false,
            channels: vec![
                ChannelConfig::new(pin(10)).with_mirror(pin(11)),
                ChannelConfig::new(pin(11)),
            ],
        };
        assert!(matches!(
            onto_primary.validate(),
            Err(ConfigError::MirrorConflict { .. })
        ));

        let shared = RelayTable {
            invert_outputs: false,
            channels: vec![
                ChannelConfig::new(pin(10)).with_mirror(pin(20)),
                ChannelConfig::new(pin(11)).with_mirror(pin(20)),
            ],
        };
        assert_eq!(
            shared.validate(),
            Err(ConfigError::MirrorConflict { pin: pin(11), mirror: pin(20) })
        );
    }

    #[test]
    fn test_empty_table_rejected() {
        let table = RelayTable { invert_outputs: false, channels: Vec::new() };
        assert_eq!(table.validate(), Err(ConfigError::Empty));
    }
}

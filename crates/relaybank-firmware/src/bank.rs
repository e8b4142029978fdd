//! The relay bank: one output line per channel plus optional mirrors.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use embedded_hal::digital::{OutputPin, PinState};
use relaybank_protocol::{PinId, PinSet, RelayState};

use crate::config::RelayTable;
use crate::error::RelayError;

struct Channel<P> {
    output: P,
    mirror: Option<(PinId, P)>,
    state: RelayState,
}

/// Owns every relay output and remembers the last applied state.
///
/// All channels start OFF. Applying a command drives the primary line and
/// then its mirror before returning, so no caller ever observes a channel
/// whose mirror disagrees with it.
pub struct RelayBank<P: OutputPin> {
    channels: BTreeMap<PinId, Channel<P>>,
    pins: PinSet,
    invert_outputs: bool,
}

impl<P: OutputPin> RelayBank<P> {
    /// Build a bank from a relay table.
    ///
    /// `claim` is called once per output line (relays and mirrors) and must
    /// return that line configured as an output.
    pub fn new<F>(table: &RelayTable, mut claim: F) -> Result<Self, RelayError<P::Error>>
    where
        F: FnMut(PinId) -> P,
    {
        table.validate()?;

        let mut bank = RelayBank {
            channels: BTreeMap::new(),
            pins: table.pins(),
            invert_outputs: table.invert_outputs,
        };

        for config in &table.channels {
            let channel = Channel {
                output: claim(config.pin),
                mirror: config.mirror.map(|mirror| (mirror, claim(mirror))),
                state: RelayState::Off,
            };
            bank.channels.insert(config.pin, channel);
        }

        let pins: Vec<PinId> = bank.pins.iter().collect();
        for pin in pins {
            bank.drive(pin, RelayState::Off)?;
        }

        log::info!(
            "relay bank ready: {} channels, invert_outputs={}",
            bank.channels.len(),
            bank.invert_outputs
        );
        Ok(bank)
    }

    /// The pins commands may address.
    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    /// Last applied state of a channel.
    pub fn state(&self, pin: PinId) -> Option<RelayState> {
        self.channels.get(&pin).map(|c| c.state)
    }

    /// Every channel with its last applied state, in pin order.
    pub fn states(&self) -> impl Iterator<Item = (PinId, RelayState)> + '_ {
        self.channels.iter().map(|(pin, c)| (*pin, c.state))
    }

    /// Apply a state to a channel. Applying the current state again is a no-op
    /// on the bank's state but still rewrites the output level.
    pub fn set(&mut self, pin: PinId, state: RelayState) -> Result<(), RelayError<P::Error>> {
        self.drive(pin, state)
    }

    fn drive(&mut self, pin: PinId, state: RelayState) -> Result<(), RelayError<P::Error>> {
        let level = PinState::from(state.is_on() != self.invert_outputs);
        let channel = self
            .channels
            .get_mut(&pin)
            .ok_or(RelayError::UnknownPin(pin))?;

        channel
            .output
            .set_state(level)
            .map_err(|error| RelayError::Output { pin, error })?;
        channel.state = state;

        if let Some((mirror, output)) = channel.mirror.as_mut() {
            let mirror = *mirror;
            output
                .set_state(level)
                .map_err(|error| RelayError::Output { pin: mirror, error })?;
        }

        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::sim::SimPin;

    fn pin(gpio: u8) -> PinId {
        PinId::new(gpio).unwrap()
    }

    /// Builds a bank and keeps a clone of every claimed line for inspection.
    fn bank_with_lines(table: &RelayTable) -> (RelayBank<SimPin>, BTreeMap<PinId, SimPin>) {
        let mut lines = BTreeMap::new();
        let bank = RelayBank::new(table, |id| {
            let line = SimPin::new(id);
            lines.insert(id, line.clone());
            line
        })
        .unwrap();
        (bank, lines)
    }

    #[test]
    fn test_all_channels_start_off() {
        let (bank, lines) = bank_with_lines(&RelayTable::default());
        assert_eq!(bank.states().count(), 4);
        assert!(bank.states().all(|(_, s)| s == RelayState::Off));
        assert!(lines.values().all(|l| !l.is_high()));
    }

    #[test]
    fn test_set_drives_output() {
        let (mut bank, lines) = bank_with_lines(&RelayTable::default());
        bank.set(pin(12), RelayState::On).unwrap();

        assert_eq!(bank.state(pin(12)), Some(RelayState::On));
        assert!(lines[&pin(12)].is_high());
        assert!(!lines[&pin(11)].is_high());
    }

    #[test]
    fn test_set_is_idempotent() {
        let (mut bank, lines) = bank_with_lines(&RelayTable::default());
        bank.set(pin(10), RelayState::On).unwrap();
        bank.set(pin(10), RelayState::On).unwrap();

        assert_eq!(bank.state(pin(10)), Some(RelayState::On));
        assert!(lines[&pin(10)].is_high());
    }

    #[test]
    fn test_unknown_pin() {
        let (mut bank, _) = bank_with_lines(&RelayTable::default());
        assert!(matches!(
            bank.set(pin(20), RelayState::On),
            Err(RelayError::UnknownPin(p)) if p == pin(20)
        ));
    }

    #[test]
    fn test_mirror_follows_primary() {
        let table = RelayTable {
            invert_outputs: false,
            channels: vec![ChannelConfig::new(pin(10)).with_mirror(pin(25))],
        };
        let (mut bank, lines) = bank_with_lines(&table);

        bank.set(pin(10), RelayState::On).unwrap();
        assert!(lines[&pin(10)].is_high());
        assert!(lines[&pin(25)].is_high());

        bank.set(pin(10), RelayState::Off).unwrap();
        assert!(!lines[&pin(25)].is_high());

        // Mirrors are not addressable on their own.
        assert!(bank.set(pin(25), RelayState::On).is_err());
    }

    #[test]
    fn test_inverted_outputs() {
        let table = RelayTable { invert_outputs: true, ..RelayTable::default() };
        let (mut bank, lines) = bank_with_lines(&table);

        assert!(lines.values().all(|l| l.is_high()));

        bank.set(pin(11), RelayState::On).unwrap();
        assert!(!lines[&pin(11)].is_high());
        assert_eq!(bank.state(pin(11)), Some(RelayState::On));
    }

    #[test]
    fn test_invalid_table_rejected() {
        let table = RelayTable { invert_outputs: false, channels: Vec::new() };
        assert!(matches!(
            RelayBank::new(&table, SimPin::new),
            Err(RelayError::Config(_))
        ));
    }
}

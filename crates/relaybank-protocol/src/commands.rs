//! Commands sent from the host to the relay controller.
//!
//! The wire form of each command is a single line:
//! - `PING` - liveness check
//! - `<pin><ON|OFF>` - set a relay, e.g. `GP10ON`

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::codec::LineCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::pin::{PinId, PinSet, RelayState, PIN_ID_LEN};

/// The liveness check token.
pub const PING: &str = "PING";

/// Commands understood by the relay controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Liveness check. The device answers with any non-empty line.
    Ping,

    /// Drive one relay channel.
    SetRelay {
        /// The channel to drive.
        pin: PinId,
        /// The state to apply.
        state: RelayState,
    },
}

impl Command {
    /// Create a `SetRelay` command.
    pub fn set_relay(pin: PinId, state: RelayState) -> Self {
        Command::SetRelay { pin, state }
    }

    /// Get the command text (without the line terminator).
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Ping => PING.to_string(),
            Command::SetRelay { pin, state } => format!("{}{}", pin, state),
        }
    }

    /// Encode the command for transmission, including the `\r` terminator.
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.to_command_string())
    }

    /// Decode a raw line received from the serial input.
    ///
    /// Surrounding whitespace and line terminators are ignored.
    pub fn decode(line: &[u8], pins: &PinSet) -> ProtocolResult<Command> {
        let text = core::str::from_utf8(line)
            .map_err(|_| ProtocolError::Malformed("line is not valid ASCII".to_string()))?;
        Self::parse(text, pins)
    }

    /// Parse a command line.
    ///
    /// The line is split at a fixed offset into a pin identifier and a state
    /// suffix. The identifier must belong to `pins`.
    pub fn parse(line: &str, pins: &PinSet) -> ProtocolResult<Command> {
        let line = line.trim();

        if line.is_empty() {
            return Err(ProtocolError::Malformed("empty line".to_string()));
        }

        if line == PING {
            return Ok(Command::Ping);
        }

        if line.len() <= PIN_ID_LEN || !line.is_char_boundary(PIN_ID_LEN) {
            return Err(ProtocolError::Malformed(format!("truncated command '{}'", line)));
        }

        let (label, suffix) = line.split_at(PIN_ID_LEN);

        let pin = pins
            .lookup(label)
            .ok_or_else(|| ProtocolError::Malformed(format!("unknown pin '{}'", label)))?;

        let state = RelayState::from_token(suffix)
            .ok_or_else(|| ProtocolError::Malformed(format!("invalid state '{}'", suffix)))?;

        Ok(Command::SetRelay { pin, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(gpio: u8) -> PinId {
        PinId::new(gpio).unwrap()
    }

    #[test]
    fn test_encode_ping() {
        assert_eq!(Command::Ping.encode(), b"PING\r");
    }

    #[test]
    fn test_encode_set_relay() {
        assert_eq!(Command::set_relay(pin(3), RelayState::On).encode(), b"GP03ON\r");
        assert_eq!(Command::set_relay(pin(13), RelayState::Off).encode(), b"GP13OFF\r");
    }

    #[test]
    fn test_round_trip_every_pin_and_state() {
        let pins = PinSet::new((0..=99).filter_map(PinId::new));
        for p in pins.iter() {
            for state in [RelayState::On, RelayState::Off] {
                let cmd = Command::set_relay(p, state);
                assert_eq!(Command::decode(&cmd.encode(), &pins), Ok(cmd));
            }
        }
        assert_eq!(Command::decode(&Command::Ping.encode(), &pins), Ok(Command::Ping));
    }

    #[test]
    fn test_decode_accepts_surrounding_whitespace() {
        let pins = PinSet::default();
        assert_eq!(
            Command::decode(b"  GP10OFF\r\n", &pins),
            Ok(Command::set_relay(pin(10), RelayState::Off))
        );
    }

    #[test]
    fn test_decode_rejects_malformed_lines() {
        let pins = PinSet::default();
        let bad: &[&[u8]] = &[
            b"",
            b"\r",
            b"GP1",
            b"GP10",
            b"GP10O",
            b"GP10ONN",
            b"GP10on",
            b"GP10 ON",
            b"GP09ON",
            b"GP99OFF",
            b"XX10ON",
            b"PINGON",
            b"ping",
            b"\xff\xfeON",
            "GP1\u{e9}ON".as_bytes(),
        ];
        for line in bad {
            assert!(
                matches!(Command::decode(line, &pins), Err(ProtocolError::Malformed(_))),
                "expected {:?} to be rejected",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn test_decode_rejects_pin_outside_configured_set() {
        let pins = PinSet::new([pin(3)]);
        assert!(Command::parse("GP03ON", &pins).is_ok());
        assert!(Command::parse("GP10ON", &pins).is_err());
    }
}

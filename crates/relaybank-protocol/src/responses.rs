//! Replies sent by the relay controller.
//!
//! Reply content is not part of the liveness contract: the host only
//! requires a reply to be non-empty. Parsing exists so replies can be logged
//! meaningfully.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::codec::LineCodec;
use crate::pin::{PinId, RelayState};

/// Reply to `PING`.
pub const PONG: &str = "PONG";

/// Diagnostic emitted for a line that does not decode.
pub const INVALID_COMMAND_REPLY: &str = "Invalid command. Use format 'GPxxON' or 'GPxxOFF'.";

const ACK_SEPARATOR: &str = " is now ";

/// Parsed reply line from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer to a ping.
    Pong,

    /// A relay was applied.
    Ack {
        /// The channel that changed.
        pin: PinId,
        /// Its new state.
        state: RelayState,
    },

    /// The device rejected a line.
    Invalid(String),

    /// Anything else the device printed.
    Other(String),
}

impl Response {
    /// Create an acknowledgement.
    pub fn ack(pin: PinId, state: RelayState) -> Self {
        Response::Ack { pin, state }
    }

    /// Classify a reply line. Never fails: unknown text becomes [`Response::Other`].
    pub fn parse(text: &str) -> Response {
        let text = text.trim();

        if text == PONG {
            return Response::Pong;
        }

        if text.starts_with("Invalid command") || text.starts_with("Error") {
            return Response::Invalid(text.to_string());
        }

        if let Some(response) = Self::try_parse_ack(text) {
            return response;
        }

        Response::Other(text.to_string())
    }

    /// Try to parse `GP10 is now ON`.
    fn try_parse_ack(text: &str) -> Option<Response> {
        let (label, state) = text.split_once(ACK_SEPARATOR)?;
        let pin = PinId::parse_label(label)?;
        let state = RelayState::from_token(state)?;
        Some(Response::Ack { pin, state })
    }

    /// Get the reply text (without the line terminator).
    pub fn to_line(&self) -> String {
        match self {
            Response::Pong => PONG.to_string(),
            Response::Ack { pin, state } => format!("{}{}{}", pin, ACK_SEPARATOR, state),
            Response::Invalid(text) | Response::Other(text) => text.clone(),
        }
    }

    /// Encode the reply for transmission, including the `\r\n` terminator.
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_reply(&self.to_line())
    }
}

//! Pin identifiers, pin sets, and relay states.
//!
//! A pin is named on the wire by its GPIO number: `GP` followed by exactly
//! two digits. The fixed width is what lets a command be split into
//! identifier and state without a separator.

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use core::fmt;

use crate::error::ProtocolError;

/// Prefix shared by every pin identifier.
pub const PIN_PREFIX: &str = "GP";

/// Length of a pin identifier on the wire (`GP` + two digits).
pub const PIN_ID_LEN: usize = 4;

/// Largest GPIO number representable by a two-digit identifier.
pub const MAX_GPIO: u8 = 99;

/// Channels driven by the reference relay board (GP10 to GP13).
pub const DEFAULT_GPIOS: [u8; 4] = [10, 11, 12, 13];

// ============================================================================
// PinId
// ============================================================================

/// Logical identifier of one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct PinId(u8);

impl PinId {
    /// Create a pin id from a GPIO number.
    ///
    /// Returns `None` if the number needs more than two digits.
    pub const fn new(gpio: u8) -> Option<PinId> {
        if gpio <= MAX_GPIO {
            Some(PinId(gpio))
        } else {
            None
        }
    }

    /// The GPIO number.
    pub const fn gpio(&self) -> u8 {
        self.0
    }

    /// Parse the wire form of a pin identifier (`GP10`).
    ///
    /// This only checks the shape of the label, not membership in a
    /// [`PinSet`].
    pub fn parse_label(label: &str) -> Option<PinId> {
        let digits = label.strip_prefix(PIN_PREFIX)?;
        if digits.len() != PIN_ID_LEN - PIN_PREFIX.len()
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        digits.parse().ok().and_then(PinId::new)
    }

    /// The canonical wire label (`GP03`, `GP10`).
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", PIN_PREFIX, self.0)
    }
}

impl TryFrom<u8> for PinId {
    type Error = ProtocolError;

    fn try_from(gpio: u8) -> Result<Self, Self::Error> {
        PinId::new(gpio).ok_or(ProtocolError::PinOutOfRange(gpio))
    }
}

impl From<PinId> for u8 {
    fn from(pin: PinId) -> u8 {
        pin.0
    }
}

// ============================================================================
// PinSet
// ============================================================================

/// The fixed set of channels a device accepts.
///
/// Iteration is in ascending GPIO order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PinSet(BTreeSet<PinId>);

impl PinSet {
    /// Create a pin set from any collection of pins.
    pub fn new<I>(pins: I) -> Self
    where
        I: IntoIterator<Item = PinId>,
    {
        PinSet(pins.into_iter().collect())
    }

    /// Check whether a pin belongs to the set.
    pub fn contains(&self, pin: PinId) -> bool {
        self.0.contains(&pin)
    }

    /// Resolve a wire label to a pin of this set.
    pub fn lookup(&self, label: &str) -> Option<PinId> {
        PinId::parse_label(label).filter(|pin| self.contains(*pin))
    }

    /// Iterate the pins in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PinId> + '_ {
        self.0.iter().copied()
    }

    /// Number of pins in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PinSet {
    fn default() -> Self {
        DEFAULT_GPIOS.iter().filter_map(|&gpio| PinId::new(gpio)).collect()
    }
}

impl FromIterator<PinId> for PinSet {
    fn from_iter<I: IntoIterator<Item = PinId>>(iter: I) -> Self {
        PinSet::new(iter)
    }
}

// ============================================================================
// RelayState
// ============================================================================

/// State of one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelayState {
    /// Relay energized.
    On,
    /// Relay released.
    #[default]
    Off,
}

impl RelayState {
    /// Get the token used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::On => "ON",
            RelayState::Off => "OFF",
        }
    }

    /// Parse a wire token. Exact, case-sensitive match.
    pub fn from_token(s: &str) -> Option<RelayState> {
        match s {
            "ON" => Some(RelayState::On),
            "OFF" => Some(RelayState::Off),
            _ => None,
        }
    }

    /// Whether the relay is energized.
    pub fn is_on(&self) -> bool {
        matches!(self, RelayState::On)
    }

    /// The opposite state.
    pub fn toggled(&self) -> RelayState {
        match self {
            RelayState::On => RelayState::Off,
            RelayState::Off => RelayState::On,
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on {
            RelayState::On
        } else {
            RelayState::Off
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_is_zero_padded() {
        assert_eq!(PinId::new(3).unwrap().label(), "GP03");
        assert_eq!(PinId::new(10).unwrap().label(), "GP10");
        assert_eq!(PinId::new(3).unwrap().label().len(), PIN_ID_LEN);
    }

    #[test]
    fn test_gpio_out_of_range() {
        assert!(PinId::new(100).is_none());
        assert_eq!(PinId::try_from(120), Err(ProtocolError::PinOutOfRange(120)));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(PinId::parse_label("GP12"), PinId::new(12));
        assert_eq!(PinId::parse_label("GP1"), None);
        assert_eq!(PinId::parse_label("GP123"), None);
        assert_eq!(PinId::parse_label("gp12"), None);
        assert_eq!(PinId::parse_label("GP+1"), None);
    }

    #[test]
    fn test_default_set_is_reference_board() {
        let pins = PinSet::default();
        let gpios: Vec<u8> = pins.iter().map(|p| p.gpio()).collect();
        assert_eq!(gpios, vec![10, 11, 12, 13]);
        assert!(pins.lookup("GP11").is_some());
        assert!(pins.lookup("GP09").is_none());
    }

    #[test]
    fn test_relay_state_tokens() {
        assert_eq!(RelayState::from_token("ON"), Some(RelayState::On));
        assert_eq!(RelayState::from_token("OFF"), Some(RelayState::Off));
        assert_eq!(RelayState::from_token("on"), None);
        assert_eq!(RelayState::On.toggled(), RelayState::Off);
        assert_eq!(RelayState::default(), RelayState::Off);
    }
}

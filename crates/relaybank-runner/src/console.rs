//! Line-oriented console front-end.
//!
//! Stands in for a switch panel: it keeps an optimistic on/off state per
//! channel, shows notes, and only drives relays while the supervisor reports
//! a connection.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::str::FromStr;

use relaybank_host::{ConnectionStatus, NotesStore, SupervisorClient, TransportError};
use relaybank_protocol::{PinId, PinSet, RelayState};
use thiserror::Error;

/// What the console needs from the connection.
pub trait RelayDriver {
    /// Current connection status.
    fn status(&self) -> ConnectionStatus;
    /// Relay channels that may be driven.
    fn pins(&self) -> PinSet;
    /// Set one relay.
    fn send_relay(&self, pin: PinId, state: RelayState) -> Result<(), TransportError>;
    /// Set every relay.
    fn set_all(&self, state: RelayState) -> Result<(), TransportError>;
}

impl RelayDriver for SupervisorClient {
    fn status(&self) -> ConnectionStatus {
        SupervisorClient::status(self)
    }

    fn pins(&self) -> PinSet {
        SupervisorClient::pins(self).clone()
    }

    fn send_relay(&self, pin: PinId, state: RelayState) -> Result<(), TransportError> {
        SupervisorClient::send_relay(self, pin, state)
    }

    fn set_all(&self, state: RelayState) -> Result<(), TransportError> {
        SupervisorClient::set_all(self, state)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `on <n>` / `off <n>`
    Set(PinId, RelayState),
    /// `toggle <n>`
    Toggle(PinId),
    /// `all on` / `all off`
    All(RelayState),
    /// `note <n> <text>`
    Note(PinId, String),
    /// `save`
    Save,
    /// `status`
    Status,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

/// A line that is not a console command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} (type 'help')")]
pub struct ParseCommandError(String);

fn parse_pin(arg: Option<&str>) -> Result<PinId, ParseCommandError> {
    let arg = arg.ok_or_else(|| ParseCommandError("missing pin".to_string()))?;
    PinId::parse_label(arg)
        .or_else(|| arg.parse::<u8>().ok().and_then(PinId::new))
        .ok_or_else(|| ParseCommandError(format!("invalid pin '{}'", arg)))
}

impl FromStr for ConsoleCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        match word.to_ascii_lowercase().as_str() {
            "on" => Ok(ConsoleCommand::Set(parse_pin(args.next())?, RelayState::On)),
            "off" => Ok(ConsoleCommand::Set(parse_pin(args.next())?, RelayState::Off)),
            "toggle" | "t" => Ok(ConsoleCommand::Toggle(parse_pin(args.next())?)),
            "all" => match args.next().map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Ok(ConsoleCommand::All(RelayState::On)),
                Some("off") => Ok(ConsoleCommand::All(RelayState::Off)),
                _ => Err(ParseCommandError("usage: all on|off".to_string())),
            },
            "note" => {
                let pin = parse_pin(args.next())?;
                let text = rest.split_once(char::is_whitespace).map(|(_, t)| t.trim()).unwrap_or("");
                Ok(ConsoleCommand::Note(pin, text.to_string()))
            }
            "save" => Ok(ConsoleCommand::Save),
            "status" | "s" => Ok(ConsoleCommand::Status),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            "" => Err(ParseCommandError("empty command".to_string())),
            other => Err(ParseCommandError(format!("unknown command '{}'", other))),
        }
    }
}

const HELP: &str = "\
commands:
  on <n> | off <n>     switch relay n (10 or GP10)
  toggle <n>           flip relay n
  all on | all off     switch every relay
  note <n> <text>      label relay n
  save                 write notes to disk
  status               show connection and switches
  quit                 turn everything off and exit";

// ============================================================================
// Console
// ============================================================================

/// Console state: switch positions and notes.
pub struct Console<D> {
    driver: D,
    pins: PinSet,
    switches: BTreeMap<PinId, RelayState>,
    notes: NotesStore,
}

impl<D: RelayDriver> Console<D> {
    /// All switches start OFF, matching the device after boot.
    pub fn new(driver: D, notes: NotesStore) -> Self {
        let pins = driver.pins();
        let switches = pins.iter().map(|pin| (pin, RelayState::Off)).collect();
        Console {
            driver,
            pins,
            switches,
            notes,
        }
    }

    /// The switch position shown for a channel.
    pub fn switch(&self, pin: PinId) -> Option<RelayState> {
        self.switches.get(&pin).copied()
    }

    /// The notes store.
    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    /// Run one command. Returns `false` when the console should exit.
    pub fn execute<W: Write>(&mut self, command: ConsoleCommand, out: &mut W) -> io::Result<bool> {
        match command {
            ConsoleCommand::Set(pin, state) => self.set(pin, state, out)?,
            ConsoleCommand::Toggle(pin) => match self.switch(pin) {
                Some(current) => self.set(pin, current.toggled(), out)?,
                None => writeln!(out, "{} is not a relay channel", pin)?,
            },
            ConsoleCommand::All(state) => self.set_all(state, out)?,
            ConsoleCommand::Note(pin, text) => {
                if self.pins.contains(pin) {
                    self.notes.set(pin, &text);
                    writeln!(out, "{}: {}", pin, self.notes.get(pin).unwrap_or(""))?;
                } else {
                    writeln!(out, "{} is not a relay channel", pin)?;
                }
            }
            ConsoleCommand::Save => match self.notes.save(&self.pins) {
                Ok(()) => writeln!(out, "notes saved to {}", self.notes.path().display())?,
                Err(e) => writeln!(out, "could not save notes: {}", e)?,
            },
            ConsoleCommand::Status => self.print_status(out)?,
            ConsoleCommand::Help => writeln!(out, "{}", HELP)?,
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Parse and run one input line. Returns `false` when the console should
    /// exit.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<bool> {
        if line.trim().is_empty() {
            return Ok(true);
        }
        match line.parse::<ConsoleCommand>() {
            Ok(command) => self.execute(command, out),
            Err(e) => {
                writeln!(out, "{}", e)?;
                Ok(true)
            }
        }
    }

    /// Report a status change.
    pub fn on_status<W: Write>(&mut self, status: &ConnectionStatus, out: &mut W) -> io::Result<()> {
        let controls = if status.controls_enabled() { "enabled" } else { "disabled" };
        writeln!(out, "[{}] controls {}", status, controls)
    }

    fn controls_enabled<W: Write>(&self, out: &mut W) -> io::Result<bool> {
        let status = self.driver.status();
        if status.controls_enabled() {
            Ok(true)
        } else {
            writeln!(out, "controls disabled: {}", status)?;
            Ok(false)
        }
    }

    fn set<W: Write>(&mut self, pin: PinId, state: RelayState, out: &mut W) -> io::Result<()> {
        if !self.pins.contains(pin) {
            return writeln!(out, "{} is not a relay channel", pin);
        }
        if !self.controls_enabled(out)? {
            return Ok(());
        }

        self.switches.insert(pin, state);
        match self.driver.send_relay(pin, state) {
            Ok(()) => writeln!(out, "{} {}", pin, state),
            Err(e) => writeln!(out, "{} {} (not confirmed: {})", pin, state, e),
        }
    }

    fn set_all<W: Write>(&mut self, state: RelayState, out: &mut W) -> io::Result<()> {
        if !self.controls_enabled(out)? {
            return Ok(());
        }

        for switch in self.switches.values_mut() {
            *switch = state;
        }
        match self.driver.set_all(state) {
            Ok(()) => writeln!(out, "all {}", state),
            Err(e) => writeln!(out, "all {} (not confirmed: {})", state, e),
        }
    }

    fn print_status<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.driver.status())?;
        for (pin, state) in &self.switches {
            writeln!(out, "  {} [{:<3}] {}", pin, state.as_str(), self.notes.get(*pin).unwrap_or(""))?;
        }
        Ok(())
    }
}

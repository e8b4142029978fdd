//! The controller loop: read lines, apply commands, reply.

use alloc::format;
use alloc::string::ToString;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use relaybank_protocol::{Command, LineCodec, Response, INVALID_COMMAND_REPLY};

use crate::bank::RelayBank;
use crate::serial::SerialIo;

/// Pause between polls of the serial input, in milliseconds.
pub const POLL_INTERVAL_MS: u32 = 100;

const READ_CHUNK: usize = 64;

/// Counters kept by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Lines decoded from the serial input.
    pub lines_received: u64,
    /// Pings answered.
    pub pings: u64,
    /// Relay commands applied.
    pub commands_applied: u64,
    /// Lines rejected.
    pub commands_rejected: u64,
}

/// Device-side command loop.
///
/// Reads whatever bytes the serial console has, splits them into lines and
/// handles each line in arrival order. Every line gets exactly one reply. A
/// malformed line produces a diagnostic and never stops the loop.
pub struct RelayController<P: OutputPin, S> {
    bank: RelayBank<P>,
    serial: S,
    codec: LineCodec,
    stats: ControllerStats,
}

impl<P, S> RelayController<P, S>
where
    P: OutputPin,
    S: SerialIo,
{
    /// Create a controller over a relay bank and a serial console.
    pub fn new(bank: RelayBank<P>, serial: S) -> Self {
        RelayController {
            bank,
            serial,
            codec: LineCodec::new(),
            stats: ControllerStats::default(),
        }
    }

    /// The relay bank.
    pub fn bank(&self) -> &RelayBank<P> {
        &self.bank
    }

    /// The serial console.
    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Counters since start.
    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Drain the serial input and handle every complete line.
    ///
    /// Returns the number of lines handled. Only serial errors are returned;
    /// command errors are reported to the host as replies.
    pub fn poll(&mut self) -> Result<usize, S::Error> {
        self.fill()?;

        let mut handled = 0;
        while let Some(line) = self.codec.decode_line() {
            let reply = self.handle_line(&line);
            self.serial.write_all(&reply.encode())?;
            handled += 1;
        }
        if handled > 0 {
            self.serial.flush()?;
        }
        Ok(handled)
    }

    /// Run forever, polling every [`POLL_INTERVAL_MS`].
    ///
    /// Returns only if the serial console fails.
    pub fn run<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), S::Error> {
        log::info!("relay controller running");
        loop {
            self.poll()?;
            delay.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Handle one line and produce its reply.
    pub fn handle_line(&mut self, line: &str) -> Response {
        self.stats.lines_received += 1;

        match Command::parse(line, self.bank.pins()) {
            Ok(Command::Ping) => {
                self.stats.pings += 1;
                log::trace!("ping");
                Response::Pong
            }
            Ok(Command::SetRelay { pin, state }) => match self.bank.set(pin, state) {
                Ok(()) => {
                    self.stats.commands_applied += 1;
                    #[cfg(feature = "std")]
                    metrics::counter!(relaybank_metrics::metric_defs::DEVICE_COMMANDS_APPLIED.name).increment(1);
                    log::info!("{} is now {}", pin, state);
                    Response::ack(pin, state)
                }
                Err(e) => {
                    self.reject();
                    log::error!("failed to apply {}{}: {}", pin, state, e);
                    Response::Invalid(format!("Error: {}", e))
                }
            },
            Err(e) => {
                self.reject();
                log::warn!("rejected line {:?}: {}", line, e);
                Response::Invalid(INVALID_COMMAND_REPLY.to_string())
            }
        }
    }

    fn reject(&mut self) {
        self.stats.commands_rejected += 1;
        #[cfg(feature = "std")]
        metrics::counter!(relaybank_metrics::metric_defs::DEVICE_COMMANDS_REJECTED.name).increment(1);
    }

    fn fill(&mut self) -> Result<(), S::Error> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.serial.read_available(&mut buf)? {
                0 => return Ok(()),
                n => self.codec.push(&buf[..n]),
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::config::RelayTable;
    use crate::sim::{MemorySerial, SimPin};
    use relaybank_protocol::{PinId, RelayState};

    fn controller() -> RelayController<SimPin, MemorySerial> {
        let bank = RelayBank::new(&RelayTable::default(), SimPin::new).unwrap();
        RelayController::new(bank, MemorySerial::new())
    }

    fn pin(gpio: u8) -> PinId {
        PinId::new(gpio).unwrap()
    }

    #[test]
    fn test_ping() {
        let mut c = controller();
        c.serial_mut().feed(b"PING\r");
        assert_eq!(c.poll().unwrap(), 1);
        assert_eq!(c.serial_mut().take_output(), b"PONG\r\n");
        assert_eq!(c.stats().pings, 1);
    }

    #[test]
    fn test_apply_and_ack() {
        let mut c = controller();
        c.serial_mut().feed(b"GP13ON\r");
        c.poll().unwrap();
        assert_eq!(c.serial_mut().take_output(), b"GP13 is now ON\r\n");
        assert_eq!(c.bank().state(pin(13)), Some(RelayState::On));
    }

    #[test]
    fn test_malformed_line_does_not_stop_loop() {
        let mut c = controller();
        c.serial_mut().feed(b"GARBAGE\rGP10ON\r");
        assert_eq!(c.poll().unwrap(), 2);

        let output = String::from_utf8(c.serial_mut().take_output()).unwrap();
        let lines: Vec<&str> = output.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec![INVALID_COMMAND_REPLY, "GP10 is now ON"]);
        assert_eq!(c.stats().commands_rejected, 1);
        assert_eq!(c.stats().commands_applied, 1);
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let mut c = controller();
        c.serial_mut().feed(b"GP11O");
        assert_eq!(c.poll().unwrap(), 0);
        assert!(c.serial_mut().take_output().is_empty());

        c.serial_mut().feed(b"N\r");
        assert_eq!(c.poll().unwrap(), 1);
        assert_eq!(c.bank().state(pin(11)), Some(RelayState::On));
    }

    #[test]
    fn test_empty_poll() {
        let mut c = controller();
        assert_eq!(c.poll().unwrap(), 0);
        assert_eq!(c.stats(), ControllerStats::default());
    }
}

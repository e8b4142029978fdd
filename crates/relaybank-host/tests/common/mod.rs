//! Scripted serial ports for host tests.
//!
//! A [`MockPort`] either hosts a real [`RelayController`] on in-memory
//! pins, answers every line with a fixed string, or stays silent. Tests keep
//! a clone of the port to flip failure modes and inspect what was written,
//! opened and closed.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relaybank_firmware::sim::{MemorySerial, SimPin};
use relaybank_firmware::{RelayBank, RelayController, RelayTable};
use relaybank_host::{DeviceCandidate, PortOpener, SerialLink};
use relaybank_protocol::{PinId, RelayState};

type Device = RelayController<SimPin, MemorySerial>;

#[derive(Default)]
struct PortState {
    device: Option<Device>,
    fixed_reply: Option<String>,
    unterminated: bool,
    babble: Option<Vec<u8>>,
    silent: bool,
    fail_writes: bool,
    unopenable: bool,
    written: Vec<u8>,
    pending: VecDeque<u8>,
    opens: usize,
    closes: usize,
}

/// Test-side view of one serial port.
#[derive(Clone)]
pub struct MockPort {
    name: String,
    state: Arc<Mutex<PortState>>,
}

impl MockPort {
    fn with_state(name: &str, state: PortState) -> Self {
        MockPort {
            name: name.to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A port with a relay controller behind it.
    pub fn relay(name: &str, table: &RelayTable) -> Self {
        let bank = RelayBank::new(table, SimPin::new).unwrap();
        let device = RelayController::new(bank, MemorySerial::new());
        Self::with_state(name, PortState { device: Some(device), ..PortState::default() })
    }

    /// A port with the default four-channel relay controller.
    pub fn default_relay(name: &str) -> Self {
        Self::relay(name, &RelayTable::default())
    }

    /// A port that never answers.
    pub fn silent(name: &str) -> Self {
        Self::with_state(name, PortState::default())
    }

    /// A port that answers every line with `reply`.
    pub fn replying(name: &str, reply: &str) -> Self {
        Self::with_state(
            name,
            PortState { fixed_reply: Some(reply.to_string()), ..PortState::default() },
        )
    }

    /// A port that answers every line with `reply` but never ends the line.
    pub fn unterminated(name: &str, reply: &str) -> Self {
        Self::with_state(
            name,
            PortState {
                fixed_reply: Some(reply.to_string()),
                unterminated: true,
                ..PortState::default()
            },
        )
    }

    /// A port whose every read returns `chunk`, without end.
    pub fn babbling(name: &str, chunk: &[u8]) -> Self {
        Self::with_state(name, PortState { babble: Some(chunk.to_vec()), ..PortState::default() })
    }

    /// A port that cannot be opened.
    pub fn unopenable(name: &str) -> Self {
        Self::with_state(name, PortState { unopenable: true, ..PortState::default() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop answering, as if the cable were pulled.
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Fail every write.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Everything written since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().written)
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    /// Relay state as the device sees it.
    pub fn relay_state(&self, gpio: u8) -> Option<RelayState> {
        let pin = PinId::new(gpio)?;
        self.state.lock().device.as_ref()?.bank().state(pin)
    }

    fn open(&self) -> io::Result<Box<dyn SerialLink>> {
        let mut state = self.state.lock();
        if state.unopenable {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "port busy"));
        }
        state.opens += 1;
        state.pending.clear();
        Ok(Box::new(MockLink { port: self.clone() }))
    }
}

struct MockLink {
    port: MockPort,
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.port.state.lock();
        if let Some(chunk) = &state.babble {
            let n = buf.len().min(chunk.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            return Ok(n);
        }
        if state.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        let n = buf.len().min(state.pending.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.port.state.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"));
        }
        state.written.extend_from_slice(buf);
        if state.silent {
            return Ok(buf.len());
        }

        if let Some(reply) = state.fixed_reply.clone() {
            let lines = buf.iter().filter(|&&b| b == b'\r').count();
            for _ in 0..lines {
                state.pending.extend(reply.as_bytes());
                if !state.unterminated {
                    state.pending.extend(b"\r\n");
                }
            }
        }

        let output = match state.device.as_mut() {
            Some(device) => {
                device.serial_mut().feed(buf);
                device.poll().unwrap_or_else(|never| match never {});
                device.serial_mut().take_output()
            }
            None => Vec::new(),
        };
        state.pending.extend(output);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn port_name(&self) -> &str {
        &self.port.name
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.state.lock().pending.clear();
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.port.state.lock().closes += 1;
    }
}

/// Opens [`MockPort`]s by name, in the order given.
pub struct MockOpener {
    ports: Vec<MockPort>,
    fail_list: AtomicBool,
}

impl MockOpener {
    pub fn new(ports: &[&MockPort]) -> Arc<Self> {
        Arc::new(MockOpener {
            ports: ports.iter().map(|&p| p.clone()).collect(),
            fail_list: AtomicBool::new(false),
        })
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

impl PortOpener for MockOpener {
    fn list(&self) -> io::Result<Vec<DeviceCandidate>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "udev unavailable"));
        }
        Ok(self.ports.iter().map(|p| DeviceCandidate::new(p.name())).collect())
    }

    fn open(&self, port_name: &str, _baud_rate: u32, _timeout: Duration) -> io::Result<Box<dyn SerialLink>> {
        self.ports
            .iter()
            .find(|p| p.name() == port_name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such port"))?
            .open()
    }
}

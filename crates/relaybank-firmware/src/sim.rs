//! Host-side stand-ins for board peripherals.
//!
//! These let the controller run off-target: as the `relayctl emulate`
//! device on a real serial port, and under test. Needs the `std` feature.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use relaybank_protocol::PinId;

use crate::serial::SerialIo;

// ============================================================================
// Output pin
// ============================================================================

/// A simulated output line.
///
/// Clones share the same level, so a test can keep a clone to observe what
/// the controller drove.
#[derive(Debug, Clone)]
pub struct SimPin {
    id: PinId,
    level: Arc<AtomicBool>,
}

impl SimPin {
    /// A new line, initially low.
    pub fn new(id: PinId) -> Self {
        SimPin {
            id,
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The line this pin represents.
    pub fn id(&self) -> PinId {
        self.id
    }

    /// Current output level.
    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    fn write(&self, high: bool) {
        let previous = self.level.swap(high, Ordering::SeqCst);
        if previous != high {
            log::debug!("{} -> {}", self.id, if high { "HIGH" } else { "LOW" });
        }
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

// ============================================================================
// Delay
// ============================================================================

/// Delay provider backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ============================================================================
// Serial console
// ============================================================================

/// An in-memory serial console.
///
/// Input queued with [`MemorySerial::feed`] is available immediately; output
/// collects until [`MemorySerial::take_output`].
#[derive(Debug, Default)]
pub struct MemorySerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl MemorySerial {
    /// An empty console.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the host had sent them.
    pub fn feed(&mut self, data: &[u8]) {
        self.input.extend(data);
    }

    /// Take everything written so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Bytes queued but not yet read.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }
}

impl SerialIo for MemorySerial {
    type Error = Infallible;

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let n = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), Infallible> {
        self.output.extend_from_slice(data);
        Ok(())
    }
}

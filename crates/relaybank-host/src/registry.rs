//! Device discovery.
//!
//! The registry walks the OS port list in enumeration order, pings each
//! port and keeps the first one that answers. Every other port it opened is
//! closed again before [`DeviceRegistry::discover`] returns.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use relaybank_metrics::{metric_defs, port_labels_with};
use relaybank_protocol::{Command, LineCodec, PROTOCOL_BAUD_RATE};

use crate::clock::Clock;
use crate::error::DiscoveryError;
use crate::serial::{DeviceCandidate, PortOpener, SerialLink};

/// Most bytes read while waiting for one reply. Bounds the wait when the
/// device streams blank lines faster than the clock advances.
const MAX_REPLY_BYTES: usize = 1024;

/// Discovery parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Baud rate used to open every candidate.
    pub baud_rate: u32,
    /// How long to wait for a reply line.
    pub read_timeout: Duration,
    /// Wait after opening a port before pinging it. Boards that reset when
    /// the port opens need this to finish booting.
    pub settle_delay: Duration,
    /// If set, only this exact reply identifies the device. Otherwise any
    /// non-empty reply does.
    pub expected_reply: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            baud_rate: PROTOCOL_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            expected_reply: None,
        }
    }
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Exclusive owner of the open serial channel to the device.
///
/// Dropping the handle closes the port.
pub struct ConnectionHandle {
    port_name: String,
    link: Box<dyn SerialLink>,
    codec: LineCodec,
    read_timeout: Duration,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("port_name", &self.port_name)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    /// Wrap an open link.
    pub fn new(link: Box<dyn SerialLink>, read_timeout: Duration) -> Self {
        ConnectionHandle {
            port_name: link.port_name().to_string(),
            link,
            codec: LineCodec::new(),
            read_timeout,
        }
    }

    /// Name of the connected port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Write one command and flush.
    pub fn send(&mut self, command: &Command) -> io::Result<()> {
        self.link.write_all(&command.encode())?;
        self.link.flush()
    }

    /// Wait up to the read timeout for a non-empty reply.
    ///
    /// The first complete line wins. If the device goes quiet without ending
    /// its line, the text received so far is the reply. Returns `Ok(None)` if
    /// nothing non-blank arrived in time.
    pub fn read_reply(&mut self, clock: &dyn Clock) -> io::Result<Option<String>> {
        let deadline = clock.now() + self.read_timeout;
        let mut buf = [0u8; 64];
        let mut received = 0;

        loop {
            if let Some(line) = self.codec.decode_line() {
                let line = line.trim();
                if !line.is_empty() {
                    return Ok(Some(line.to_string()));
                }
                continue;
            }

            if clock.now() >= deadline || received >= MAX_REPLY_BYTES {
                return Ok(self.take_partial());
            }

            match self.link.read(&mut buf) {
                Ok(0) => return Ok(self.take_partial()),
                Ok(n) => {
                    received += n;
                    self.codec.push(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(self.take_partial())
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn take_partial(&mut self) -> Option<String> {
        let text = self.codec.take_partial()?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        tracing::trace!(port = %self.port_name, reply = %text, "unterminated reply");
        Some(text.to_string())
    }

    /// Drop stale input so the next read only sees fresh replies.
    pub fn discard_input(&mut self) -> io::Result<()> {
        self.codec.clear();
        self.link.clear_input()
    }

    /// Send `PING` and wait for the reply.
    ///
    /// A missing reply is reported as [`io::ErrorKind::TimedOut`].
    pub fn ping(&mut self, clock: &dyn Clock) -> io::Result<String> {
        self.send(&Command::Ping)?;
        self.read_reply(clock)?
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no reply to PING"))
    }

    /// Close the port.
    pub fn close(self) {
        tracing::debug!(port = %self.port_name, "closing connection");
    }
}

// ============================================================================
// DeviceRegistry
// ============================================================================

/// Finds the relay controller among the available serial ports.
pub struct DeviceRegistry {
    opener: Arc<dyn PortOpener>,
    clock: Arc<dyn Clock>,
    config: DiscoveryConfig,
}

impl DeviceRegistry {
    /// Create a registry.
    pub fn new(opener: Arc<dyn PortOpener>, clock: Arc<dyn Clock>, config: DiscoveryConfig) -> Self {
        DeviceRegistry { opener, clock, config }
    }

    /// The discovery parameters.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Ports visible to the OS, in enumeration order.
    pub fn candidates(&self) -> Result<Vec<DeviceCandidate>, DiscoveryError> {
        self.opener.list().map_err(DiscoveryError::Enumeration)
    }

    /// Ping every candidate and return a connection to the first that
    /// answers a ping within `timeout`.
    pub fn discover(&self, timeout: Duration) -> Result<ConnectionHandle, DiscoveryError> {
        metrics::counter!(metric_defs::DISCOVERY_ATTEMPTS.name).increment(1);

        let candidates = self.candidates()?;
        tracing::debug!(count = candidates.len(), "probing serial ports");

        for candidate in &candidates {
            if let Some(handle) = self.try_port(candidate, timeout) {
                tracing::info!(port = %candidate.port_name, "relay controller found");
                return Ok(handle);
            }
        }

        tracing::debug!(tried = candidates.len(), "no relay controller found");
        Err(DiscoveryError::NoDeviceFound)
    }

    fn try_port(&self, candidate: &DeviceCandidate, timeout: Duration) -> Option<ConnectionHandle> {
        let port = candidate.port_name.as_str();

        let link = match self.opener.open(port, self.config.baud_rate, timeout) {
            Ok(link) => link,
            Err(e) => {
                tracing::debug!(port, error = %e, "could not open port");
                record_attempt(port, "open_failed");
                return None;
            }
        };

        let mut handle = ConnectionHandle::new(link, timeout);
        self.clock.sleep(self.config.settle_delay);

        let reply = handle
            .discard_input()
            .and_then(|()| handle.send(&Command::Ping))
            .and_then(|()| handle.read_reply(self.clock.as_ref()));

        match reply {
            Ok(Some(reply)) if self.accepts(&reply) => {
                tracing::debug!(port, reply = %reply, "port answered ping");
                record_attempt(port, "found");
                Some(handle)
            }
            Ok(Some(reply)) => {
                tracing::debug!(port, reply = %reply, "unexpected reply");
                record_attempt(port, "silent");
                None
            }
            Ok(None) => {
                tracing::debug!(port, "no reply");
                record_attempt(port, "silent");
                None
            }
            Err(e) => {
                tracing::debug!(port, error = %e, "ping failed");
                record_attempt(port, "io_error");
                None
            }
        }
    }

    fn accepts(&self, reply: &str) -> bool {
        match &self.config.expected_reply {
            Some(expected) => reply == expected,
            None => !reply.is_empty(),
        }
    }
}

fn record_attempt(port: &str, outcome: &str) {
    metrics::counter!(
        metric_defs::PORTS_TRIED.name,
        &port_labels_with(port, &[("outcome", outcome)])
    )
    .increment(1);
}

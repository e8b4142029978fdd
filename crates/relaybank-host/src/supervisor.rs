//! Connection supervisor.
//!
//! The supervisor owns the connection to the relay controller. It runs a
//! loop on its own thread that discovers the device, pings it on a fixed
//! interval, and falls back to rediscovery after any failure:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!       ^              |            |
//!       +--------------+------------+
//! ```
//!
//! The UI talks to it through a [`SupervisorClient`] and hears about state
//! changes through [`StatusListener`]s. It never touches the serial port.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use relaybank_metrics::{metric_defs, port_labels, port_labels_with};
use relaybank_protocol::{Command, PinId, PinSet, RelayState};

use crate::clock::Clock;
use crate::error::TransportError;
use crate::registry::{ConnectionHandle, DeviceRegistry, DiscoveryConfig};
use crate::serial::PortOpener;

// ============================================================================
// Status
// ============================================================================

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection held.
    Disconnected,
    /// Discovery in progress.
    Connecting,
    /// A device is connected.
    Connected,
}

/// Status published to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No device. Relay controls must be disabled.
    Disconnected,
    /// Looking for a device.
    Connecting,
    /// Connected to the device on `port`.
    Connected {
        /// The port the device answered on.
        port: String,
    },
}

impl ConnectionStatus {
    /// The state this status reports.
    pub fn state(&self) -> ConnectionState {
        match self {
            ConnectionStatus::Disconnected => ConnectionState::Disconnected,
            ConnectionStatus::Connecting => ConnectionState::Connecting,
            ConnectionStatus::Connected { .. } => ConnectionState::Connected,
        }
    }

    /// Whether relay controls should be enabled.
    pub fn controls_enabled(&self) -> bool {
        matches!(self, ConnectionStatus::Connected { .. })
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected { port } => write!(f, "Connected to {}", port),
        }
    }
}

/// Receives status changes.
///
/// Called on the thread that caused the transition: the supervisor thread,
/// or a client thread whose write failed. Connect and disconnect
/// notifications are delivered while the connection lock is held, so
/// implementations must not block and must not send commands through a
/// [`SupervisorClient`]. Forward into a channel instead.
pub trait StatusListener: Send + Sync {
    /// The status changed.
    fn on_status(&self, status: &ConnectionStatus);
}

impl<F> StatusListener for F
where
    F: Fn(&ConnectionStatus) + Send + Sync,
{
    fn on_status(&self, status: &ConnectionStatus) {
        self(status)
    }
}

/// Forwards status changes into a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<ConnectionStatus>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<ConnectionStatus>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (ChannelListener { tx }, rx)
    }
}

impl StatusListener for ChannelListener {
    fn on_status(&self, status: &ConnectionStatus) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(status.clone());
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Supervisor parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Time between heartbeats while connected.
    pub heartbeat_interval: Duration,
    /// Time between discovery attempts while disconnected.
    pub retry_interval: Duration,
    /// Discovery parameters.
    pub discovery: DiscoveryConfig,
    /// Relay channels the device accepts.
    pub pins: PinSet,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            heartbeat_interval: Duration::from_secs(2),
            retry_interval: Duration::from_secs(2),
            discovery: DiscoveryConfig::default(),
            pins: PinSet::default(),
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// State shared between the supervisor thread and its clients.
///
/// The slot mutex is held for a whole write/flush/read exchange, which
/// serializes UI commands against heartbeats. Every change to the slot is
/// published before the lock is released, so the published status follows
/// the slot in order no matter which thread changed it.
struct Shared {
    slot: Mutex<Option<ConnectionHandle>>,
    status: Mutex<ConnectionStatus>,
    listeners: RwLock<Vec<Arc<dyn StatusListener>>>,
    pins: PinSet,
}

impl Shared {
    fn publish(&self, status: ConnectionStatus) {
        tracing::debug!(status = %status, "connection status");
        metrics::gauge!(metric_defs::CONNECTED.name).set(if status.controls_enabled() { 1.0 } else { 0.0 });

        *self.status.lock() = status.clone();
        for listener in self.listeners.read().iter() {
            listener.on_status(&status);
        }
    }

    /// Drop the connection after a failure and publish `Disconnected`. The
    /// caller holds the slot lock.
    fn drop_connection(&self, slot: &mut Option<ConnectionHandle>, cause: &str, error: &io::Error) {
        if let Some(handle) = slot.take() {
            tracing::warn!(port = %handle.port_name(), cause, error = %error, "connection lost");
            metrics::counter!(
                metric_defs::DISCONNECTIONS.name,
                &port_labels_with(handle.port_name(), &[("cause", cause)])
            )
            .increment(1);
            handle.close();
            self.publish(ConnectionStatus::Disconnected);
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Owns the connection and runs the discovery/heartbeat cycle.
pub struct Supervisor {
    shared: Arc<Shared>,
    registry: DeviceRegistry,
    clock: Arc<dyn Clock>,
    config: SupervisorConfig,
}

impl Supervisor {
    /// Create a supervisor. Nothing happens until [`Supervisor::step`] or
    /// [`Supervisor::spawn`] is called.
    pub fn new(config: SupervisorConfig, opener: Arc<dyn PortOpener>, clock: Arc<dyn Clock>) -> Self {
        let registry = DeviceRegistry::new(opener, Arc::clone(&clock), config.discovery.clone());
        Supervisor {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                status: Mutex::new(ConnectionStatus::Disconnected),
                listeners: RwLock::new(Vec::new()),
                pins: config.pins.clone(),
            }),
            registry,
            clock,
            config,
        }
    }

    /// Register a status listener.
    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// A client for sending commands.
    pub fn client(&self) -> SupervisorClient {
        SupervisorClient {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.lock().clone()
    }

    /// Run one cycle: discovery when disconnected, a heartbeat when
    /// connected. Returns how long to wait before the next cycle.
    pub fn step(&mut self) -> Duration {
        let connected = self.shared.slot.lock().is_some();
        if connected {
            self.heartbeat()
        } else {
            self.connect()
        }
    }

    fn connect(&mut self) -> Duration {
        self.shared.publish(ConnectionStatus::Connecting);

        match self.registry.discover(self.config.discovery.read_timeout) {
            Ok(handle) => {
                let port = handle.port_name().to_string();
                let mut slot = self.shared.slot.lock();
                *slot = Some(handle);

                tracing::info!(port = %port, "connected");
                metrics::counter!(metric_defs::CONNECTIONS.name, &port_labels(&port)).increment(1);
                self.shared.publish(ConnectionStatus::Connected { port });
                self.config.heartbeat_interval
            }
            Err(e) => {
                tracing::debug!(error = %e, retry_in = ?self.config.retry_interval, "discovery failed");
                self.shared.publish(ConnectionStatus::Disconnected);
                self.config.retry_interval
            }
        }
    }

    fn heartbeat(&mut self) -> Duration {
        let mut slot = self.shared.slot.lock();
        let Some(handle) = slot.as_mut() else {
            return Duration::ZERO;
        };

        let started = self.clock.now();
        let result = handle
            .discard_input()
            .and_then(|()| handle.ping(self.clock.as_ref()));

        match result {
            Ok(reply) => {
                let rtt = self.clock.now().saturating_duration_since(started);
                tracing::trace!(reply = %reply, ?rtt, "heartbeat");
                metrics::histogram!(metric_defs::HEARTBEAT_RTT.name).record(rtt.as_secs_f64() * 1000.0);
                self.config.heartbeat_interval
            }
            Err(e) => {
                self.shared.drop_connection(&mut slot, "heartbeat", &e);
                self.config.retry_interval
            }
        }
    }

    /// Start the loop on a dedicated thread.
    ///
    /// Publishes an initial `Disconnected` before the first cycle so
    /// listeners start with controls disabled.
    pub fn spawn(mut self) -> io::Result<SupervisorHandle> {
        let client = self.client();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        self.shared.publish(ConnectionStatus::Disconnected);

        let thread = thread::Builder::new()
            .name("relaybank-supervisor".to_string())
            .spawn(move || {
                tracing::debug!("supervisor started");
                loop {
                    let wait = self.step();
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("supervisor stopped");
            })?;

        Ok(SupervisorHandle {
            client,
            stop_tx,
            thread: Some(thread),
        })
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Cloneable command interface for the UI.
#[derive(Clone)]
pub struct SupervisorClient {
    shared: Arc<Shared>,
}

impl SupervisorClient {
    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.lock().clone()
    }

    /// Relay channels the device accepts.
    pub fn pins(&self) -> &PinSet {
        &self.shared.pins
    }

    /// Write a command to the device.
    ///
    /// Fails fast with [`TransportError::NotConnected`] when there is no
    /// connection. A write failure drops the connection exactly as a failed
    /// heartbeat would. Replies are not awaited.
    pub fn send_command(&self, command: Command) -> Result<(), TransportError> {
        let result = self.try_send(command);
        match &result {
            Ok(()) => {
                tracing::debug!(command = %command.to_command_string(), "sent");
                metrics::counter!(metric_defs::COMMANDS_SENT.name).increment(1);
            }
            Err(e) => {
                tracing::debug!(command = %command.to_command_string(), error = %e, "send failed");
                metrics::counter!(metric_defs::COMMANDS_FAILED.name, "reason" => e.reason()).increment(1);
            }
        }
        result
    }

    fn try_send(&self, command: Command) -> Result<(), TransportError> {
        if let Command::SetRelay { pin, .. } = command {
            if !self.shared.pins.contains(pin) {
                return Err(TransportError::UnknownPin(pin));
            }
        }

        let mut slot = self.shared.slot.lock();
        let handle = slot.as_mut().ok_or(TransportError::NotConnected)?;
        match handle.send(&command) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.shared.drop_connection(&mut slot, "send", &e);
                Err(TransportError::Io(e))
            }
        }
    }

    /// Set one relay.
    pub fn send_relay(&self, pin: PinId, state: RelayState) -> Result<(), TransportError> {
        self.send_command(Command::set_relay(pin, state))
    }

    /// Set every configured relay, in pin order. Stops at the first failure.
    pub fn set_all(&self, state: RelayState) -> Result<(), TransportError> {
        for pin in self.shared.pins.iter() {
            self.send_relay(pin, state)?;
        }
        Ok(())
    }
}

/// Owns the supervisor thread.
///
/// Dropping the handle stops the loop without waiting for it; call
/// [`SupervisorHandle::shutdown`] for an orderly stop.
pub struct SupervisorHandle {
    client: SupervisorClient,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// A client for sending commands.
    pub fn client(&self) -> SupervisorClient {
        self.client.clone()
    }

    /// Stop the loop, turn every relay off, and close the connection.
    pub fn shutdown(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("supervisor thread panicked");
            }
        }

        let shared = &self.client.shared;
        let mut slot = shared.slot.lock();
        let closed = match slot.take() {
            Some(mut handle) => {
                for pin in shared.pins.iter() {
                    if let Err(e) = handle.send(&Command::set_relay(pin, RelayState::Off)) {
                        tracing::warn!(pin = %pin, error = %e, "could not turn relay off");
                        break;
                    }
                }
                tracing::info!(port = %handle.port_name(), "all relays off, closing");
                handle.close();
                true
            }
            None => false,
        };

        if closed || shared.status.lock().state() != ConnectionState::Disconnected {
            shared.publish(ConnectionStatus::Disconnected);
        }
    }
}

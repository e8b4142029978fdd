//! Host side of the relaybank system.
//!
//! - [`DeviceRegistry`] finds the relay controller among the serial ports.
//! - [`Supervisor`] owns the connection, runs heartbeats and reconnects.
//! - [`SupervisorClient`] is what a UI uses to drive relays.
//! - [`NotesStore`] keeps the UI's per-channel labels.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relaybank_host::{ChannelListener, Supervisor, SupervisorConfig, SystemClock, SystemPortOpener};
//! use relaybank_protocol::{PinId, RelayState};
//!
//! let supervisor = Supervisor::new(
//!     SupervisorConfig::default(),
//!     Arc::new(SystemPortOpener),
//!     Arc::new(SystemClock),
//! );
//! let (listener, status) = ChannelListener::new();
//! supervisor.add_listener(Arc::new(listener));
//!
//! let handle = supervisor.spawn()?;
//! let client = handle.client();
//!
//! for change in status.iter() {
//!     if change.controls_enabled() {
//!         client.send_relay(PinId::new(10).unwrap(), RelayState::On)?;
//!         break;
//!     }
//! }
//!
//! handle.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod clock;
mod error;
mod notes;
mod registry;
mod serial;
mod supervisor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DiscoveryError, NotesError, TransportError};
pub use notes::NotesStore;
pub use registry::{ConnectionHandle, DeviceRegistry, DiscoveryConfig};
pub use serial::{DeviceCandidate, PortOpener, SerialLink, SystemPortOpener};
pub use supervisor::{
    ChannelListener, ConnectionState, ConnectionStatus, StatusListener, Supervisor, SupervisorClient,
    SupervisorConfig, SupervisorHandle,
};

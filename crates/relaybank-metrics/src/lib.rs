//! Metrics for the relaybank host and relay controller.
//!
//! This crate declares every metric the workspace records as a structured
//! [`Metric`] constant, so names are never typed twice and exporters can be
//! given descriptions and units. It re-exports the `metrics` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use relaybank_metrics::{describe_metrics, metric_defs, port_labels};
//!
//! describe_metrics();
//!
//! metrics::counter!(metric_defs::PORTS_TRIED.name, &port_labels("/dev/ttyACM0")).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Which `describe_*!` macro a metric is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use relaybank_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const PINGS: Metric = Metric::counter("relaybank.discovery.pings")
///     .with_description("Ports pinged")
///     .with_unit(Unit::Count)
///     .with_labels(&["port"]);
///
/// assert_eq!(PINGS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name.
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Label carried by metrics that concern one serial port.
    pub const PORT_LABELS: &[&str] = &["port"];

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Full discovery passes over the port list.
    pub const DISCOVERY_ATTEMPTS: Metric = Metric::counter("relaybank.discovery.attempts")
        .with_description("Discovery passes over the available serial ports")
        .with_unit(Unit::Count);

    /// Individual ports pinged during discovery.
    ///
    /// Labels: port, outcome (`found`, `silent`, `open_failed`, `io_error`)
    pub const PORTS_TRIED: Metric = Metric::counter("relaybank.discovery.ports_tried")
        .with_description("Serial ports pinged during discovery")
        .with_unit(Unit::Count)
        .with_labels(&["port", "outcome"]);

    // ========================================================================
    // Connection
    // ========================================================================

    /// Whether a device is currently connected (0 or 1).
    pub const CONNECTED: Metric = Metric::gauge("relaybank.connection.connected")
        .with_description("1 while a relay controller is connected, otherwise 0");

    /// Connections established.
    ///
    /// Labels: port
    pub const CONNECTIONS: Metric = Metric::counter("relaybank.connection.established")
        .with_description("Connections established to a relay controller")
        .with_unit(Unit::Count)
        .with_labels(PORT_LABELS);

    /// Connections lost after an I/O error or a missed heartbeat.
    ///
    /// Labels: port, cause (`heartbeat`, `send`)
    pub const DISCONNECTIONS: Metric = Metric::counter("relaybank.connection.lost")
        .with_description("Connections dropped after a failure")
        .with_unit(Unit::Count)
        .with_labels(&["port", "cause"]);

    /// Heartbeat round trip time.
    pub const HEARTBEAT_RTT: Metric = Metric::histogram("relaybank.heartbeat.rtt_ms")
        .with_description("Time from PING to the first reply line")
        .with_unit(Unit::Milliseconds);

    // ========================================================================
    // Commands
    // ========================================================================

    /// Relay commands written to the device.
    pub const COMMANDS_SENT: Metric = Metric::counter("relaybank.commands.sent")
        .with_description("Relay commands written to the device")
        .with_unit(Unit::Count);

    /// Relay commands that could not be written.
    ///
    /// Labels: reason (`not_connected`, `io`, `unknown_pin`)
    pub const COMMANDS_FAILED: Metric = Metric::counter("relaybank.commands.failed")
        .with_description("Relay commands rejected or not delivered")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    // ========================================================================
    // Relay controller
    // ========================================================================

    /// Commands decoded and applied by the relay controller.
    pub const DEVICE_COMMANDS_APPLIED: Metric = Metric::counter("relaybank.device.commands_applied")
        .with_description("Command lines applied by the relay controller")
        .with_unit(Unit::Count);

    /// Lines rejected by the relay controller.
    pub const DEVICE_COMMANDS_REJECTED: Metric = Metric::counter("relaybank.device.commands_rejected")
        .with_description("Malformed command lines received by the relay controller")
        .with_unit(Unit::Count);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &DISCOVERY_ATTEMPTS,
        &PORTS_TRIED,
        &CONNECTED,
        &CONNECTIONS,
        &DISCONNECTIONS,
        &HEARTBEAT_RTT,
        &COMMANDS_SENT,
        &COMMANDS_FAILED,
        &DEVICE_COMMANDS_APPLIED,
        &DEVICE_COMMANDS_REJECTED,
    ];
}

/// Labels for a metric scoped to one serial port.
pub fn port_labels(port: &str) -> Vec<(&'static str, String)> {
    vec![("port", port.to_string())]
}

/// Port labels with additional key-value pairs.
pub fn port_labels_with(port: &str, extra: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
    let mut labels = port_labels(port);
    labels.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));
    labels
}

/// Describes all metrics.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus exporter serving `/metrics` on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_labels() {
        let labels = port_labels_with("/dev/ttyACM0", &[("cause", "heartbeat")]);
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&("port", "/dev/ttyACM0".to_string())));
        assert!(labels.contains(&("cause", "heartbeat".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::CONNECTED.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::HEARTBEAT_RTT.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::HEARTBEAT_RTT.unit, Some(Unit::Milliseconds));
        assert_eq!(metric_defs::PORTS_TRIED.labels, &["port", "outcome"]);
    }

    #[test]
    fn test_all_names_are_unique_and_namespaced() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert!(names.iter().all(|n| n.starts_with("relaybank.")));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_describe_without_recorder_is_noop() {
        describe_metrics();
    }
}

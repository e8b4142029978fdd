//! Serial port abstraction.
//!
//! [`PortOpener`] enumerates and opens ports; [`SerialLink`] is one open
//! port. [`SystemPortOpener`] is the real implementation over the
//! `serialport` crate.

use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPortType};

/// A serial port considered during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// OS name of the port (`/dev/ttyACM0`, `COM3`).
    pub port_name: String,
    /// Human-readable description.
    pub description: String,
    /// USB vendor id, if the port is a USB device.
    pub vid: Option<u16>,
    /// USB product id, if the port is a USB device.
    pub pid: Option<u16>,
}

impl DeviceCandidate {
    /// A candidate with only a name.
    pub fn new(port_name: impl Into<String>) -> Self {
        DeviceCandidate {
            port_name: port_name.into(),
            description: "Serial Port".to_string(),
            vid: None,
            pid: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set USB ids.
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.port_name, self.description)?;
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            write!(f, " [{:04x}:{:04x}]", vid, pid)?;
        }
        Ok(())
    }
}

/// An open serial port.
///
/// Reads block for at most the timeout given at open time and then fail
/// with [`io::ErrorKind::TimedOut`]. Dropping the link closes the port.
pub trait SerialLink: Read + Write + Send {
    /// Name of the port.
    fn port_name(&self) -> &str;

    /// Drop any bytes waiting in the receive buffer.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Enumerates and opens serial ports.
pub trait PortOpener: Send + Sync {
    /// List the ports visible to the OS, in enumeration order.
    fn list(&self) -> io::Result<Vec<DeviceCandidate>>;

    /// Open a port.
    fn open(&self, port_name: &str, baud_rate: u32, timeout: Duration) -> io::Result<Box<dyn SerialLink>>;
}

// ============================================================================
// serialport implementation
// ============================================================================

/// Ports provided by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn list(&self) -> io::Result<Vec<DeviceCandidate>> {
        let ports = serialport::available_ports().map_err(io::Error::from)?;

        Ok(ports
            .into_iter()
            .map(|port| {
                let candidate = DeviceCandidate::new(&port.port_name)
                    .with_description(port_description(&port.port_type));
                match &port.port_type {
                    SerialPortType::UsbPort(usb) => candidate.with_usb_ids(usb.vid, usb.pid),
                    _ => candidate,
                }
            })
            .collect())
    }

    fn open(&self, port_name: &str, baud_rate: u32, timeout: Duration) -> io::Result<Box<dyn SerialLink>> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)?;

        tracing::debug!(port = port_name, baud_rate, "opened serial port");
        Ok(Box::new(SystemLink {
            name: port_name.to_string(),
            port,
        }))
    }
}

fn port_description(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

struct SystemLink {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl Read for SystemLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SystemLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SystemLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

impl Drop for SystemLink {
    fn drop(&mut self) {
        tracing::debug!(port = %self.name, "closed serial port");
    }
}

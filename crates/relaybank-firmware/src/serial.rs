//! Serial console abstraction.
//!
//! Boards implement [`SerialIo`] over their UART or USB CDC driver. With the
//! `std` feature, [`IoSerial`] adapts anything that is `std::io::Read +
//! Write`, such as an open `serialport`.

use core::fmt::Debug;

/// Byte-level access to the serial console.
pub trait SerialIo {
    /// Error reported by the underlying driver.
    type Error: Debug;

    /// Copy bytes that have already arrived into `buf` without waiting.
    ///
    /// Returns 0 when the receive buffer is empty.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Block until written bytes have been handed to the hardware.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use io_adapter::IoSerial;

#[cfg(feature = "std")]
mod io_adapter {
    use std::io::{self, Read, Write};

    use super::SerialIo;

    /// [`SerialIo`] over a `std::io` stream.
    ///
    /// A read that would block or times out counts as "nothing available".
    #[derive(Debug)]
    pub struct IoSerial<T> {
        inner: T,
    }

    impl<T> IoSerial<T> {
        /// Wrap a stream.
        pub fn new(inner: T) -> Self {
            IoSerial { inner }
        }

        /// The wrapped stream.
        pub fn get_mut(&mut self) -> &mut T {
            &mut self.inner
        }

        /// Unwrap the stream.
        pub fn into_inner(self) -> T {
            self.inner
        }
    }

    impl<T: Read + Write> SerialIo for IoSerial<T> {
        type Error = io::Error;

        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                match self.inner.read(buf) {
                    Ok(n) => return Ok(n),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                        return Ok(0)
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            Write::write_all(&mut self.inner, data)
        }

        fn flush(&mut self) -> io::Result<()> {
            Write::flush(&mut self.inner)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        /// Returns its input once, then reports a timeout like a serial port.
        struct TimeoutAfter(Vec<u8>);

        impl Read for TimeoutAfter {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() {
                    return Err(io::ErrorKind::TimedOut.into());
                }
                let n = buf.len().min(self.0.len());
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0.drain(..n);
                Ok(n)
            }
        }

        impl Write for TimeoutAfter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        #[test]
        fn test_timeout_reads_as_empty() {
            let mut serial = IoSerial::new(TimeoutAfter(b"PING\r".to_vec()));
            let mut buf = [0u8; 16];
            assert_eq!(serial.read_available(&mut buf).unwrap(), 5);
            assert_eq!(serial.read_available(&mut buf).unwrap(), 0);
        }
    }
}

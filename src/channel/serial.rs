//! [`Channel`] over a serial port.

use std::fmt;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use log::trace;
use serialport::{ClearBuffer, SerialPort};

use super::Channel;

/// A [`Channel`] backed by an open and configured serial port.
///
/// The port is dropped, and therefore closed, by [`Channel::close`]. Any
/// operation after that fails with [`io::ErrorKind::NotConnected`].
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
}
impl SerialChannel {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        SerialChannel { port: Some(port) }
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }
}

impl Channel for SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let port = self.port()?;
        let written = port.write(bytes)?;
        port.flush()?;
        trace!("{} bytes written to serial port", written);
        Ok(written)
    }

    fn read_exact(&mut self, count: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let port = self.port()?;
        let mut buf = vec![0; count];
        let mut filled = 0;
        let deadline = Instant::now() + timeout;

        // The port timeout bounds a single `read`. Keep reading until the
        // buffer is full, shrinking the port timeout so that the whole call
        // never outlives `timeout`.
        while filled < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            port.set_timeout(deadline - now)?;
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    trace!("{} bytes read from serial port", n);
                    filled += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn reset_output_buffer(&mut self) -> io::Result<()> {
        self.port()?.clear(ClearBuffer::Output)?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(port) = self.port.take() {
            trace!("closing serial port {:?}", port.name());
        }
        Ok(())
    }
}

impl fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port {
            Some(port) => f
                .debug_tuple("SerialChannel")
                .field(&port.name())
                .field(&port.baud_rate())
                .field(&port.data_bits())
                .field(&port.stop_bits())
                .field(&port.parity())
                .field(&port.flow_control())
                .finish(),
            None => f.debug_tuple("SerialChannel").field(&"closed").finish(),
        }
    }
}

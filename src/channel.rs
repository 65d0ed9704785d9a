//! The byte channel the transfer session talks through.
//!
//! The session itself never opens ports. It receives something implementing
//! [`Channel`], owns it exclusively for the whole session and closes it
//! exactly once when the session ends, whatever the outcome.
//!
//! [`SerialChannel`] is the implementation used by the `echoboot` command line
//! tool.

use std::fmt;
use std::io;
use std::time::Duration;

mod serial;
#[cfg(test)]
pub(crate) mod scripted;

pub use serial::SerialChannel;

/// A duplex byte stream with timeout-bounded reads.
pub trait Channel {
    /// Write `bytes` to the channel and return how many of them were actually
    /// written. This can be less than `bytes.len()`.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Read `count` bytes, blocking until they are all available or `timeout`
    /// has elapsed. On timeout the bytes received so far are returned, which
    /// may be fewer than `count` or none at all.
    fn read_exact(&mut self, count: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Read a single byte. Fails with [`io::ErrorKind::TimedOut`] when nothing
    /// arrived within `timeout`.
    fn read_one(&mut self, timeout: Duration) -> io::Result<u8> {
        self.read_exact(1, timeout)?
            .first()
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no byte received"))
    }

    /// Discard any received but unread bytes.
    fn reset_input_buffer(&mut self) -> io::Result<()>;

    /// Discard any bytes written but not yet transmitted.
    fn reset_output_buffer(&mut self) -> io::Result<()>;

    /// Release the channel. Further operations fail.
    fn close(&mut self) -> io::Result<()>;
}

impl fmt::Debug for dyn Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Channel")
    }
}

//! In-memory [`Channel`] standing in for the receiver in unit tests.
//!
//! It behaves like a well-behaved target by default: every written byte is
//! echoed back and, once the whole announced payload has been echoed, the
//! completion marker becomes readable. Misbehaviours are switched on with the
//! builder-style methods. Everything the session does is recorded in a
//! [`Journal`] that stays readable after the session consumed the channel.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use super::Channel;
use crate::transfer::{COMPLETION_MARKER, HEADER_LEN};

/// What the scripted channel observed during a session.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    /// Every successful write, in order, as actually accepted by the channel.
    pub writes: Vec<Vec<u8>>,
    pub input_resets: usize,
    pub output_resets: usize,
    pub closes: usize,
}
impl Journal {
    /// All written bytes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

pub(crate) struct ScriptedChannel {
    journal: Rc<RefCell<Journal>>,
    pending: VecDeque<u8>,
    header: Vec<u8>,
    /// Payload length announced by the header, once fully written.
    announced: Option<usize>,
    echoed: usize,
    marker_sent: bool,

    marker: Option<u8>,
    mute_from: Option<usize>,
    max_write: Option<usize>,
    corrupt_write: Option<usize>,
    short_write: Option<usize>,
    overlong_write: Option<usize>,
    overlong_pending: bool,
}
impl ScriptedChannel {
    pub fn new() -> (Self, Rc<RefCell<Journal>>) {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let channel = ScriptedChannel {
            journal: Rc::clone(&journal),
            pending: VecDeque::new(),
            header: Vec::with_capacity(HEADER_LEN),
            announced: None,
            echoed: 0,
            marker_sent: false,
            marker: Some(COMPLETION_MARKER),
            mute_from: None,
            max_write: None,
            corrupt_write: None,
            short_write: None,
            overlong_write: None,
            overlong_pending: false,
        };
        (channel, journal)
    }

    /// Never answer anything.
    pub fn silent(self) -> Self {
        self.mute_from(0)
    }

    /// Stop answering from the `index`-th write on (0 is the header).
    pub fn mute_from(mut self, index: usize) -> Self {
        self.mute_from = Some(index);
        self
    }

    /// Byte sent after the payload echo, `None` to send nothing.
    pub fn marker(mut self, marker: Option<u8>) -> Self {
        self.marker = marker;
        self
    }

    /// Accept at most `max` bytes per write.
    pub fn max_write(mut self, max: usize) -> Self {
        self.max_write = Some(max);
        self
    }

    /// Flip the first echoed byte of the `index`-th write (0 is the header).
    pub fn corrupt_write(mut self, index: usize) -> Self {
        self.corrupt_write = Some(index);
        self
    }

    /// Drop the last echoed byte of the `index`-th write.
    pub fn short_write(mut self, index: usize) -> Self {
        self.short_write = Some(index);
        self
    }

    /// Echo one byte more than the `index`-th write, and hand it out with
    /// the echo even though the reader asked for fewer bytes.
    pub fn overlong_write(mut self, index: usize) -> Self {
        self.overlong_write = Some(index);
        self
    }

    /// Bytes sitting in the input buffer before the session starts.
    pub fn stale_input(mut self, bytes: &[u8]) -> Self {
        self.pending.extend(bytes);
        self
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.journal.borrow().closes > 0 {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "closed"));
        }
        Ok(())
    }

    fn track(&mut self, accepted: &[u8]) {
        let mut rest = accepted;
        if self.announced.is_none() {
            let take = rest.len().min(HEADER_LEN - self.header.len());
            self.header.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.header.len() == HEADER_LEN {
                let mut be = [0; HEADER_LEN];
                be.copy_from_slice(&self.header);
                self.announced = Some(u32::from_be_bytes(be) as usize);
            }
        }
        self.echoed += rest.len();
    }
}

impl Channel for ScriptedChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let accepted = match self.max_write {
            Some(max) => &bytes[..bytes.len().min(max)],
            None => bytes,
        };

        let index = self.journal.borrow().writes.len();
        self.journal.borrow_mut().writes.push(accepted.to_vec());
        if self.mute_from.map_or(false, |from| index >= from) {
            return Ok(accepted.len());
        }

        let mut echo = accepted.to_vec();
        if self.corrupt_write == Some(index) {
            if let Some(first) = echo.first_mut() {
                *first = !*first;
            }
        }
        if self.short_write == Some(index) {
            echo.pop();
        }
        if self.overlong_write == Some(index) {
            echo.push(0);
            self.overlong_pending = true;
        }
        self.pending.extend(echo);
        self.track(accepted);

        if !self.marker_sent && self.announced == Some(self.echoed) {
            self.marker_sent = true;
            self.pending.extend(self.marker);
        }
        Ok(accepted.len())
    }

    fn read_exact(&mut self, count: usize, _timeout: Duration) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        let wanted = if self.overlong_pending {
            self.overlong_pending = false;
            count + 1
        } else {
            count
        };
        let n = wanted.min(self.pending.len());
        Ok(self.pending.drain(..n).collect())
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.pending.clear();
        self.journal.borrow_mut().input_resets += 1;
        Ok(())
    }

    fn reset_output_buffer(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.journal.borrow_mut().output_resets += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.journal.borrow_mut().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(1);

    #[test]
    fn echoes_and_sends_marker_after_payload() {
        let (mut channel, journal) = ScriptedChannel::new();
        channel.write(&[0, 0, 0, 2]).unwrap();
        assert_eq!(channel.read_exact(4, T).unwrap(), vec![0, 0, 0, 2]);
        channel.write(&[7, 8]).unwrap();
        assert_eq!(channel.read_exact(2, T).unwrap(), vec![7, 8]);
        assert_eq!(channel.read_one(T).unwrap(), b'#');
        assert_eq!(journal.borrow().writes.len(), 2);
    }

    #[test]
    fn silent_channel_times_out() {
        let (channel, _journal) = ScriptedChannel::new();
        let mut channel = channel.silent();
        channel.write(&[0, 0, 0, 1]).unwrap();
        assert!(channel.read_exact(4, T).unwrap().is_empty());
        let err = channel.read_one(T).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn operations_fail_once_closed() {
        let (mut channel, journal) = ScriptedChannel::new();
        channel.close().unwrap();
        assert_eq!(
            channel.write(&[1]).unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert_eq!(journal.borrow().closes, 1);
    }
}

//! Errors reported by the transfer session.

use std::io;

use thiserror::Error;

/// Reasons for a transfer session to end in the `Failed` state.
///
/// Every one of these aborts the session immediately. Nothing is retried
/// internally; the caller decides whether to start a brand new session.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The 4 bytes echoed back by the receiver differ from the length header
    /// that was sent.
    #[error("length header echo mismatch: sent {sent:02X?}, received {received:02X?}")]
    HeaderMismatch { sent: [u8; 4], received: [u8; 4] },

    /// The echo of a payload write differs from the bytes written. `offset`
    /// is the payload offset at which that write started.
    #[error("payload echo mismatch for the write starting at offset {offset}")]
    ChunkMismatch { offset: usize },

    /// A blocking read did not complete within the configured timeout.
    #[error("timed out waiting for the receiver")]
    ChannelTimeout,

    /// The byte received in place of the completion marker was not `#`.
    #[error("unexpected completion marker 0x{0:02X}")]
    UnexpectedMarker(u8),

    /// The payload length cannot be represented in the 4 byte header.
    #[error("payload of {0} bytes does not fit in a 32 bit length header")]
    PayloadTooLarge(usize),

    /// The chunk size must be at least 1 byte.
    #[error("chunk size must be at least 1 byte")]
    InvalidChunkSize,

    /// Any other failure of the underlying channel.
    #[error("channel error: {0}")]
    Channel(#[source] io::Error),
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransferError::ChannelTimeout,
            _ => TransferError::Channel(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_io_maps_to_channel_timeout() {
        let err: TransferError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, TransferError::ChannelTimeout));
    }

    #[test]
    fn other_io_errors_are_kept() {
        let err: TransferError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        match err {
            TransferError::Channel(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn marker_is_displayed_in_hex() {
        assert_eq!(
            TransferError::UnexpectedMarker(b'x').to_string(),
            "unexpected completion marker 0x78"
        );
    }
}

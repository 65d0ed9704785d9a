//! States for the `echoboot` transfer session state machine.
//!
//! This modules is private and restricted to the
//! [`transfer`](crate::transfer) scope. The public interface of the transfer
//! session is provided by [`transfer`](crate::transfer).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::io;

use hexplay::HexViewBuilder;
use log::{debug, error, info, log_enabled, trace, warn, Level::Debug};

use super::events::*;
use super::framing::{self, ACKNOWLEDGMENT, COMPLETION_MARKER, HEADER_LEN};
use super::state_machine::Context;
use crate::channel::Channel;
use crate::error::TransferError;
use crate::settings::MarkerPolicy;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable: std::fmt::Debug {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state does its part of the exchange and requests
    /// a transition to a new state by returning the appropriate `event`. The
    /// `event` is then consumed to create the new `state` using the
    /// corresponding [`From`] trait implementation.
    fn run(&mut self, context: &mut Context) -> Event;
}

// AwaitingHeaderEcho State ====================================================

/// The initial state of a transfer session.
///
/// Discards stale bytes on both directions of the channel, announces the
/// payload size with the 4 byte big-endian length header and waits for the
/// receiver to echo it back.
///
///  * **[`HeaderVerifiedEvent`] => [`SendingChunksState`]** when the echo
///    matches the header,
///  * **[`FailEvent`] => [`FailedState`]** on a mismatch, a timeout, a
///    payload too large for the header or an invalid chunk size.
#[derive(Debug)]
pub(crate) struct AwaitingHeaderEchoState {
    /// Consumed and moved upon the transition out of this state.
    pub channel: Option<Box<dyn Channel>>,
}
impl Runnable for AwaitingHeaderEchoState {
    fn run(&mut self, context: &mut Context) -> Event {
        info!("=> Awaiting Header Echo");

        if let Some(mut channel) = self.channel.take() {
            return match exchange_header(channel.as_mut(), context) {
                Ok(()) => Event::HeaderVerified(HeaderVerifiedEvent { channel }),
                Err(error) => Event::Fail(FailEvent { channel, error }),
            };
        }

        // We should never reach here!
        unreachable!()
    }
}

// SendingChunks State =========================================================

/// Pushes the payload, chunk after chunk, verifying the echo of every write
/// before the next one.
///
///  * **[`ChunksSentEvent`] => [`AwaitingCompletionMarkerState`]** once the
///    whole payload went through,
///  * **[`FailEvent`] => [`FailedState`]** on the first echo mismatch or
///    channel error. Nothing else is written after that.
#[derive(Debug)]
pub(crate) struct SendingChunksState {
    pub channel: Option<Box<dyn Channel>>,
}
impl Runnable for SendingChunksState {
    fn run(&mut self, context: &mut Context) -> Event {
        info!("=> Sending Chunks");

        if let Some(mut channel) = self.channel.take() {
            return match send_chunks(channel.as_mut(), context) {
                Ok(transferred) => Event::ChunksSent(ChunksSentEvent {
                    channel,
                    transferred,
                }),
                Err(error) => Event::Fail(FailEvent { channel, error }),
            };
        }

        unreachable!()
    }
}

// AwaitingCompletionMarker State ==============================================

/// Waits for the receiver to confirm, with a single `#`, that it processed the
/// whole payload.
///
///  * **[`MarkerReceivedEvent`] => [`AcknowledgingState`]** when `#` arrives,
///    or, under [`MarkerPolicy::Lenient`], whatever arrives,
///  * **[`FailEvent`] => [`FailedState`]** otherwise.
#[derive(Debug)]
pub(crate) struct AwaitingCompletionMarkerState {
    pub channel: Option<Box<dyn Channel>>,
    pub transferred: usize,
}
impl Runnable for AwaitingCompletionMarkerState {
    fn run(&mut self, context: &mut Context) -> Event {
        info!("=> Awaiting Completion Marker");

        if let Some(mut channel) = self.channel.take() {
            let transferred = self.transferred;
            let rejected = match channel.read_one(context.timeout) {
                Ok(COMPLETION_MARKER) => {
                    debug!("receiver reported completion");
                    None
                }
                Ok(byte) => Some(TransferError::UnexpectedMarker(byte)),
                Err(e) => Some(TransferError::from(e)),
            };

            return match rejected {
                None => Event::MarkerReceived(MarkerReceivedEvent {
                    channel,
                    transferred,
                }),
                Some(error @ TransferError::UnexpectedMarker(_))
                | Some(error @ TransferError::ChannelTimeout)
                    if context.marker_policy == MarkerPolicy::Lenient =>
                {
                    warn!("{}, acknowledging anyway", error);
                    Event::MarkerReceived(MarkerReceivedEvent {
                        channel,
                        transferred,
                    })
                }
                Some(error) => Event::Fail(FailEvent { channel, error }),
            };
        }

        unreachable!()
    }
}

// Acknowledging State =========================================================

/// Sends the final `D`, letting the receiver leave its loop.
///
///  * **[`AcknowledgedEvent`] => [`ClosedState`]**,
///  * **[`FailEvent`] => [`FailedState`]** if the byte could not be written.
#[derive(Debug)]
pub(crate) struct AcknowledgingState {
    pub channel: Option<Box<dyn Channel>>,
    pub transferred: usize,
}
impl Runnable for AcknowledgingState {
    fn run(&mut self, _context: &mut Context) -> Event {
        info!("=> Acknowledging");

        if let Some(mut channel) = self.channel.take() {
            return match write_all(channel.as_mut(), &[ACKNOWLEDGMENT]) {
                Ok(()) => Event::Acknowledged(AcknowledgedEvent {
                    channel,
                    transferred: self.transferred,
                }),
                Err(error) => Event::Fail(FailEvent { channel, error }),
            };
        }

        unreachable!()
    }
}

// Closed State ================================================================

/// Terminal state of a successful session.
///
/// Like [`FailedState`], it runs in two phases: the first run releases the
/// channel and fires [`ExitEvent`], after which `released` is set and the
/// session returns.
#[derive(Debug)]
pub(crate) struct ClosedState {
    pub channel: Option<Box<dyn Channel>>,
    pub transferred: usize,
    pub released: bool,
}
impl Runnable for ClosedState {
    fn run(&mut self, _context: &mut Context) -> Event {
        info!("=> Closed, {} bytes transferred", self.transferred);
        release(&mut self.channel);
        Event::Exit(ExitEvent)
    }
}

// Failed State ================================================================

/// Terminal state of a session that hit an error.
#[derive(Debug)]
pub(crate) struct FailedState {
    pub channel: Option<Box<dyn Channel>>,
    pub error: TransferError,
    pub released: bool,
}
impl Runnable for FailedState {
    fn run(&mut self, _context: &mut Context) -> Event {
        error!("=> Failed: {}", self.error);
        release(&mut self.channel);
        Event::Exit(ExitEvent)
    }
}

// =============================================================================
// Private stuff
// =============================================================================

fn exchange_header(channel: &mut dyn Channel, context: &Context) -> Result<(), TransferError> {
    if context.chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }
    let header = framing::header_for(context.payload.len())?;

    channel.reset_input_buffer()?;
    channel.reset_output_buffer()?;

    debug!(
        "announcing {} bytes with header {:02X?}",
        context.payload.len(),
        header
    );
    write_all(channel, &header)?;

    let echo = channel.read_exact(HEADER_LEN, context.timeout)?;
    trace!("header echo: {:02X?}", echo);
    if echo.len() < HEADER_LEN {
        return Err(TransferError::ChannelTimeout);
    }
    // A channel handing out more than asked for is a mismatch too.
    if echo[..] != header[..] {
        dump_mismatch(0, &header, &echo);
        let mut received = [0; HEADER_LEN];
        received.copy_from_slice(&echo[..HEADER_LEN]);
        return Err(TransferError::HeaderMismatch {
            sent: header,
            received,
        });
    }
    Ok(())
}

/// Returns the number of bytes written and verified.
fn send_chunks(channel: &mut dyn Channel, context: &mut Context) -> Result<usize, TransferError> {
    let Context {
        payload,
        chunk_size,
        timeout,
        progress,
        ..
    } = context;
    let payload = payload.as_bytes();
    let total = payload.len();
    let mut transferred = 0;

    for chunk in framing::split_into_chunks(total, *chunk_size) {
        trace!("chunk {:?} of {}", chunk, total);
        let mut offset = chunk.start;

        // The channel may accept only part of the chunk. What it accepted is
        // what gets echoed and verified; the rest goes in the next write.
        while offset < chunk.end {
            let pending = &payload[offset..chunk.end];
            let written = channel.write(pending)?.min(pending.len());
            if written == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "channel accepted no payload bytes",
                )
                .into());
            }

            let sent = &pending[..written];
            let echo = channel.read_exact(written, *timeout)?;
            if echo.len() < written {
                return Err(TransferError::ChannelTimeout);
            }
            if echo[..] != sent[..] {
                dump_mismatch(offset, sent, &echo);
                return Err(TransferError::ChunkMismatch { offset });
            }

            offset += written;
            transferred += written;
            if let Some(progress) = progress.as_mut() {
                progress(transferred, total);
            }
        }
    }

    debug!("{} payload bytes verified", transferred);
    Ok(transferred)
}

fn write_all(channel: &mut dyn Channel, mut bytes: &[u8]) -> Result<(), TransferError> {
    while !bytes.is_empty() {
        match channel.write(bytes)? {
            0 => {
                return Err(
                    io::Error::new(io::ErrorKind::WriteZero, "channel accepted no bytes").into(),
                )
            }
            n => bytes = &bytes[n.min(bytes.len())..],
        }
    }
    Ok(())
}

fn release(channel: &mut Option<Box<dyn Channel>>) {
    if let Some(mut channel) = channel.take() {
        if let Err(ref e) = channel.close() {
            warn!("error while closing the channel: {}", e);
        }
    }
}

/// Dump both sides of a failed echo check as hex tables for debugging.
fn dump_mismatch(offset: usize, sent: &[u8], received: &[u8]) {
    if log_enabled!(Debug) {
        let sent = HexViewBuilder::new(sent)
            .address_offset(offset)
            .row_width(16)
            .finish();
        let received = HexViewBuilder::new(received)
            .address_offset(offset)
            .row_width(16)
            .finish();
        debug!("sent:\n{}", sent);
        debug!("echoed:\n{}", received);
    }
}

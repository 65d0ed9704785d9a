//! Events for the `echoboot` transfer session state machine.
//!
//! This modules is private and restricted to the
//! [`transfer`](crate::transfer) scope. The public interface of the transfer
//! session is provided by [`transfer`](crate::transfer).
//!
//! Every event that leads to a non-terminal state carries the channel, which
//! is moved from one state to the next and never shared.
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::channel::Channel;
use crate::error::TransferError;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// HeaderVerifiedEvent =========================================================

/// Fired from [`AwaitingHeaderEchoState`](super::states::AwaitingHeaderEchoState)
/// once the receiver echoed the length header back unchanged. Triggers the
/// transition to `SendingChunks`.
#[derive(Debug)]
pub(crate) struct HeaderVerifiedEvent {
    pub channel: Box<dyn Channel>,
}

// ChunksSentEvent =============================================================

/// Fired when every chunk of the payload was written and its echo verified.
/// Triggers the transition to `AwaitingCompletionMarker`.
#[derive(Debug)]
pub(crate) struct ChunksSentEvent {
    pub channel: Box<dyn Channel>,
    /// Number of payload bytes written and verified.
    pub transferred: usize,
}

// MarkerReceivedEvent =========================================================

/// Fired when the receiver signalled completion (or when a wrong or missing
/// marker is tolerated by the lenient marker policy). Triggers the transition
/// to `Acknowledging`.
#[derive(Debug)]
pub(crate) struct MarkerReceivedEvent {
    pub channel: Box<dyn Channel>,
    pub transferred: usize,
}

// AcknowledgedEvent ===========================================================

/// Fired after the acknowledgment byte was written. Triggers the transition
/// to `Closed`.
#[derive(Debug)]
pub(crate) struct AcknowledgedEvent {
    pub channel: Box<dyn Channel>,
    pub transferred: usize,
}

// FailEvent ===================================================================

/// Fired from any non-terminal state on a contract violation or a channel
/// failure. Triggers the transition to `Failed`.
#[derive(Debug)]
pub(crate) struct FailEvent {
    pub channel: Box<dyn Channel>,
    pub error: TransferError,
}

// ExitEvent ===================================================================

/// The last event of a session, fired by a terminal state once it released
/// the channel. The session event loop returns right after it.
#[derive(Debug)]
pub(crate) struct ExitEvent;

// Events enum ==================================================================

/// Events that can be triggered within the transfer session state machine.
#[derive(Debug)]
pub(crate) enum Event {
    HeaderVerified(HeaderVerifiedEvent),
    ChunksSent(ChunksSentEvent),
    MarkerReceived(MarkerReceivedEvent),
    Acknowledged(AcknowledgedEvent),
    Fail(FailEvent),
    Exit(ExitEvent),
}

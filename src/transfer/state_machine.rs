//! `echoboot` transfer session state machine.
//!
//! A session pushes one payload to the receiver and is used once. It owns the
//! channel from start to end and moves it along the transitions, so exactly
//! one state has access to it at any time. Transitions only go forward.
//!
//! ```text
//!                        START
//!                          |
//!                          v
//!               .--------------------.
//!               | AwaitingHeaderEcho |----------------.
//!               '--------------------'                |
//!                          | header verified          |
//!                          v                          |
//!               .--------------------.                |
//!               |   SendingChunks    |--------------->|
//!               '--------------------'                |
//!                          | chunks sent              |
//!                          v                          |
//!            .--------------------------.             |
//!            | AwaitingCompletionMarker |------------>|
//!            '--------------------------'    fail     |
//!                          | marker received          |
//!                          v                          |
//!               .--------------------.                |
//!               |   Acknowledging    |--------------->|
//!               '--------------------'                |
//!                          | acknowledged             v
//!                          v                     .--------.
//!                     .--------.                 | Failed |
//!                     | Closed |                 '--------'
//!                     '--------'                      |
//!                          |     channel released     |
//!                          '----------> END <---------'
//! ```

use std::fmt;
use std::time::Duration;

use super::events::*;
use super::payload::Payload;
use super::states::*;
use crate::channel::Channel;
use crate::error::TransferError;
use crate::settings::{MarkerPolicy, Settings, DEFAULT_TIMEOUT};

// =============================================================================
// Public Interface
// =============================================================================

/// Called after every verified write with the number of bytes transferred so
/// far and the payload size.
pub type Progress = Box<dyn FnMut(usize, usize)>;

/// Represents the `echoboot` transfer session state machine. Use the
/// `factory()` function to get an instance then run it by calling its `run()`
/// method.
pub struct TransferSession {
    sm: SessionStates,
}
impl TransferSession {
    /// Report progress of the chunked transfer to `progress`.
    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'static) -> Self {
        if let SessionStates::AwaitingHeaderEcho(sm) = &mut self.sm {
            sm.context.progress = Some(Box::new(progress));
        }
        self
    }

    /// Runs the session event loop until the channel has been released by
    /// one of the terminal states.
    ///
    /// Returns the number of payload bytes written and verified, or the
    /// reason the session failed.
    pub fn run(self) -> Result<usize, TransferError> {
        let mut sm = self.sm;
        loop {
            sm = match sm.step() {
                SessionStates::Closed(sm) if sm.state.released => {
                    return Ok(sm.state.transferred)
                }
                SessionStates::Failed(sm) if sm.state.released => return Err(sm.state.error),
                next => next,
            };
        }
    }
}

/// Factory function for the transfer session state machine, configured from
/// `settings`. Use it to get an instance of the state machine, which you can
/// run by invoking its `run()` method.
pub fn factory(
    settings: &Settings,
    channel: Box<dyn Channel>,
    payload: impl Into<Payload>,
) -> TransferSession {
    let context = Context {
        payload: payload.into(),
        chunk_size: settings.chunk_size,
        timeout: settings.timeout,
        marker_policy: settings.marker_policy,
        progress: None,
    };
    TransferSession {
        // A session always starts by announcing the payload size.
        sm: SessionStates::AwaitingHeaderEcho(SessionSM::new(context, channel)),
    }
}

/// Push `payload` through `channel` in writes of at most `chunk_size` bytes,
/// using the default read timeout and the strict marker policy.
///
/// ```no_run
/// use echoboot::{run, SerialChannel, DEFAULT_CHUNK_SIZE};
///
/// let port = serialport::new("/dev/ttyUSB0", 115_200).open().unwrap();
/// let image = std::fs::read("kernel8.img").unwrap();
/// let sent = run(Box::new(SerialChannel::new(port)), image, DEFAULT_CHUNK_SIZE).unwrap();
/// println!("{} bytes transferred", sent);
/// ```
pub fn run(
    channel: Box<dyn Channel>,
    payload: impl Into<Payload>,
    chunk_size: usize,
) -> Result<usize, TransferError> {
    let context = Context {
        payload: payload.into(),
        chunk_size,
        timeout: DEFAULT_TIMEOUT,
        marker_policy: MarkerPolicy::Strict,
        progress: None,
    };
    TransferSession {
        sm: SessionStates::AwaitingHeaderEcho(SessionSM::new(context, channel)),
    }
    .run()
}

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Data shared by all states of a session.
pub(crate) struct Context {
    pub payload: Payload,
    pub chunk_size: usize,
    pub timeout: Duration,
    pub marker_policy: MarkerPolicy,
    pub progress: Option<Progress>,
}
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("payload", &self.payload)
            .field("chunk_size", &self.chunk_size)
            .field("timeout", &self.timeout)
            .field("marker_policy", &self.marker_policy)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine implementing the transfer session.
///
/// The generic type holds the current state next to the data shared by all
/// states, which also makes it easy to see both when debugging.
#[derive(Debug)]
struct SessionSM<S: Runnable> {
    context: Context,
    state: S,
}
impl<S: Runnable> SessionSM<S> {
    fn run(&mut self) -> Event {
        self.state.run(&mut self.context)
    }

    /// Consume this machine and the `event` into a machine in state `T`. Only
    /// transitions with a matching `From` implementation compile.
    fn transition<T: Runnable, E: Into<T>>(self, event: E) -> SessionSM<T> {
        SessionSM {
            context: self.context,
            state: event.into(),
        }
    }
}

/// The session starts in the `AwaitingHeaderEchoState`.
impl SessionSM<AwaitingHeaderEchoState> {
    fn new(context: Context, channel: Box<dyn Channel>) -> Self {
        SessionSM {
            context,
            state: AwaitingHeaderEchoState {
                channel: Some(channel),
            },
        }
    }
}

/// Wraps the state machine and its various states into a simple enum, which
/// is used for pattern matching during state transitions.
enum SessionStates {
    AwaitingHeaderEcho(SessionSM<AwaitingHeaderEchoState>),
    SendingChunks(SessionSM<SendingChunksState>),
    AwaitingCompletionMarker(SessionSM<AwaitingCompletionMarkerState>),
    Acknowledging(SessionSM<AcknowledgingState>),
    Closed(SessionSM<ClosedState>),
    Failed(SessionSM<FailedState>),
}
impl SessionStates {
    /// The unit of work in the session event loop: run the current state and
    /// decide the next one from the event it fired.
    fn step(self) -> Self {
        match self {
            SessionStates::AwaitingHeaderEcho(mut sm) => {
                let event = sm.run();
                match event {
                    Event::HeaderVerified(ev) => SessionStates::SendingChunks(sm.transition(ev)),
                    Event::Fail(ev) => SessionStates::Failed(sm.transition(ev)),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::SendingChunks(mut sm) => {
                let event = sm.run();
                match event {
                    Event::ChunksSent(ev) => {
                        SessionStates::AwaitingCompletionMarker(sm.transition(ev))
                    }
                    Event::Fail(ev) => SessionStates::Failed(sm.transition(ev)),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::AwaitingCompletionMarker(mut sm) => {
                let event = sm.run();
                match event {
                    Event::MarkerReceived(ev) => SessionStates::Acknowledging(sm.transition(ev)),
                    Event::Fail(ev) => SessionStates::Failed(sm.transition(ev)),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::Acknowledging(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Acknowledged(ev) => SessionStates::Closed(sm.transition(ev)),
                    Event::Fail(ev) => SessionStates::Failed(sm.transition(ev)),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::Closed(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(_) => {
                        sm.state.released = true;
                        SessionStates::Closed(sm)
                    }
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::Failed(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(_) => {
                        sm.state.released = true;
                        SessionStates::Failed(sm)
                    }
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<HeaderVerifiedEvent> for SendingChunksState {
    fn from(event: HeaderVerifiedEvent) -> SendingChunksState {
        SendingChunksState {
            channel: Some(event.channel),
        }
    }
}

impl From<ChunksSentEvent> for AwaitingCompletionMarkerState {
    fn from(event: ChunksSentEvent) -> AwaitingCompletionMarkerState {
        AwaitingCompletionMarkerState {
            channel: Some(event.channel),
            transferred: event.transferred,
        }
    }
}

impl From<MarkerReceivedEvent> for AcknowledgingState {
    fn from(event: MarkerReceivedEvent) -> AcknowledgingState {
        AcknowledgingState {
            channel: Some(event.channel),
            transferred: event.transferred,
        }
    }
}

impl From<AcknowledgedEvent> for ClosedState {
    fn from(event: AcknowledgedEvent) -> ClosedState {
        ClosedState {
            channel: Some(event.channel),
            transferred: event.transferred,
            released: false,
        }
    }
}

impl From<FailEvent> for FailedState {
    fn from(event: FailEvent) -> FailedState {
        FailedState {
            channel: Some(event.channel),
            error: event.error,
            released: false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

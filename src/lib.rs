//! Echoboot pushes a program image to an embedded target over a serial link,
//! for boards running a small receiver loop in their bootloader (or in the
//! previous kernel) that echoes back everything it receives.
//!
//! The protocol is deliberately minimal:
//!
//! * the host sends the image size as 4 bytes, in **big endian**, and the
//!   target echoes them back,
//! * the image follows in chunks of at most 1000 bytes, every chunk being
//!   echoed back before the next one is sent,
//! * the target sends `#` once it has the whole image, and the host answers
//!   with `D` so the target can leave its receive loop.
//!
//! Any echo that differs from what was sent aborts the transfer immediately.
//! There is no checksum and no retry; a failed transfer is simply started
//! again from scratch.
//!
//! The transfer is implemented as a state machine, in terms of **states** and
//! **transitions** between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions are permitted, and as many errors as
//!   possible are detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable.
//! * Data is transferred from one state to the next by attaching it to the
//!   transition event. Such data is statically defined as part of the event
//!   type.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern. Only transitions for which the `From` trait is implemented are
//! authorized and any other transition is detected at compile-time as an
//! error.
//!
//! The serial port itself is hidden behind the [`Channel`] trait, so the
//! session can run over anything that reads and writes bytes.

mod channel;
mod error;
mod settings;
mod transfer;
mod utils;

pub use channel::{Channel, SerialChannel};
pub use error::TransferError;
pub use settings::{
    DataBits, FlowControl, MarkerPolicy, Parity, Settings, SettingsBuilder, StopBits,
    DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT,
};
pub use transfer::{
    decode_length_header, encode_length_header, factory, header_for, run, split_into_chunks,
    Payload, Progress, TransferSession, ACKNOWLEDGMENT, COMPLETION_MARKER, DEFAULT_CHUNK_SIZE,
    HEADER_LEN,
};
pub use utils::{load_image, open_and_setup_port};

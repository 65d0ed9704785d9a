//! `echoboot` echo transfer protocol.
//!
//! **Example** - Running a session configured from `Settings`:
//! ```no_run
//! use echoboot::{self as eb, SerialChannel};
//!
//! let settings = eb::SettingsBuilder::new()
//!     .path("/dev/ttyUSB0")
//!     .image("kernel8.img")
//!     .finalize();
//! let port = eb::open_and_setup_port(&settings).unwrap();
//! let payload = eb::load_image("kernel8.img").unwrap();
//! let session = eb::factory(&settings, Box::new(SerialChannel::new(port)), payload);
//! match session.run() {
//!     Ok(sent) => println!("{} bytes transferred", sent),
//!     Err(e) => eprintln!("transfer failed: {}", e),
//! }
//! ```

mod events;
mod framing;
mod payload;
mod state_machine;
mod states;

pub use framing::{
    decode_length_header, encode_length_header, header_for, split_into_chunks, ACKNOWLEDGMENT,
    COMPLETION_MARKER, DEFAULT_CHUNK_SIZE, HEADER_LEN,
};
pub use payload::Payload;
pub use state_machine::{factory, run, Progress, TransferSession};

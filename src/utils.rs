//! Helper functions around the transfer session: opening the serial port and
//! loading the program image.

mod image;
mod ports;

pub use image::load_image;
pub use ports::open_and_setup_port;

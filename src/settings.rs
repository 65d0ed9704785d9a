//! Settings for the serial line and the echo transfer protocol.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::transfer::DEFAULT_CHUNK_SIZE;

/// Default baud rate used by the receiver loop on the target.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default bound on every blocking read from the serial port.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// Public Interface
// =============================================================================

/// What to do when the byte received at the end of the transfer is not the
/// completion marker `#` (or when no byte arrives at all).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MarkerPolicy {
    /// Fail the session with `UnexpectedMarker` or `ChannelTimeout`.
    Strict,
    /// Log a warning and send the acknowledgment anyway.
    Lenient,
}

/// Groups all settings related to the serial port used by `echoboot` and the
/// transfer protocol parameters.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// Upper bound for each blocking read. A read that exceeds it ends the
    /// session with `ChannelTimeout`.
    pub timeout: Duration,
    /// Maximum number of payload bytes sent in one write.
    pub chunk_size: usize,
    /// Handling of the end-of-transfer marker.
    pub marker_policy: MarkerPolicy,

    /// Path to the program image to be pushed.
    pub image: Option<String>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// use echoboot::SettingsBuilder;
///
/// let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
/// assert_eq!(settings.baud_rate, 115_200);
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: DEFAULT_BAUD_RATE,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                timeout: DEFAULT_TIMEOUT,
                chunk_size: DEFAULT_CHUNK_SIZE,
                marker_policy: MarkerPolicy::Strict,
                image: None,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().into_owned());
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set the bound on blocking reads
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Set the maximum number of bytes per payload write
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.settings.chunk_size = chunk_size;
        self
    }

    /// Set how a wrong or missing completion marker is handled
    pub fn marker_policy(mut self, marker_policy: MarkerPolicy) -> Self {
        self.settings.marker_policy = marker_policy;
        self
    }

    /// Set the path to the program image
    pub fn image<'a>(mut self, image: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.image = Some(image.into().into_owned());
        self
    }

    /// Build the settings
    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(3),
            chunk_size: 1000,
            marker_policy: MarkerPolicy::Strict,
            image: None,
            _private_use_builder: (),
        }
    )
}

#[test]
fn default_matches_new() {
    assert_eq!(
        SettingsBuilder::default().finalize(),
        SettingsBuilder::new().finalize()
    );
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn baud_rate() {
    let baud_rate = 230_400;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn line_parameters() {
    let settings = SettingsBuilder::new()
        .data_bits(DataBits::Seven)
        .flow_control(FlowControl::Hardware)
        .stop_bits(StopBits::Two)
        .parity(Parity::Even)
        .finalize();
    assert_eq!(settings.data_bits, DataBits::Seven);
    assert_eq!(settings.flow_control, FlowControl::Hardware);
    assert_eq!(settings.stop_bits, StopBits::Two);
    assert_eq!(settings.parity, Parity::Even);
}

#[test]
fn protocol_parameters() {
    let settings = SettingsBuilder::new()
        .timeout(Duration::from_millis(250))
        .chunk_size(64)
        .marker_policy(MarkerPolicy::Lenient)
        .finalize();
    assert_eq!(settings.timeout, Duration::from_millis(250));
    assert_eq!(settings.chunk_size, 64);
    assert_eq!(settings.marker_policy, MarkerPolicy::Lenient);
}

#[test]
fn image() {
    let settings = SettingsBuilder::new().image("kernel8.img").finalize();
    assert_eq!(settings.image.unwrap(), "kernel8.img");
}

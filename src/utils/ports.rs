//! Serial port device manipulation.

use log::{debug, info};
use serialport::SerialPort;

use crate::Settings;

/// Number of attempts at opening the port before giving up.
const OPEN_ATTEMPTS: usize = 4;

/// Delay between two attempts at opening the port.
const OPEN_RETRY_DELAY_MS: u64 = 1000;

//==============================================================================
// Public Interface
//==============================================================================

/// Open the serial port named in `settings` and configure it with the line
/// parameters and the read timeout from `settings`.
///
/// Opening is retried a few times, as USB serial devices often take a moment
/// to show up after the board is plugged in. Nothing is retried once the port
/// is open.
pub fn open_and_setup_port(settings: &Settings) -> Result<Box<dyn SerialPort>, serialport::Error> {
    use retry::{delay, retry_with_index};

    let path = settings.path.clone().ok_or_else(|| {
        serialport::Error::new(
            serialport::ErrorKind::InvalidInput,
            "no serial port device path was given",
        )
    })?;

    let result = retry_with_index(
        delay::Fixed::from_millis(OPEN_RETRY_DELAY_MS).take(OPEN_ATTEMPTS - 1),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect {}", index);
            serialport::new(&path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .timeout(settings.timeout)
                .open()
        },
    );
    match result {
        Ok(mut port) => {
            // Configure the port again with the values in `settings`, some
            // drivers ignore part of what was requested at `open`.
            port.set_baud_rate(settings.baud_rate)?;
            port.set_data_bits(settings.data_bits)?;
            port.set_stop_bits(settings.stop_bits)?;
            port.set_parity(settings.parity)?;
            port.set_flow_control(settings.flow_control)?;
            port.set_timeout(settings.timeout)?;

            info!("Connected to {} at {} baud", path, port.baud_rate()?);
            debug!("data_bits    : {:#?}", port.data_bits()?);
            debug!("stop_bits    : {:#?}", port.stop_bits()?);
            debug!("parity       : {:#?}", port.parity()?);
            debug!("flow control : {:#?}", port.flow_control()?);
            debug!("timeout      : {:?}", port.timeout());

            if port.baud_rate()? != settings.baud_rate {
                return Err(serialport::Error::new(
                    serialport::ErrorKind::InvalidInput,
                    format!(
                        "failed to set the baud rate to {}, it is probably not a valid one",
                        settings.baud_rate
                    ),
                ));
            }

            Ok(port)
        }
        Err(err) => match err {
            retry::Error::Operation {
                error,
                total_delay,
                tries,
            } => {
                info!(
                    "Failed to open the port after {:?} and {} tries: {}",
                    total_delay, tries, error,
                );
                Err(error)
            }
            retry::Error::Internal(_) => {
                info!("Internal retry error while opening port");
                Err(serialport::Error::new(
                    serialport::ErrorKind::Unknown,
                    "internal error while retrying to open the port",
                ))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SettingsBuilder;

    #[test]
    fn missing_path_is_invalid_input() {
        let settings = SettingsBuilder::new().finalize();
        let err = open_and_setup_port(&settings).map(|_| ()).unwrap_err();
        assert_eq!(err.kind(), serialport::ErrorKind::InvalidInput);
    }
}

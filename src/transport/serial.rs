//! Serial port transport.

use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::Result;

/// Line speed of the PowerLinc serial interface.
pub const BAUD_RATE: u32 = 19_200;

/// Open the modem's serial device at 19200 8N1.
pub fn open_serial(path: &str) -> Result<SerialStream> {
    tracing::debug!("Opening serial port {}", path);
    let port = tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()
        .map_err(std::io::Error::from)?;
    Ok(port)
}

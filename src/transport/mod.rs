//! Transport module - the byte stream the modem is reached through.
//!
//! Any duplex async stream works: a serial port, a TCP bridge to a serial
//! server, or `tokio::io::duplex` in tests.

#[cfg(feature = "serial")]
mod serial;

use tokio::io::{AsyncRead, AsyncWrite};

#[cfg(feature = "serial")]
pub use serial::{open_serial, BAUD_RATE};

/// A duplex byte stream connected to a modem.
pub trait Transport: AsyncRead + AsyncWrite + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + 'static {}

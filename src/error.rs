//! Error types for insteon-plm.

use thiserror::Error;

use crate::protocol::Command;

/// Failure to turn a byte sequence into a packet.
///
/// Framing errors stay local to the frame reader: they are logged and the
/// offending bytes are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The first byte of a frame was not the start marker.
    #[error("expected start byte 0x02, got 0x{0:02x}")]
    BadStart(u8),

    /// The command byte is not in the command length table.
    #[error("unknown command 0x{0:02x}")]
    UnknownCommand(u8),

    /// The stream ended in the middle of a frame.
    #[error("stream ended with {0} bytes of an incomplete frame")]
    Truncated(usize),

    /// The frame had the right length but its payload could not be parsed.
    #[error("invalid {command} payload: {reason}")]
    InvalidPayload {
        command: Command,
        reason: &'static str,
    },
}

/// Main error type for all modem operations.
#[derive(Debug, Error)]
pub enum ModemError {
    /// I/O error while opening or driving the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing error.
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// The packet payload cannot be marshaled for its command.
    #[error("Cannot encode {command} packet: {reason}")]
    Encode {
        command: Command,
        reason: &'static str,
    },

    /// The dispatcher did not accept the request in time.
    #[error("Timed out queueing packet for write")]
    WriteTimeout,

    /// No acknowledgement arrived in time.
    #[error("Timed out waiting for acknowledgement")]
    AckTimeout,

    /// No unsolicited packet or device message arrived in time.
    #[error("Timed out waiting for incoming message")]
    ReadTimeout,

    /// Writing the encoded frame to the transport failed.
    #[error("Write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// The modem or remote device answered with a negative acknowledgement.
    #[error("Negative acknowledgement for {0}")]
    Nak(Command),

    /// The modem refused to add a link record.
    #[error("Failed to add link")]
    LinkAddFailed,

    /// The modem refused to delete a link record it had just listed.
    #[error("Failed to remove link")]
    LinkRemoveFailed,

    /// A reply carried a payload of the wrong kind for its command.
    #[error("Unexpected payload in {0} reply")]
    UnexpectedPayload(Command),

    /// The modem capability is not implemented.
    #[error("IM command not implemented")]
    NotImplemented,

    /// The dispatcher has shut down.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl ModemError {
    /// Check if this is one of the timeout conditions.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ModemError::WriteTimeout | ModemError::AckTimeout | ModemError::ReadTimeout
        )
    }
}

/// Result type alias using ModemError.
pub type Result<T> = std::result::Result<T, ModemError>;

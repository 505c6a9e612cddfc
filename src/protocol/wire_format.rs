//! Wire format constants and the command length table.
//!
//! Every frame exchanged with the modem has the same two-byte header:
//! ```text
//! ┌──────┬─────────┬──────────────────────────────┐
//! │ 0x02 │ Command │ Fixed-length body            │
//! │ 1 B  │ 1 B     │ COMMAND LENGTH TABLE bytes   │
//! └──────┴─────────┴──────────────────────────────┘
//! ```
//!
//! There is no length byte. The body length is recovered from the command,
//! with one extension rule: a `0x62` frame whose message flags (frame offset
//! 5) mark an extended message carries 14 more bytes.
//!
//! Replies to host-originated commands (`0x60` and above) echo the request
//! and end with an ack (`0x06`) or nak (`0x15`) status byte. The table
//! lengths include that status byte.

use std::fmt;

/// Start-of-frame marker.
pub const START_BYTE: u8 = 0x02;

/// Header size in bytes (start marker + command).
pub const HEADER_SIZE: usize = 2;

/// Number of user data bytes carried by an extended Insteon message.
pub const EXTENDED_DATA_LEN: usize = 14;

/// Frame offset of the message flags byte in a `0x62` frame.
pub const SEND_FLAGS_OFFSET: usize = 5;

/// Trailing status byte of a reply to a host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ack(pub u8);

impl Ack {
    /// Positive acknowledgement.
    pub const ACK: Ack = Ack(0x06);
    /// Negative acknowledgement.
    pub const NAK: Ack = Ack(0x15);

    /// Check if this is a negative acknowledgement.
    #[inline]
    pub fn is_nak(self) -> bool {
        self == Ack::NAK
    }

    /// Check if this is a positive acknowledgement.
    #[inline]
    pub fn is_ack(self) -> bool {
        self == Ack::ACK
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Ack::ACK => f.write_str("ACK"),
            Ack::NAK => f.write_str("NAK"),
            Ack(other) => write!(f, "0x{:02x}", other),
        }
    }
}

/// Generates the [`Command`] enum together with its byte value, name and
/// fixed body length, so the length table cannot drift from the enum.
macro_rules! commands {
    ($($(#[$doc:meta])* $variant:ident = $byte:literal, $name:literal, $len:literal;)*) => {
        /// Modem command identifier (second byte of every frame).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Command {
            $($(#[$doc])* $variant = $byte,)*
        }

        impl Command {
            /// Every command in the length table.
            pub const ALL: &'static [Command] = &[$(Command::$variant,)*];

            /// Look up a command byte. Returns `None` for unknown commands.
            pub const fn from_byte(byte: u8) -> Option<Command> {
                match byte {
                    $($byte => Some(Command::$variant),)*
                    _ => None,
                }
            }

            /// Number of bytes following the header, before any extension.
            pub const fn body_len(self) -> usize {
                match self {
                    $(Command::$variant => $len,)*
                }
            }

            /// Human readable name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Command::$variant => $name,)*
                }
            }
        }
    };
}

commands! {
    /// Standard Insteon message received.
    StandardMessageReceived = 0x50, "Standard Message Received", 9;
    /// Extended Insteon message received.
    ExtendedMessageReceived = 0x51, "Extended Message Received", 23;
    /// X10 message received.
    X10Received = 0x52, "X10 Received", 2;
    /// All-linking session completed.
    AllLinkComplete = 0x53, "All-Link Complete", 8;
    /// Set button event on the modem.
    ButtonEvent = 0x54, "Button Event", 1;
    /// Modem was reset by the user.
    UserReset = 0x55, "User Reset", 0;
    /// All-link cleanup failure report.
    AllLinkCleanupFailure = 0x56, "All-Link Cleanup Failure", 5;
    /// All-link record response.
    AllLinkRecordResponse = 0x57, "All-Link Record Response", 8;
    /// All-link cleanup status report.
    AllLinkCleanupStatus = 0x58, "All-Link Cleanup Status", 1;
    /// Get modem info.
    GetInfo = 0x60, "Get IM Info", 7;
    /// Send all-link command.
    SendAllLinkCommand = 0x61, "Send All-Link Command", 4;
    /// Send Insteon message.
    SendInsteonMessage = 0x62, "Send INSTEON Message", 7;
    /// Send X10 message.
    SendX10 = 0x63, "Send X10", 3;
    /// Start all-linking.
    StartAllLinking = 0x64, "Start All-Linking", 3;
    /// Cancel all-linking.
    CancelAllLinking = 0x65, "Cancel All-Linking", 1;
    /// Set host device category.
    SetHostCategory = 0x66, "Set Host Device Category", 4;
    /// Reset the modem.
    Reset = 0x67, "Reset IM", 1;
    /// Set ack message byte.
    SetAckMessageByte = 0x68, "Set ACK Message Byte", 2;
    /// Get first all-link record.
    GetFirstAllLink = 0x69, "Get First All-Link Record", 1;
    /// Get next all-link record.
    GetNextAllLink = 0x6a, "Get Next All-Link Record", 1;
    /// Set modem configuration.
    SetConfig = 0x6b, "Set IM Configuration", 2;
    /// Get all-link record for the last sender.
    GetAllLinkForSender = 0x6c, "Get All-Link Record for Sender", 1;
    /// LED on.
    LedOn = 0x6d, "LED On", 1;
    /// LED off.
    LedOff = 0x6e, "LED Off", 1;
    /// Manage all-link record.
    ManageAllLinkRecord = 0x6f, "Manage All-Link Record", 10;
    /// Set nak message byte.
    SetNakMessageByte = 0x70, "Set NAK Message Byte", 2;
    /// Set ack message two bytes.
    SetAckMessageTwoBytes = 0x71, "Set ACK Message Two Bytes", 3;
    /// Put the modem RF radio to sleep.
    RfSleep = 0x72, "RF Sleep", 1;
    /// Get modem configuration.
    GetConfig = 0x73, "Get IM Configuration", 4;
}

impl Command {
    /// Command byte on the wire.
    #[inline]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Inbound device message (`0x50` standard, `0x51` extended).
    #[inline]
    pub const fn is_device_message(self) -> bool {
        matches!(
            self,
            Command::StandardMessageReceived | Command::ExtendedMessageReceived
        )
    }

    /// Unsolicited modem notice (`0x52..=0x58`).
    #[inline]
    pub const fn is_modem_class(self) -> bool {
        let b = self.byte();
        0x52 <= b && b <= 0x58
    }

    /// Host-originated command whose reply ends with an ack/nak byte.
    #[inline]
    pub const fn has_ack(self) -> bool {
        self.byte() >= 0x60
    }

    /// Body length of the host request, which carries no status byte.
    ///
    /// Shorter than the reply body for commands whose reply carries data
    /// (`0x60` info, `0x73` configuration).
    pub const fn request_len(self) -> usize {
        match self {
            Command::GetInfo | Command::GetConfig => 0,
            _ => self.body_len() - self.has_ack() as usize,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.byte())
    }
}

impl TryFrom<u8> for Command {
    type Error = crate::error::FramingError;

    fn try_from(byte: u8) -> std::result::Result<Self, Self::Error> {
        Command::from_byte(byte).ok_or(crate::error::FramingError::UnknownCommand(byte))
    }
}

//! Packet struct with typed payload accessors.
//!
//! A [`Packet`] is one frame exchanged with the modem. Its payload shape is
//! fixed by the command, see [`Payload`].
//!
//! # Example
//!
//! ```
//! use insteon_plm::protocol::{Address, Command, Message, Packet, Payload};
//!
//! let msg = Message::standard(Address::new(0x01, 0x02, 0x03), [0x11, 0xff]);
//! let packet = Packet::new(Command::SendInsteonMessage, Payload::Message(msg)).with_retries(3);
//!
//! assert_eq!(packet.command, Command::SendInsteonMessage);
//! assert!(packet.message().is_some());
//! ```

use std::fmt;

use bytes::Bytes;

use super::link::LinkRecord;
use super::message::{Address, Message};
use super::wire_format::{Ack, Command};

/// Modem identification returned by [`Command::GetInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemInfo {
    pub address: Address,
    pub category: u8,
    pub subcategory: u8,
    pub firmware: u8,
}

/// Encoded size of [`ModemInfo`].
pub const MODEM_INFO_SIZE: usize = 6;

impl fmt::Display for ModemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IM {} category {:02x}.{:02x} firmware {:02x}",
            self.address, self.category, self.subcategory, self.firmware
        )
    }
}

/// Command specific packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Insteon device message (`0x50`, `0x51`, `0x62`).
    Message(Message),
    /// Link database record (`0x57`).
    LinkRecord(LinkRecord),
    /// Modem identification (`0x60`).
    ModemInfo(ModemInfo),
    /// Anything else, ack byte excluded.
    Raw(Bytes),
}

impl Payload {
    /// Empty raw payload, used by requests that carry no body.
    pub fn empty() -> Self {
        Payload::Raw(Bytes::new())
    }
}

impl From<Message> for Payload {
    fn from(msg: Message) -> Self {
        Payload::Message(msg)
    }
}

impl From<LinkRecord> for Payload {
    fn from(link: LinkRecord) -> Self {
        Payload::LinkRecord(link)
    }
}

impl From<ModemInfo> for Payload {
    fn from(info: ModemInfo) -> Self {
        Payload::ModemInfo(info)
    }
}

/// One frame exchanged with the modem.
///
/// `retry_count` is transient outbound state and is ignored by equality.
#[derive(Debug, Clone)]
pub struct Packet {
    pub command: Command,
    pub payload: Payload,
    /// Trailing status byte of replies to host commands.
    pub ack: Option<Ack>,
    /// How many times the request is resent after a nak.
    pub retry_count: u8,
}

impl Packet {
    /// Create a packet without ack byte.
    pub fn new(command: Command, payload: Payload) -> Self {
        Self {
            command,
            payload,
            ack: None,
            retry_count: 0,
        }
    }

    /// Create a body-less request for `command`.
    pub fn request(command: Command) -> Self {
        Self::new(command, Payload::empty())
    }

    /// Create a request with a raw body.
    pub fn with_raw(command: Command, body: impl Into<Bytes>) -> Self {
        Self::new(command, Payload::Raw(body.into()))
    }

    /// Set the retry counter.
    pub fn with_retries(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the trailing status byte.
    pub fn with_ack(mut self, ack: Ack) -> Self {
        self.ack = Some(ack);
        self
    }

    /// Check if this reply is a negative acknowledgement.
    #[inline]
    pub fn is_nak(&self) -> bool {
        self.ack.map(Ack::is_nak).unwrap_or(false)
    }

    /// Check if this reply is a positive acknowledgement.
    #[inline]
    pub fn is_ack(&self) -> bool {
        self.ack.map(Ack::is_ack).unwrap_or(false)
    }

    #[inline]
    pub fn message(&self) -> Option<&Message> {
        match &self.payload {
            Payload::Message(msg) => Some(msg),
            _ => None,
        }
    }

    #[inline]
    pub fn link_record(&self) -> Option<&LinkRecord> {
        match &self.payload {
            Payload::LinkRecord(link) => Some(link),
            _ => None,
        }
    }

    #[inline]
    pub fn modem_info(&self) -> Option<&ModemInfo> {
        match &self.payload {
            Payload::ModemInfo(info) => Some(info),
            _ => None,
        }
    }

    #[inline]
    pub fn raw(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.command == other.command && self.payload == other.payload && self.ack == other.ack
    }
}

impl Eq for Packet {}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        match &self.payload {
            Payload::Message(msg) => write!(f, " {}", msg)?,
            Payload::LinkRecord(link) => write!(f, " {}", link)?,
            Payload::ModemInfo(info) => write!(f, " {}", info)?,
            Payload::Raw(bytes) if bytes.is_empty() => {}
            Payload::Raw(bytes) => write!(f, " {}", HexBytes(bytes))?,
        }
        if let Some(ack) = self.ack {
            write!(f, " {}", ack)?;
        }
        Ok(())
    }
}

/// Formats a byte slice as space separated hex pairs.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_builders() {
        let packet = Packet::request(Command::GetFirstAllLink)
            .with_retries(2)
            .with_ack(Ack::NAK);

        assert_eq!(packet.retry_count, 2);
        assert!(packet.is_nak());
        assert!(!packet.is_ack());
        assert_eq!(packet.raw(), Some(&[][..]));
    }

    #[test]
    fn test_equality_ignores_retry_count() {
        let a = Packet::request(Command::GetInfo).with_retries(3);
        let b = Packet::request(Command::GetInfo);
        assert_eq!(a, b);
        assert_ne!(a, b.with_ack(Ack::ACK));
    }

    #[test]
    fn test_typed_accessors() {
        let link = LinkRecord::controller(1, Address::new(1, 2, 3), [0; 3]);
        let packet = Packet::new(Command::AllLinkRecordResponse, Payload::LinkRecord(link));

        assert_eq!(packet.link_record(), Some(&link));
        assert!(packet.message().is_none());
        assert!(packet.modem_info().is_none());
        assert!(packet.raw().is_none());
    }

    #[test]
    fn test_without_ack_is_neither() {
        let packet = Packet::request(Command::GetInfo);
        assert!(!packet.is_ack());
        assert!(!packet.is_nak());
    }

    #[test]
    fn test_display() {
        let packet = Packet::with_raw(Command::LedOn, Bytes::new()).with_ack(Ack::ACK);
        assert_eq!(packet.to_string(), "LED On (0x6d) ACK");

        let packet = Packet::with_raw(Command::X10Received, vec![0x66, 0x80]);
        assert_eq!(packet.to_string(), "X10 Received (0x52) 66 80");
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(HexBytes(&[0x02, 0x62, 0xff]).to_string(), "02 62 ff");
        assert_eq!(HexBytes(&[]).to_string(), "");
    }
}

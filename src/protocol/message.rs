//! Insteon device messages carried inside modem frames.
//!
//! ```text
//! 0x50: from[3] to[3] flags cmd1 cmd2
//! 0x51: from[3] to[3] flags cmd1 cmd2 data[14]
//! 0x62: to[3] flags cmd1 cmd2 [data[14]] ack
//! ```

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::wire_format::EXTENDED_DATA_LEN;

/// Three byte Insteon device address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 3]);

impl Address {
    /// Create an address from its three bytes.
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Read an address from the first three bytes of `buf`.
    ///
    /// Callers check the length beforehand.
    pub(crate) fn from_slice(buf: &[u8]) -> Self {
        Self([buf[0], buf[1], buf[2]])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}.{:02x}.{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Address {
    type Err = String;

    /// Parse `aa.bb.cc` (also accepts `aabbcc` and `:` separators).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != '.' && *c != ':').collect();
        if digits.len() != 6 {
            return Err(format!("invalid address {:?}", s));
        }
        let mut out = [0u8; 3];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| format!("invalid address {:?}", s))?;
        }
        Ok(Self(out))
    }
}

/// Message flags byte.
///
/// ```text
/// bit 7-5: message type   bit 4: extended   bit 3-2: hops left   bit 1-0: max hops
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MessageFlags(pub u8);

/// Message type (upper three bits of the flags byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Direct,
    DirectAck,
    AllLinkCleanup,
    AllLinkCleanupAck,
    Broadcast,
    DirectNak,
    AllLinkBroadcast,
    AllLinkCleanupNak,
}

impl MessageFlags {
    /// Extended message bit.
    pub const EXTENDED: u8 = 0x10;

    /// Standard direct message, three hops.
    pub const STANDARD_DIRECT: MessageFlags = MessageFlags(0x0f);
    /// Extended direct message, three hops.
    pub const EXTENDED_DIRECT: MessageFlags = MessageFlags(0x1f);

    /// Check the extended bit.
    #[inline]
    pub fn is_extended(self) -> bool {
        self.0 & Self::EXTENDED != 0
    }

    pub fn message_type(self) -> MessageType {
        match self.0 >> 5 {
            0 => MessageType::Direct,
            1 => MessageType::DirectAck,
            2 => MessageType::AllLinkCleanup,
            3 => MessageType::AllLinkCleanupAck,
            4 => MessageType::Broadcast,
            5 => MessageType::DirectNak,
            6 => MessageType::AllLinkBroadcast,
            _ => MessageType::AllLinkCleanupNak,
        }
    }

    pub fn hops_left(self) -> u8 {
        (self.0 >> 2) & 0x03
    }

    pub fn max_hops(self) -> u8 {
        self.0 & 0x03
    }
}

/// An Insteon message to or from a remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sending device. Not present on the wire for `0x62` requests.
    pub src: Address,
    pub dst: Address,
    pub flags: MessageFlags,
    /// Command bytes `cmd1`, `cmd2`.
    pub command: [u8; 2],
    /// User data of an extended message.
    pub data: Option<[u8; EXTENDED_DATA_LEN]>,
}

impl Message {
    /// Standard direct message to `dst`.
    pub fn standard(dst: Address, command: [u8; 2]) -> Self {
        Self {
            src: Address::default(),
            dst,
            flags: MessageFlags::STANDARD_DIRECT,
            command,
            data: None,
        }
    }

    /// Extended direct message to `dst`. `data` is zero padded to 14 bytes.
    pub fn extended(dst: Address, command: [u8; 2], data: &[u8]) -> Self {
        let mut buf = [0u8; EXTENDED_DATA_LEN];
        let n = data.len().min(EXTENDED_DATA_LEN);
        buf[..n].copy_from_slice(&data[..n]);
        Self {
            src: Address::default(),
            dst,
            flags: MessageFlags::EXTENDED_DIRECT,
            command,
            data: Some(buf),
        }
    }

    /// Check the extended bit of the flags.
    pub fn is_extended(&self) -> bool {
        self.flags.is_extended()
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(
            self.flags.message_type(),
            MessageType::Broadcast | MessageType::AllLinkBroadcast
        )
    }

    pub fn is_nak(&self) -> bool {
        matches!(
            self.flags.message_type(),
            MessageType::DirectNak | MessageType::AllLinkCleanupNak
        )
    }

    /// Decode a received message (`0x50`/`0x51` body). Returns `None` if the
    /// length does not fit.
    pub(crate) fn decode_received(buf: &[u8]) -> Option<Self> {
        if buf.len() < 9 {
            return None;
        }
        let src = Address::from_slice(&buf[0..3]);
        let mut msg = Self::decode_outbound(&buf[3..])?;
        msg.src = src;
        Some(msg)
    }

    /// Decode a message without source address (`0x62` body, ack excluded).
    pub(crate) fn decode_outbound(buf: &[u8]) -> Option<Self> {
        if buf.len() < 6 {
            return None;
        }
        let flags = MessageFlags(buf[3]);
        let data = if flags.is_extended() {
            let data: [u8; EXTENDED_DATA_LEN] =
                buf.get(6..6 + EXTENDED_DATA_LEN)?.try_into().ok()?;
            Some(data)
        } else {
            None
        };
        Some(Self {
            src: Address::default(),
            dst: Address::from_slice(&buf[0..3]),
            flags,
            command: [buf[4], buf[5]],
            data,
        })
    }

    /// Encode with the source address (`0x50`/`0x51` body).
    pub(crate) fn encode_received(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.src.0);
        self.encode_outbound(buf);
    }

    /// Encode without the source address (`0x62` body).
    ///
    /// An extended message without data is padded with zeros so the frame
    /// length always agrees with the flags.
    pub(crate) fn encode_outbound(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.dst.0);
        buf.put_u8(self.flags.0);
        buf.put_slice(&self.command);
        if self.flags.is_extended() {
            buf.put_slice(&self.data.unwrap_or([0u8; EXTENDED_DATA_LEN]));
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} {:?} cmd {:02x} {:02x}",
            self.src,
            self.dst,
            self.flags.message_type(),
            self.command[0],
            self.command[1]
        )?;
        if let Some(data) = &self.data {
            write!(f, " data {}", super::HexBytes(data))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let addr = Address::new(0x1a, 0x2b, 0x3c);
        assert_eq!(addr.to_string(), "1a.2b.3c");
        assert_eq!("1a.2b.3c".parse::<Address>().unwrap(), addr);
        assert_eq!("1A2B3C".parse::<Address>().unwrap(), addr);
        assert!("1a.2b".parse::<Address>().is_err());
        assert!("zz.2b.3c".parse::<Address>().is_err());
    }

    #[test]
    fn test_flags() {
        assert!(!MessageFlags::STANDARD_DIRECT.is_extended());
        assert!(MessageFlags::EXTENDED_DIRECT.is_extended());
        assert_eq!(MessageFlags::STANDARD_DIRECT.hops_left(), 3);
        assert_eq!(MessageFlags::STANDARD_DIRECT.max_hops(), 3);
        assert_eq!(MessageFlags(0x2f).message_type(), MessageType::DirectAck);
        assert_eq!(MessageFlags(0xaf).message_type(), MessageType::DirectNak);
        assert_eq!(MessageFlags(0x8f).message_type(), MessageType::Broadcast);
    }

    #[test]
    fn test_decode_received_standard() {
        let body = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x2f, 0x11, 0xff];
        let msg = Message::decode_received(&body).unwrap();

        assert_eq!(msg.src, Address::new(0x11, 0x22, 0x33));
        assert_eq!(msg.dst, Address::new(0x44, 0x55, 0x66));
        assert_eq!(msg.command, [0x11, 0xff]);
        assert!(msg.data.is_none());
        assert_eq!(msg.flags.message_type(), MessageType::DirectAck);
    }

    #[test]
    fn test_decode_extended_needs_data() {
        let mut body = vec![0x44, 0x55, 0x66, 0x1f, 0x2e, 0x00];
        assert!(Message::decode_outbound(&body).is_none());

        body.extend_from_slice(&[0xaa; EXTENDED_DATA_LEN]);
        let msg = Message::decode_outbound(&body).unwrap();
        assert_eq!(msg.data, Some([0xaa; EXTENDED_DATA_LEN]));
    }

    #[test]
    fn test_extended_constructor_pads() {
        let msg = Message::extended(Address::new(1, 2, 3), [0x2e, 0x00], &[1, 2]);
        let data = msg.data.unwrap();
        assert_eq!(&data[..2], &[1, 2]);
        assert!(data[2..].iter().all(|b| *b == 0));

        let mut buf = BytesMut::new();
        msg.encode_outbound(&mut buf);
        assert_eq!(buf.len(), 6 + EXTENDED_DATA_LEN);
    }
}

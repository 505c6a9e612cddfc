//! Manage-all-link-record (`0x6F`) request body.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::{Command, LinkRecord, Packet, LINK_RECORD_SIZE};

/// Sub-command of a manage-all-link-record request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordCommand {
    FindFirst = 0x00,
    FindNext = 0x01,
    ModifyFirst = 0x20,
    /// Modify the first matching controller record, or add one.
    ModifyFirstController = 0x40,
    /// Modify the first matching responder record, or add one.
    ModifyFirstResponder = 0x41,
    /// Delete the first record matching group and address.
    DeleteFirst = 0x80,
}

impl RecordCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::FindFirst),
            0x01 => Some(Self::FindNext),
            0x20 => Some(Self::ModifyFirst),
            0x40 => Some(Self::ModifyFirstController),
            0x41 => Some(Self::ModifyFirstResponder),
            0x80 => Some(Self::DeleteFirst),
            _ => None,
        }
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Body of a `0x6F` request: `cmd flags group addr[3] data[3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManageRecordRequest {
    pub command: RecordCommand,
    pub link: LinkRecord,
}

impl ManageRecordRequest {
    /// Encoded size, without the header.
    pub const SIZE: usize = 1 + LINK_RECORD_SIZE;

    pub fn new(command: RecordCommand, link: LinkRecord) -> Self {
        Self { command, link }
    }

    /// Add-or-modify request matching the direction of `link`.
    pub fn add(link: LinkRecord) -> Self {
        let command = if link.flags.is_controller() {
            RecordCommand::ModifyFirstController
        } else {
            RecordCommand::ModifyFirstResponder
        };
        Self::new(command, link)
    }

    /// Delete-first request keyed on the group and address of `link`.
    pub fn delete(link: LinkRecord) -> Self {
        Self::new(RecordCommand::DeleteFirst, link)
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(self.command.byte());
        self.link.encode(&mut buf);
        buf.freeze()
    }

    /// Parse a request body. Returns `None` if it is short or the
    /// sub-command is unknown.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let (&command, link) = buf.split_first()?;
        Some(Self {
            command: RecordCommand::from_byte(command)?,
            link: LinkRecord::decode(link)?,
        })
    }

    /// Wrap into a `0x6F` packet.
    pub fn into_packet(self) -> Packet {
        Packet::with_raw(Command::ManageAllLinkRecord, self.encode())
    }
}

impl fmt::Display for ManageRecordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x} {}", self.command.byte(), self.link)
    }
}

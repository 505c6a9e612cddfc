//! All-link database records.
//!
//! Wire form (`0x57` body, and the tail of a `0x6f` request):
//! ```text
//! flags group addr[3] data[3]
//! ```

use std::fmt;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::message::Address;

/// Encoded size of a link record.
pub const LINK_RECORD_SIZE: usize = 8;

/// Record flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkFlags(pub u8);

impl LinkFlags {
    /// Record is in use.
    pub const IN_USE: u8 = 0x80;
    /// Record describes a controller link (responder when clear).
    pub const CONTROLLER: u8 = 0x40;
    /// Remote device acknowledges messages sent over this link.
    pub const ACK_REQUIRED: u8 = 0x20;
    /// Record has been used at least once (clear on the high water mark).
    pub const USED_BEFORE: u8 = 0x02;

    /// In-use controller record (`0xe2`).
    pub const fn controller() -> Self {
        Self(Self::IN_USE | Self::CONTROLLER | Self::ACK_REQUIRED | Self::USED_BEFORE)
    }

    /// In-use responder record (`0xa2`).
    pub const fn responder() -> Self {
        Self(Self::IN_USE | Self::ACK_REQUIRED | Self::USED_BEFORE)
    }

    #[inline]
    pub fn in_use(self) -> bool {
        self.0 & Self::IN_USE != 0
    }

    #[inline]
    pub fn is_controller(self) -> bool {
        self.0 & Self::CONTROLLER != 0
    }

    #[inline]
    pub fn is_responder(self) -> bool {
        !self.is_controller()
    }
}

/// One entry in a link database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinkRecord {
    pub flags: LinkFlags,
    pub group: u8,
    pub address: Address,
    pub data: [u8; 3],
}

impl LinkRecord {
    /// Controller record for `group` pointing at `address`.
    pub fn controller(group: u8, address: Address, data: [u8; 3]) -> Self {
        Self {
            flags: LinkFlags::controller(),
            group,
            address,
            data,
        }
    }

    /// Responder record for `group` pointing at `address`.
    pub fn responder(group: u8, address: Address, data: [u8; 3]) -> Self {
        Self {
            flags: LinkFlags::responder(),
            group,
            address,
            data,
        }
    }

    /// Key used by the modem's delete primitive.
    #[inline]
    pub fn matches_key(&self, other: &LinkRecord) -> bool {
        self.group == other.group && self.address == other.address
    }

    /// Same group, address, direction and data. See the `PartialEq` impl.
    #[inline]
    pub fn same_link(&self, other: &LinkRecord) -> bool {
        self.matches_key(other)
            && self.flags.is_controller() == other.flags.is_controller()
            && self.data == other.data
    }

    pub(crate) fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < LINK_RECORD_SIZE {
            return None;
        }
        Some(Self {
            flags: LinkFlags(buf[0]),
            group: buf[1],
            address: Address::from_slice(&buf[2..5]),
            data: [buf[5], buf[6], buf[7]],
        })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags.0);
        buf.put_u8(self.group);
        buf.put_slice(&self.address.0);
        buf.put_slice(&self.data);
    }
}

/// Two records are the same link when group, address, direction and data
/// agree. The remaining flag bits are bookkeeping kept by the device.
impl PartialEq for LinkRecord {
    fn eq(&self, other: &Self) -> bool {
        self.same_link(other)
    }
}

impl Eq for LinkRecord {}

impl fmt::Display for LinkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:3} {} {:02x} {:02x} {:02x}",
            if self.flags.in_use() { "U" } else { "A" },
            if self.flags.is_controller() { "C" } else { "R" },
            self.group,
            self.address,
            self.data[0],
            self.data[1],
            self.data[2]
        )
    }
}

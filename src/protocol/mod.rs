//! Protocol module - wire format, packet types and framing.
//!
//! This module implements the modem's binary serial protocol:
//! - Command enumeration and the command length table
//! - Insteon messages, link records and modem info payloads
//! - Frame buffer for accumulating partial reads

mod frame_buffer;
mod link;
mod message;
mod packet;
mod wire_format;

pub use frame_buffer::FrameBuffer;
pub use link::{LinkFlags, LinkRecord, LINK_RECORD_SIZE};
pub use message::{Address, Message, MessageFlags, MessageType};
pub use packet::{HexBytes, ModemInfo, Packet, Payload, MODEM_INFO_SIZE};
pub use wire_format::{
    Ack, Command, EXTENDED_DATA_LEN, HEADER_SIZE, SEND_FLAGS_OFFSET, START_BYTE,
};

//! Codec module - packet serialization for the modem wire format.
//!
//! - [`PacketCodec`] - encodes packets and decodes them from the front of a
//!   byte buffer
//!
//! # Design
//!
//! The codec is a marker struct with static methods rather than a trait
//! object. It is pure: no I/O and no state. [`FrameBuffer`] feeds it from the
//! transport.
//!
//! # Example
//!
//! ```
//! use insteon_plm::codec::{DecodeResult, PacketCodec};
//! use insteon_plm::protocol::{Ack, Command, Packet};
//!
//! let packet = Packet::request(Command::GetNextAllLink).with_ack(Ack::NAK);
//! let bytes = PacketCodec::encode(&packet).unwrap();
//! assert_eq!(&bytes[..], &[0x02, 0x6a, 0x15]);
//!
//! match PacketCodec::decode(&bytes) {
//!     DecodeResult::Packet(decoded, used) => {
//!         assert_eq!(decoded, packet);
//!         assert_eq!(used, 3);
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```
//!
//! [`FrameBuffer`]: crate::protocol::FrameBuffer

mod packet;

pub use packet::{DecodeResult, PacketCodec};

//! Packet codec - frame level encode/decode.
//!
//! This is the only place that applies the command length table and the
//! extended-message length rule.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FramingError, ModemError, Result};
use crate::protocol::{
    Ack, Address, Command, LinkRecord, Message, MessageFlags, ModemInfo, Packet, Payload,
    EXTENDED_DATA_LEN, HEADER_SIZE, MODEM_INFO_SIZE, SEND_FLAGS_OFFSET, START_BYTE,
};

/// Outcome of decoding the front of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A whole packet and the number of bytes it occupied.
    Packet(Packet, usize),
    /// More bytes are needed.
    Incomplete,
    /// The front of the buffer is malformed; discard `usize` bytes and retry.
    Invalid(FramingError, usize),
}

/// Codec for modem frames.
pub struct PacketCodec;

impl PacketCodec {
    /// Total frame length for `command`, or `None` until enough bytes have
    /// been seen to apply the extension rule.
    pub fn frame_len(command: Command, buf: &[u8]) -> Option<usize> {
        let base = HEADER_SIZE + command.body_len();
        if command != Command::SendInsteonMessage {
            return Some(base);
        }
        let flags = *buf.get(SEND_FLAGS_OFFSET)?;
        if MessageFlags(flags).is_extended() {
            Some(base + EXTENDED_DATA_LEN)
        } else {
            Some(base)
        }
    }

    /// Decode one packet from the front of `buf`.
    ///
    /// A bad start byte discards one byte and an unknown command discards the
    /// two header bytes, so repeated calls resynchronize on the next start
    /// marker.
    pub fn decode(buf: &[u8]) -> DecodeResult {
        let Some(&start) = buf.first() else {
            return DecodeResult::Incomplete;
        };
        if start != START_BYTE {
            return DecodeResult::Invalid(FramingError::BadStart(start), 1);
        }
        let Some(&cmd) = buf.get(1) else {
            return DecodeResult::Incomplete;
        };
        let command = match Command::try_from(cmd) {
            Ok(c) => c,
            Err(e) => return DecodeResult::Invalid(e, HEADER_SIZE),
        };
        let Some(len) = Self::frame_len(command, buf) else {
            return DecodeResult::Incomplete;
        };
        if buf.len() < len {
            return DecodeResult::Incomplete;
        }

        match Self::decode_body(command, &buf[HEADER_SIZE..len]) {
            Ok(packet) => DecodeResult::Packet(packet, len),
            Err(e) => DecodeResult::Invalid(e, len),
        }
    }

    /// Interpret a complete frame body (header excluded).
    fn decode_body(command: Command, body: &[u8]) -> std::result::Result<Packet, FramingError> {
        let (body, ack) = if command.has_ack() {
            let (body, ack) = body.split_at(body.len() - 1);
            (body, Some(Ack(ack[0])))
        } else {
            (body, None)
        };

        let invalid = |reason| FramingError::InvalidPayload { command, reason };

        let payload = match command {
            Command::StandardMessageReceived => {
                let msg = Message::decode_received(body)
                    .ok_or_else(|| invalid("extended flag on a standard frame"))?;
                Payload::Message(msg)
            }
            Command::ExtendedMessageReceived => {
                let msg = Message::decode_received(body)
                    .filter(|m| m.data.is_some())
                    .ok_or_else(|| invalid("extended frame without extended flag"))?;
                Payload::Message(msg)
            }
            Command::SendInsteonMessage => {
                let msg = Message::decode_outbound(body).ok_or_else(|| invalid("short message"))?;
                Payload::Message(msg)
            }
            Command::AllLinkRecordResponse => {
                let link = LinkRecord::decode(body).ok_or_else(|| invalid("short link record"))?;
                Payload::LinkRecord(link)
            }
            Command::GetInfo => {
                if body.len() < MODEM_INFO_SIZE {
                    return Err(invalid("short modem info"));
                }
                Payload::ModemInfo(ModemInfo {
                    address: Address::from_slice(&body[0..3]),
                    category: body[3],
                    subcategory: body[4],
                    firmware: body[5],
                })
            }
            _ => Payload::Raw(Bytes::copy_from_slice(body)),
        };

        Ok(Packet {
            command,
            payload,
            ack,
            retry_count: 0,
        })
    }

    /// Encode a packet to wire bytes.
    ///
    /// Nothing is produced if the payload does not fit the command.
    pub fn encode(packet: &Packet) -> Result<Bytes> {
        let command = packet.command;
        let unfit = |reason| ModemError::Encode { command, reason };

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + command.body_len() + EXTENDED_DATA_LEN);
        buf.put_u8(START_BYTE);
        buf.put_u8(command.byte());

        match (&packet.payload, command) {
            (Payload::Message(msg), Command::StandardMessageReceived) => {
                if msg.is_extended() {
                    return Err(unfit("extended message in a standard frame"));
                }
                msg.encode_received(&mut buf);
            }
            (Payload::Message(msg), Command::ExtendedMessageReceived) => {
                if !msg.is_extended() {
                    return Err(unfit("standard message in an extended frame"));
                }
                msg.encode_received(&mut buf);
            }
            (Payload::Message(msg), Command::SendInsteonMessage) => msg.encode_outbound(&mut buf),
            (Payload::Message(_), _) => return Err(unfit("command does not carry a message")),
            (Payload::LinkRecord(link), Command::AllLinkRecordResponse) => link.encode(&mut buf),
            (Payload::LinkRecord(_), _) => return Err(unfit("command does not carry a link record")),
            (Payload::ModemInfo(info), Command::GetInfo) => {
                buf.put_slice(&info.address.0);
                buf.put_u8(info.category);
                buf.put_u8(info.subcategory);
                buf.put_u8(info.firmware);
            }
            (Payload::ModemInfo(_), _) => return Err(unfit("command does not carry modem info")),
            (Payload::Raw(_), Command::SendInsteonMessage) => {
                return Err(unfit("command carries a message"))
            }
            (Payload::Raw(bytes), _) => buf.put_slice(bytes),
        }

        if let Some(ack) = packet.ack {
            if !command.has_ack() {
                return Err(unfit("command has no status byte"));
            }
            buf.put_u8(ack.0);
        }

        if let Payload::Raw(bytes) = &packet.payload {
            // Frames are delimited by length alone.
            let full = command.body_len() - usize::from(command.has_ack());
            let request = packet.ack.is_none() && bytes.len() == command.request_len();
            if bytes.len() != full && !request {
                return Err(unfit("raw body length does not match the command"));
            }
        }

        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(packet: Packet) {
        let bytes = PacketCodec::encode(&packet).unwrap();
        match PacketCodec::decode(&bytes) {
            DecodeResult::Packet(decoded, used) => {
                assert_eq!(used, bytes.len(), "{}", packet);
                assert_eq!(decoded, packet);
            }
            other => panic!("{}: decoded {:?}", packet, other),
        }
    }

    /// Representative packet for every command in the length table.
    fn representative(command: Command) -> Packet {
        let addr = Address::new(0x0a, 0x0b, 0x0c);
        let ack = command.has_ack().then_some(Ack::ACK);
        let payload = match command {
            Command::StandardMessageReceived => {
                let mut msg = Message::standard(Address::new(0x44, 0x55, 0x66), [0x11, 0xff]);
                msg.src = addr;
                Payload::Message(msg)
            }
            Command::ExtendedMessageReceived => {
                let mut msg =
                    Message::extended(Address::new(0x44, 0x55, 0x66), [0x2e, 0x00], &[7; 14]);
                msg.src = addr;
                Payload::Message(msg)
            }
            Command::SendInsteonMessage => {
                Payload::Message(Message::standard(addr, [0x19, 0x00]))
            }
            Command::AllLinkRecordResponse => {
                Payload::LinkRecord(LinkRecord::controller(1, addr, [1, 2, 3]))
            }
            Command::GetInfo => Payload::ModemInfo(ModemInfo {
                address: addr,
                category: 0x03,
                subcategory: 0x15,
                firmware: 0x9e,
            }),
            other => {
                let len = other.body_len() - usize::from(other.has_ack());
                Payload::Raw(Bytes::from((0..len as u8).collect::<Vec<u8>>()))
            }
        };
        Packet {
            command,
            payload,
            ack,
            retry_count: 0,
        }
    }

    #[test]
    fn test_round_trip_every_command() {
        for command in Command::ALL {
            round_trip(representative(*command));
        }
    }

    #[test]
    fn test_round_trip_extended_send() {
        let msg = Message::extended(Address::new(1, 2, 3), [0x2f, 0x00], &[0xa5; 14]);
        let packet = Packet::new(Command::SendInsteonMessage, Payload::Message(msg)).with_ack(Ack::NAK);

        let bytes = PacketCodec::encode(&packet).unwrap();
        assert_eq!(bytes.len(), 2 + 7 + 14);
        assert_eq!(bytes[SEND_FLAGS_OFFSET], MessageFlags::EXTENDED_DIRECT.0);
        round_trip(packet);
    }

    #[test]
    fn test_extension_needs_flags_byte() {
        let bytes = [0x02, 0x62, 0x01, 0x02];
        assert_eq!(PacketCodec::decode(&bytes), DecodeResult::Incomplete);
        assert_eq!(PacketCodec::frame_len(Command::SendInsteonMessage, &bytes), None);
    }

    #[test]
    fn test_extended_frame_waits_for_data() {
        let msg = Message::extended(Address::new(1, 2, 3), [0x2f, 0x00], &[0; 14]);
        let packet = Packet::new(Command::SendInsteonMessage, Payload::Message(msg)).with_ack(Ack::ACK);
        let bytes = PacketCodec::encode(&packet).unwrap();

        // The standard length would already be satisfied here.
        assert_eq!(PacketCodec::decode(&bytes[..9]), DecodeResult::Incomplete);
        assert_eq!(PacketCodec::decode(&bytes[..22]), DecodeResult::Incomplete);
        assert!(matches!(PacketCodec::decode(&bytes), DecodeResult::Packet(_, 23)));
    }

    #[test]
    fn test_bad_start_consumes_one_byte() {
        assert_eq!(
            PacketCodec::decode(&[0x99, 0x02, 0x60]),
            DecodeResult::Invalid(FramingError::BadStart(0x99), 1)
        );
    }

    #[test]
    fn test_unknown_command_consumes_header_only() {
        assert_eq!(
            PacketCodec::decode(&[0x02, 0x42, 0x02, 0x6d, 0x06]),
            DecodeResult::Invalid(FramingError::UnknownCommand(0x42), 2)
        );
    }

    #[test]
    fn test_short_input_is_incomplete() {
        assert_eq!(PacketCodec::decode(&[]), DecodeResult::Incomplete);
        assert_eq!(PacketCodec::decode(&[0x02]), DecodeResult::Incomplete);
        assert_eq!(PacketCodec::decode(&[0x02, 0x57, 0xe2]), DecodeResult::Incomplete);
    }

    #[test]
    fn test_decode_ack_and_nak() {
        match PacketCodec::decode(&[0x02, 0x69, 0x15]) {
            DecodeResult::Packet(packet, 3) => {
                assert_eq!(packet.command, Command::GetFirstAllLink);
                assert!(packet.is_nak());
                assert_eq!(packet.raw(), Some(&[][..]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extended_received_without_flag_is_invalid() {
        let mut bytes = vec![0x02, 0x51, 1, 2, 3, 4, 5, 6, 0x0f, 0x2e, 0x00];
        bytes.extend_from_slice(&[0; 14]);
        assert!(matches!(
            PacketCodec::decode(&bytes),
            DecodeResult::Invalid(FramingError::InvalidPayload { .. }, 25)
        ));
    }

    #[test]
    fn test_outbound_request_has_no_ack_byte() {
        let bytes = PacketCodec::encode(&Packet::request(Command::GetFirstAllLink)).unwrap();
        assert_eq!(&bytes[..], &[0x02, 0x69]);

        let msg = Message::standard(Address::new(0x11, 0x22, 0x33), [0x19, 0x00]);
        let bytes =
            PacketCodec::encode(&Packet::new(Command::SendInsteonMessage, Payload::Message(msg)))
                .unwrap();
        assert_eq!(&bytes[..], &[0x02, 0x62, 0x11, 0x22, 0x33, 0x0f, 0x19, 0x00]);
    }

    #[test]
    fn test_encode_rejects_mismatched_payload() {
        let link = LinkRecord::responder(1, Address::new(1, 2, 3), [0; 3]);
        let packet = Packet::new(Command::SendInsteonMessage, Payload::LinkRecord(link));
        assert!(matches!(
            PacketCodec::encode(&packet),
            Err(ModemError::Encode { command: Command::SendInsteonMessage, .. })
        ));

        let msg = Message::extended(Address::new(1, 2, 3), [0, 0], &[]);
        let packet = Packet::new(Command::StandardMessageReceived, Payload::Message(msg));
        assert!(PacketCodec::encode(&packet).is_err());

        let packet = Packet::request(Command::X10Received).with_ack(Ack::ACK);
        assert!(PacketCodec::encode(&packet).is_err());
    }

    #[test]
    fn test_encode_rejects_raw_body_of_wrong_length() {
        let short = Packet::with_raw(Command::ManageAllLinkRecord, vec![0x80]);
        assert!(matches!(
            PacketCodec::encode(&short),
            Err(ModemError::Encode { command: Command::ManageAllLinkRecord, .. })
        ));

        let long = Packet::with_raw(Command::LedOn, vec![0x00]);
        assert!(PacketCodec::encode(&long).is_err());

        let raw_send = Packet::with_raw(Command::SendInsteonMessage, vec![0; 6]);
        assert!(PacketCodec::encode(&raw_send).is_err());
    }

    #[test]
    fn test_encode_accepts_request_and_reply_lengths() {
        let bytes = PacketCodec::encode(&Packet::with_raw(Command::ManageAllLinkRecord, vec![0; 9]))
            .unwrap();
        assert_eq!(bytes.len(), 2 + 9);

        // The configuration request is empty, its reply carries three bytes.
        let request = PacketCodec::encode(&Packet::request(Command::GetConfig)).unwrap();
        assert_eq!(&request[..], &[0x02, 0x73]);
        let reply = Packet::with_raw(Command::GetConfig, vec![0x48, 0x00, 0x00]).with_ack(Ack::ACK);
        assert_eq!(PacketCodec::encode(&reply).unwrap().len(), 2 + 4);

        // Without a status byte only the request length is accepted.
        let truncated = Packet::with_raw(Command::GetConfig, vec![0x48]);
        assert!(PacketCodec::encode(&truncated).is_err());
    }
}

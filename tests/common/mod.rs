//! In-process fake modem used by the integration tests.
//!
//! Speaks the host side of the wire protocol over a `tokio::io::duplex`
//! stream and keeps a link table that it edits the way the real modem does.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use insteon_plm::codec::PacketCodec;
use insteon_plm::linkdb::{ManageRecordRequest, RecordCommand};
use insteon_plm::protocol::{
    Ack, Address, Command, LinkRecord, Message, ModemInfo, Packet, Payload,
};
use insteon_plm::{Modem, ModemBuilder};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

pub const MODEM_ADDRESS: Address = Address::new(0x44, 0x85, 0x11);

pub const TEST_TIMEOUT: Duration = Duration::from_millis(200);

/// Behaviour and observations of the fake modem.
#[derive(Debug, Default)]
pub struct FakeState {
    /// The modem's link table.
    pub links: Vec<LinkRecord>,
    cursor: usize,
    /// Number of naks still to answer, per command byte.
    pub naks: HashMap<u8, usize>,
    /// Commands that never get a reply.
    pub silent: HashSet<u8>,
    /// Ack record requests but never send the record response.
    pub withhold_records: bool,
    /// Start withholding record responses after this many table reads.
    pub withhold_after_reads: Option<usize>,
    reads: usize,
    /// Nak every delete once this many have succeeded.
    pub refuse_after_deletes: Option<usize>,
    deletes: usize,
    /// Every frame the host wrote, in order.
    pub received: Vec<Vec<u8>>,
}

impl FakeState {
    pub fn with_links(links: Vec<LinkRecord>) -> Self {
        Self {
            links,
            ..Self::default()
        }
    }

    /// How many frames of `command` the host wrote.
    pub fn count(&self, command: Command) -> usize {
        self.received
            .iter()
            .filter(|frame| frame[1] == command.byte())
            .count()
    }
}

pub struct FakeModem {
    pub modem: Modem,
    pub state: Arc<Mutex<FakeState>>,
    inject: mpsc::UnboundedSender<Vec<u8>>,
}

impl FakeModem {
    pub fn start(state: FakeState) -> Self {
        Self::start_with(state, test_builder())
    }

    pub fn start_with(state: FakeState, builder: ModemBuilder) -> Self {
        init_tracing();

        let (host, device) = duplex(4096);
        let state = Arc::new(Mutex::new(state));
        let (inject, inject_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(device, state.clone(), inject_rx));

        let modem = builder.open(host);

        Self {
            modem,
            state,
            inject,
        }
    }

    /// Write an unsolicited packet to the host.
    pub fn inject(&self, packet: &Packet) {
        let bytes = PacketCodec::encode(packet).unwrap();
        self.inject.send(bytes.to_vec()).unwrap();
    }

    /// Write a standard message from `src` to the host.
    pub fn inject_message(&self, src: Address, command: [u8; 2]) -> Message {
        let mut msg = Message::standard(MODEM_ADDRESS, command);
        msg.src = src;
        self.inject(&Packet::new(
            Command::StandardMessageReceived,
            Payload::Message(msg.clone()),
        ));
        msg
    }

    pub fn links(&self) -> Vec<LinkRecord> {
        self.state.lock().unwrap().links.clone()
    }
}

/// Builder with short timeouts so failing paths finish quickly.
pub fn test_builder() -> ModemBuilder {
    Modem::builder()
        .timeout(TEST_TIMEOUT)
        .record_timeout(TEST_TIMEOUT)
        .retry_delay(Duration::from_millis(5))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn run(
    mut stream: DuplexStream,
    state: Arc<Mutex<FakeState>>,
    mut inject: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut pending = Vec::new();
    let mut chunk = [0u8; 256];

    loop {
        tokio::select! {
            biased;

            Some(bytes) = inject.recv() => {
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
            }

            read = stream.read(&mut chunk) => {
                let n = match read {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                pending.extend_from_slice(&chunk[..n]);
                while let Some(frame) = next_frame(&mut pending) {
                    let reply = respond(&mut state.lock().unwrap(), frame);
                    if stream.write_all(&reply).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Body length of a host request, which carries no ack byte.
fn request_len(command: u8, frame: &[u8]) -> Option<usize> {
    let len = match command {
        0x60 | 0x65 | 0x67 | 0x69 | 0x6a | 0x6c | 0x6d | 0x6e | 0x72 | 0x73 => 0,
        0x68 | 0x6b | 0x70 => 1,
        0x63 | 0x64 | 0x71 => 2,
        0x61 | 0x66 => 3,
        0x62 => match frame.get(5) {
            Some(flags) if flags & 0x10 != 0 => 6 + 14,
            Some(_) => 6,
            None => return Some(usize::MAX),
        },
        0x6f => 9,
        _ => return None,
    };
    Some(len)
}

fn next_frame(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    loop {
        match pending.first() {
            None => return None,
            Some(0x02) => {}
            Some(_) => {
                pending.remove(0);
                continue;
            }
        }
        let command = *pending.get(1)?;
        let Some(len) = request_len(command, pending) else {
            pending.drain(..2);
            continue;
        };
        let total = 2usize.checked_add(len)?;
        if pending.len() < total {
            return None;
        }
        return Some(pending.drain(..total).collect());
    }
}

fn echo(frame: &[u8], ack: Ack) -> Vec<u8> {
    let mut reply = frame.to_vec();
    reply.push(ack.0);
    reply
}

fn record_response(link: LinkRecord) -> Vec<u8> {
    let packet = Packet::new(Command::AllLinkRecordResponse, Payload::LinkRecord(link));
    PacketCodec::encode(&packet).unwrap().to_vec()
}

fn respond(state: &mut FakeState, frame: Vec<u8>) -> Vec<u8> {
    state.received.push(frame.clone());
    let command = frame[1];

    if state.silent.contains(&command) {
        return Vec::new();
    }
    if let Some(naks) = state.naks.get_mut(&command) {
        if *naks > 0 {
            *naks -= 1;
            return nak(&frame);
        }
    }

    match command {
        0x60 => {
            let info = ModemInfo {
                address: MODEM_ADDRESS,
                category: 0x03,
                subcategory: 0x15,
                firmware: 0x9e,
            };
            let packet = Packet::new(Command::GetInfo, Payload::ModemInfo(info)).with_ack(Ack::ACK);
            PacketCodec::encode(&packet).unwrap().to_vec()
        }
        0x69 => {
            state.cursor = 0;
            state.reads += 1;
            if state.withhold_after_reads.is_some_and(|n| state.reads > n) {
                state.withhold_records = true;
            }
            next_record(state, &frame)
        }
        0x6a => next_record(state, &frame),
        0x6f => manage_record(state, &frame),
        _ => echo(&frame, Ack::ACK),
    }
}

fn nak(frame: &[u8]) -> Vec<u8> {
    if frame[1] == 0x60 {
        // The info reply always carries the six info bytes.
        let mut reply = frame.to_vec();
        reply.extend_from_slice(&[0; 6]);
        reply.push(Ack::NAK.0);
        return reply;
    }
    echo(frame, Ack::NAK)
}

fn next_record(state: &mut FakeState, frame: &[u8]) -> Vec<u8> {
    let Some(link) = state.links.get(state.cursor).copied() else {
        return echo(frame, Ack::NAK);
    };
    state.cursor += 1;

    let mut reply = echo(frame, Ack::ACK);
    if !state.withhold_records {
        reply.extend(record_response(link));
    }
    reply
}

fn manage_record(state: &mut FakeState, frame: &[u8]) -> Vec<u8> {
    let Some(request) = ManageRecordRequest::decode(&frame[2..]) else {
        return echo(frame, Ack::NAK);
    };
    let target = request.link;

    match request.command {
        RecordCommand::ModifyFirstController | RecordCommand::ModifyFirstResponder => {
            let controller = request.command == RecordCommand::ModifyFirstController;
            let existing = state.links.iter_mut().find(|link| {
                link.matches_key(&target) && link.flags.is_controller() == controller
            });
            match existing {
                Some(link) => link.data = target.data,
                None => state.links.push(target),
            }
            echo(frame, Ack::ACK)
        }
        RecordCommand::DeleteFirst => {
            if state.refuse_after_deletes.is_some_and(|n| state.deletes >= n) {
                return echo(frame, Ack::NAK);
            }
            match state.links.iter().position(|link| link.matches_key(&target)) {
                Some(index) => {
                    state.links.remove(index);
                    state.deletes += 1;
                    echo(frame, Ack::ACK)
                }
                None => echo(frame, Ack::NAK),
            }
        }
        _ => echo(frame, Ack::NAK),
    }
}

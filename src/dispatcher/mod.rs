//! Dispatcher task.
//!
//! The dispatcher is the only owner of the ack correlation table and the
//! subscriber registries. Everything else talks to it through channels:
//!
//! ```text
//! Modem::send ──► outbound (bounded) ─┐
//! Registrations ─► control (unbounded)┼─► Dispatcher ─► Transport write half
//! Frame reader ──► inbound (bounded) ─┘        │
//!                                              ├─► ack waiters (oneshot)
//!                                              ├─► device / monitor subscribers
//!                                              └─► command subscribers | modem-class slot
//! ```
//!
//! Control is polled before inbound and inbound before outbound. A
//! subscription registered before a send is therefore always in place by the
//! time the reply to that send is routed.

mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::PacketCodec;
use crate::config::ModemConfig;
use crate::error::{ModemError, Result};
use crate::protocol::{HexBytes, Packet, Payload};

pub(crate) use registry::Control;
use registry::{AckSender, Registry};

/// A packet waiting to be written, with the channel its reply goes to.
#[derive(Debug)]
pub(crate) struct OutboundRequest {
    pub packet: Packet,
    pub reply: AckSender,
}

/// Cloneable handle for talking to the dispatcher task.
#[derive(Debug, Clone)]
pub(crate) struct DispatcherHandle {
    outbound: mpsc::Sender<OutboundRequest>,
    control: mpsc::UnboundedSender<Control>,
    next_id: Arc<AtomicU64>,
}

impl DispatcherHandle {
    /// Queue `packet` for writing. Waits at most `timeout` for room in the
    /// outbound queue and returns the receiver its reply arrives on.
    pub(crate) async fn submit(
        &self,
        packet: Packet,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Result<Packet>>> {
        let (reply, rx) = oneshot::channel();
        let request = OutboundRequest { packet, reply };

        match tokio::time::timeout(timeout, self.outbound.send(request)).await {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(_)) => Err(ModemError::ConnectionClosed),
            Err(_) => Err(ModemError::WriteTimeout),
        }
    }

    /// Sender for registration requests. Usable from `Drop`.
    pub(crate) fn control(&self) -> mpsc::UnboundedSender<Control> {
        self.control.clone()
    }

    /// Allocate a registration id.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Endpoints of a freshly spawned dispatcher.
pub(crate) struct Spawned {
    pub handle: DispatcherHandle,
    /// Where the frame reader delivers decoded packets.
    pub inbound: mpsc::Sender<Packet>,
    /// Unsolicited modem-class packets nobody subscribed to.
    pub modem_rx: mpsc::Receiver<Packet>,
    pub task: JoinHandle<()>,
}

/// Spawn the dispatcher task on top of the transport's write half.
pub(crate) fn spawn_dispatcher<W>(writer: W, config: &ModemConfig) -> Spawned
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
    let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    // Single slot: a modem-class packet is only kept until the next one.
    let (modem_tx, modem_rx) = mpsc::channel(1);

    let task = tokio::spawn(run(writer, outbound_rx, inbound_rx, control_rx, modem_tx));

    Spawned {
        handle: DispatcherHandle {
            outbound: outbound_tx,
            control: control_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        },
        inbound: inbound_tx,
        modem_rx,
        task,
    }
}

/// Main dispatcher loop. Returns once every outbound handle is gone.
async fn run<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<OutboundRequest>,
    mut inbound: mpsc::Receiver<Packet>,
    mut control: mpsc::UnboundedReceiver<Control>,
    modem_tx: mpsc::Sender<Packet>,
) where
    W: AsyncWrite + Unpin,
{
    let mut registry = Registry::new();

    loop {
        tokio::select! {
            biased;

            Some(request) = control.recv() => registry.apply(request),

            Some(packet) = inbound.recv() => route(&mut registry, &modem_tx, packet),

            request = outbound.recv() => match request {
                Some(request) => write_request(&mut writer, &mut registry, request).await,
                None => {
                    tracing::debug!("All modem handles dropped, stopping dispatcher");
                    return;
                }
            },
        }
    }
}

/// Route one inbound packet.
fn route(registry: &mut Registry, modem_tx: &mpsc::Sender<Packet>, packet: Packet) {
    let command = packet.command;

    if command.is_device_message() {
        match packet.payload {
            Payload::Message(msg) => {
                if !registry.deliver_message(msg) {
                    tracing::debug!("No connection for {} message, dropping", command);
                }
            }
            other => tracing::info!("{} without message payload: {:?}", command, other),
        }
        return;
    }

    if command.is_modem_class() {
        let Some(packet) = registry.deliver_packet(packet) else {
            return;
        };
        if let Err(e) = modem_tx.try_send(packet) {
            tracing::info!("Modem channel busy, dropping {}", e.into_inner());
        }
        return;
    }

    match registry.take_waiter(command) {
        Some(waiter) => {
            tracing::debug!("Dispatching {} reply", command);
            if waiter.send(Ok(packet)).is_err() {
                tracing::debug!("Waiter for {} gave up before the reply arrived", command);
            }
        }
        None => tracing::debug!("Received {} with no one waiting for it", packet),
    }
}

/// Encode, register the waiter and write. Failures go back through the reply.
async fn write_request<W>(writer: &mut W, registry: &mut Registry, request: OutboundRequest)
where
    W: AsyncWrite + Unpin,
{
    let OutboundRequest { packet, reply } = request;
    let command = packet.command;

    let bytes = match PacketCodec::encode(&packet) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::info!("Failed to encode {}: {}", packet, e);
            let _ = reply.send(Err(e));
            return;
        }
    };

    if registry.insert_waiter(command, reply).is_some() {
        tracing::debug!("Replaced a stale waiter for {}", command);
    }

    tracing::trace!("TX    {}", packet);
    tracing::trace!("TX    BUFFER {}", HexBytes(&bytes));

    if let Err(e) = write_frame(writer, &bytes).await {
        tracing::info!("Error writing {} to modem: {}", command, e);
        if let Some(reply) = registry.take_waiter(command) {
            let _ = reply.send(Err(ModemError::WriteFailed(e)));
        }
    }
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

//! Frame reader task.
//!
//! Owns the read half of the transport for the lifetime of the connection.
//! Bytes are fed through a [`FrameBuffer`] and every whole packet is handed
//! to the dispatcher's inbound queue. Nothing here touches protocol state.
//!
//! # Architecture
//!
//! ```text
//! Transport ─► read() ─► FrameBuffer ─► mpsc::Sender<Packet> ─► Dispatcher
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::{FrameBuffer, HexBytes, Packet};

/// Read buffer size. A modem frame is at most 25 bytes.
const READ_BUFFER_SIZE: usize = 1024;

/// Spawn the frame reader task.
pub(crate) fn spawn_reader<R>(reader: R, inbound: mpsc::Sender<Packet>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_loop(reader, inbound))
}

/// Main read loop - reads bytes, extracts packets and forwards them.
///
/// Decode failures and read errors are logged and the loop keeps going.
/// Returns at end of stream or when the dispatcher is gone.
async fn read_loop<R>(mut reader: R, inbound: mpsc::Sender<Packet>)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                if let Some(err) = frames.finish() {
                    tracing::info!("Error reading packet: {}", err);
                }
                tracing::debug!("Modem stream closed");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::info!("Error reading from modem: {}", e);
                tokio::task::yield_now().await;
                continue;
            }
        };

        tracing::trace!("RX    BUFFER {}", HexBytes(&buf[..n]));
        frames.push(&buf[..n]);

        while let Some(result) = frames.next_packet() {
            match result {
                Ok(packet) => {
                    tracing::trace!("RX    {}", packet);
                    if inbound.send(packet).await.is_err() {
                        tracing::debug!("Dispatcher gone, stopping frame reader");
                        return;
                    }
                }
                Err(e) => tracing::info!("Error reading packet: {}", e),
            }
        }
    }
}

//! Modem façade and builder.
//!
//! The [`ModemBuilder`] provides a fluent API for configuring timeouts and
//! queue sizes. [`Modem`] owns the two background tasks of a connection:
//! 1. Frame reader: transport read half to decoded packets
//! 2. Dispatcher: ack correlation, subscriber routing and writes
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use insteon_plm::Modem;
//!
//! # async fn run(port: tokio::io::DuplexStream) -> insteon_plm::Result<()> {
//! let modem = Modem::builder()
//!     .timeout(Duration::from_secs(2))
//!     .open(port);
//!
//! let info = modem.info().await?;
//! println!("{}", info);
//!
//! for link in modem.link_db().links().await? {
//!     println!("{}", link);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::ModemConfig;
use crate::connection::{DeviceConnection, Monitor, Registration, Subscription};
use crate::dispatcher::{spawn_dispatcher, Control, DispatcherHandle};
use crate::error::{ModemError, Result};
use crate::linkdb::LinkDb;
use crate::protocol::{Address, Command, ModemInfo, Packet};
use crate::reader::spawn_reader;
use crate::transport::Transport;

/// Builder for configuring and opening a [`Modem`].
#[derive(Debug, Clone, Default)]
pub struct ModemBuilder {
    config: ModemConfig,
}

impl ModemBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting at once, e.g. with a deserialized config.
    pub fn config(mut self, config: ModemConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound on queueing a send, waiting for its ack and waiting in receive.
    ///
    /// Default: 3 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Bound on the wait for each record during link retrieval.
    ///
    /// Default: 3 seconds
    pub fn record_timeout(mut self, timeout: Duration) -> Self {
        self.config.record_timeout = timeout;
        self
    }

    /// Pause before resending a nak'd packet.
    ///
    /// Default: 150 ms
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Capacity of the outbound and inbound dispatcher queues.
    ///
    /// Default: 16
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Capacity of each connection, monitor and subscription channel.
    ///
    /// Default: 8
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.config.subscriber_capacity = capacity;
        self
    }

    /// Start the reader and dispatcher tasks on `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<T: Transport>(self, transport: T) -> Modem {
        let config = self.config.normalized();
        let (read_half, write_half) = tokio::io::split(transport);

        let spawned = spawn_dispatcher(write_half, &config);
        let reader = spawn_reader(read_half, spawned.inbound);

        tracing::debug!("Modem opened with {:?}", config);

        Modem {
            inner: Arc::new(Inner {
                config,
                dispatcher: spawned.handle,
                modem_rx: Mutex::new(spawned.modem_rx),
                send_locks: (0..=u8::MAX).map(|_| Mutex::new(())).collect(),
                reader,
                _dispatcher_task: spawned.task,
            }),
        }
    }

    /// Open the serial device at `path` (19200 8N1) and start the modem.
    #[cfg(feature = "serial")]
    pub fn open_serial(self, path: &str) -> Result<Modem> {
        let port = crate::transport::open_serial(path)?;
        Ok(self.open(port))
    }
}

struct Inner {
    config: ModemConfig,
    dispatcher: DispatcherHandle,
    modem_rx: Mutex<mpsc::Receiver<Packet>>,
    /// One lock per command byte. Keeps a single live ack waiter per command.
    send_locks: Vec<Mutex<()>>,
    reader: JoinHandle<()>,
    _dispatcher_task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // The dispatcher stops on its own once the outbound queue closes.
        self.reader.abort();
    }
}

/// Handle to a running modem connection.
///
/// Cheap to clone. The background tasks stop when the last clone, and every
/// [`DeviceConnection`] and [`LinkDb`] made from it, is dropped.
#[derive(Clone)]
pub struct Modem {
    inner: Arc<Inner>,
}

impl fmt::Debug for Modem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modem")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Modem {
    /// Create a new modem builder.
    pub fn builder() -> ModemBuilder {
        ModemBuilder::new()
    }

    /// Open `transport` with default settings.
    pub fn open<T: Transport>(transport: T) -> Modem {
        ModemBuilder::new().open(transport)
    }

    /// Settings this modem was opened with.
    pub fn settings(&self) -> &ModemConfig {
        &self.inner.config
    }

    /// Send a packet and wait for the modem's reply.
    ///
    /// A nak is resent up to `packet.retry_count` times, `retry_delay` apart.
    /// The last reply is returned as is, so a final nak comes back as
    /// `Ok(reply)` with `reply.is_nak()`.
    pub async fn send(&self, mut packet: Packet) -> Result<Packet> {
        let _guard = self.inner.send_locks[packet.command.byte() as usize]
            .lock()
            .await;

        loop {
            let reply = self.send_once(packet.clone()).await?;
            if !reply.is_nak() || packet.retry_count == 0 {
                return Ok(reply);
            }
            packet.retry_count -= 1;
            tracing::debug!(
                "{} nak'd, retrying ({} left)",
                packet.command,
                packet.retry_count
            );
            tokio::time::sleep(self.inner.config.retry_delay).await;
        }
    }

    async fn send_once(&self, packet: Packet) -> Result<Packet> {
        let timeout = self.inner.config.timeout;
        tracing::trace!("Modem send {}", packet);

        let rx = self.inner.dispatcher.submit(packet, timeout).await?;
        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply?,
            Ok(Err(_)) => return Err(ModemError::ConnectionClosed),
            Err(_) => return Err(ModemError::AckTimeout),
        };

        tracing::trace!("Modem reply {}", reply);
        Ok(reply)
    }

    /// Wait for the next unsolicited modem packet (`0x52` to `0x58`) that
    /// no subscription claimed.
    pub async fn receive(&self) -> Result<Packet> {
        let next = async {
            let mut rx = self.inner.modem_rx.lock().await;
            rx.recv().await
        };
        match tokio::time::timeout(self.inner.config.timeout, next).await {
            Ok(Some(packet)) => {
                tracing::trace!("Modem receive {}", packet);
                Ok(packet)
            }
            Ok(None) => Err(ModemError::ConnectionClosed),
            Err(_) => Err(ModemError::ReadTimeout),
        }
    }

    /// Open a connection to the device at `address`. Replaces any earlier
    /// connection to the same device.
    pub fn connect(&self, address: Address) -> Result<DeviceConnection> {
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_capacity);
        let registration = Registration::register(&self.inner.dispatcher, |id| Control::Connect {
            id,
            address,
            tx,
        })?;
        Ok(DeviceConnection::new(address, self.clone(), rx, registration))
    }

    /// Receive every inbound device message.
    pub fn monitor(&self) -> Result<Monitor> {
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_capacity);
        let registration =
            Registration::register(&self.inner.dispatcher, |id| Control::Monitor { id, tx })?;
        Ok(Monitor::new(rx, registration))
    }

    /// Claim the unsolicited packets of a modem-class `command` ahead of
    /// [`receive`](Self::receive). Other commands are never delivered here.
    pub fn subscribe(&self, command: Command) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_capacity);
        let registration = Registration::register(&self.inner.dispatcher, |id| Control::Subscribe {
            id,
            command,
            tx,
        })?;
        Ok(Subscription::new(command, rx, registration))
    }

    /// Query the modem's address, category and firmware.
    pub async fn info(&self) -> Result<ModemInfo> {
        let reply = self
            .send(Packet::request(Command::GetInfo).with_retries(3))
            .await?;
        if reply.is_nak() {
            return Err(ModemError::Nak(Command::GetInfo));
        }
        reply
            .modem_info()
            .copied()
            .ok_or(ModemError::UnexpectedPayload(Command::GetInfo))
    }

    /// The modem's own link database.
    pub fn link_db(&self) -> LinkDb {
        LinkDb::new(self.clone())
    }

    pub async fn reset(&self) -> Result<()> {
        Err(ModemError::NotImplemented)
    }

    pub async fn config(&self) -> Result<u8> {
        Err(ModemError::NotImplemented)
    }

    pub async fn set_config(&self, _flags: u8) -> Result<()> {
        Err(ModemError::NotImplemented)
    }

    pub async fn set_device_category(&self, _category: u8, _subcategory: u8) -> Result<()> {
        Err(ModemError::NotImplemented)
    }

    pub async fn rf_sleep(&self) -> Result<()> {
        Err(ModemError::NotImplemented)
    }
}

//! Subscriber handles returned by the modem.
//!
//! Each handle owns a [`Registration`]. Dropping the handle releases the
//! registration in the dispatcher, so the registries never outgrow the set of
//! live handles.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::dispatcher::{Control, DispatcherHandle};
use crate::error::{ModemError, Result};
use crate::modem::Modem;
use crate::protocol::{Address, Command, Message, Packet};

/// A live entry in one of the dispatcher's registries.
#[derive(Debug)]
pub(crate) struct Registration {
    id: u64,
    control: mpsc::UnboundedSender<Control>,
}

impl Registration {
    /// Register with the dispatcher. `make` builds the request from the
    /// freshly allocated id.
    pub(crate) fn register<F>(dispatcher: &DispatcherHandle, make: F) -> Result<Self>
    where
        F: FnOnce(u64) -> Control,
    {
        let id = dispatcher.next_id();
        let control = dispatcher.control();
        control
            .send(make(id))
            .map_err(|_| ModemError::ConnectionClosed)?;
        Ok(Self { id, control })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        // The dispatcher may already be gone.
        let _ = self.control.send(Control::Release { id: self.id });
    }
}

async fn recv_within<T>(rx: &mut mpsc::Receiver<T>, timeout: Duration) -> Result<T> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(item)) => Ok(item),
        Ok(None) => Err(ModemError::ConnectionClosed),
        Err(_) => Err(ModemError::ReadTimeout),
    }
}

/// Connection to one remote device through the modem.
///
/// Messages sent go out as `0x62` with three retries. Messages whose source
/// is this device are delivered to [`receive`](Self::receive).
#[derive(Debug)]
pub struct DeviceConnection {
    address: Address,
    modem: Modem,
    rx: mpsc::Receiver<Message>,
    _registration: Registration,
}

impl DeviceConnection {
    pub(crate) fn new(
        address: Address,
        modem: Modem,
        rx: mpsc::Receiver<Message>,
        registration: Registration,
    ) -> Self {
        Self {
            address,
            modem,
            rx,
            _registration: registration,
        }
    }

    /// Address of the remote device.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Send `msg` to the device. The destination is overwritten with this
    /// connection's address.
    pub async fn send(&self, mut msg: Message) -> Result<()> {
        msg.dst = self.address;
        let packet = Packet::new(Command::SendInsteonMessage, msg.into()).with_retries(3);
        let ack = self.modem.send(packet).await?;
        if ack.is_nak() {
            return Err(ModemError::Nak(Command::SendInsteonMessage));
        }
        Ok(())
    }

    /// Wait for the next message from the device.
    pub async fn receive(&mut self) -> Result<Message> {
        let timeout = self.modem.settings().timeout;
        let msg = recv_within(&mut self.rx, timeout).await?;
        tracing::trace!("Device {} received {}", self.address, msg);
        Ok(msg)
    }

    pub async fn set_all_link_command_alias(&self, _matching: [u8; 2], _replace: [u8; 2]) -> Result<()> {
        Err(ModemError::NotImplemented)
    }

    pub async fn set_all_link_command_alias_data(&self, _data: &[u8]) -> Result<()> {
        Err(ModemError::NotImplemented)
    }

    pub async fn block_data_transfer(&self, _start: u16, _end: u16, _length: usize) -> Result<Vec<u8>> {
        Err(ModemError::NotImplemented)
    }
}

/// Receives every inbound device message, whatever its source.
#[derive(Debug)]
pub struct Monitor {
    rx: mpsc::Receiver<Message>,
    _registration: Registration,
}

impl Monitor {
    pub(crate) fn new(rx: mpsc::Receiver<Message>, registration: Registration) -> Self {
        Self {
            rx,
            _registration: registration,
        }
    }

    /// Wait for the next message. `None` once the modem is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Wait at most `timeout` for the next message.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Message> {
        recv_within(&mut self.rx, timeout).await
    }
}

/// Receives the modem-class packets of one command, ahead of
/// [`Modem::receive`].
#[derive(Debug)]
pub struct Subscription {
    command: Command,
    rx: mpsc::Receiver<Packet>,
    _registration: Registration,
}

impl Subscription {
    pub(crate) fn new(command: Command, rx: mpsc::Receiver<Packet>, registration: Registration) -> Self {
        Self {
            command,
            rx,
            _registration: registration,
        }
    }

    /// Command this subscription receives.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Wait at most `timeout` for the next packet.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Packet> {
        let packet = recv_within(&mut self.rx, timeout).await?;
        tracing::trace!("Subscription received {}", packet);
        Ok(packet)
    }
}

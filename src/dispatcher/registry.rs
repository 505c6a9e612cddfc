//! Routing tables owned by the dispatcher.
//!
//! Holds the ack correlation table and the subscriber registries. Only the
//! dispatcher task owns a `Registry`, so none of it is locked.
//!
//! Delivery never waits: subscriber channels are fed with `try_send`, a full
//! channel drops the item and a closed channel drops the registration.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::protocol::{Address, Command, Message, Packet};

/// One-shot reply channel of an outbound request.
pub(crate) type AckSender = oneshot::Sender<Result<Packet>>;

/// Registration requests handled by the dispatcher.
#[derive(Debug)]
pub(crate) enum Control {
    /// Route messages from `address` to `tx`. Replaces any previous entry.
    Connect {
        id: u64,
        address: Address,
        tx: mpsc::Sender<Message>,
    },
    /// Route every device message to `tx`.
    Monitor { id: u64, tx: mpsc::Sender<Message> },
    /// Route packets of a modem-class `command` to `tx`.
    Subscribe {
        id: u64,
        command: Command,
        tx: mpsc::Sender<Packet>,
    },
    /// Drop whatever registration carries `id`.
    Release { id: u64 },
}

#[derive(Debug)]
struct Subscriber<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

/// Outcome of offering an item to a subscriber.
enum Offer<T> {
    Delivered,
    Dropped,
    Closed(T),
}

impl<T> Subscriber<T> {
    fn offer(&self, item: T) -> Offer<T> {
        match self.tx.try_send(item) {
            Ok(()) => Offer::Delivered,
            Err(TrySendError::Full(_)) => Offer::Dropped,
            Err(TrySendError::Closed(item)) => Offer::Closed(item),
        }
    }
}

/// Ack table and subscriber registries.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    acks: HashMap<Command, AckSender>,
    devices: HashMap<Address, Subscriber<Message>>,
    monitors: Vec<Subscriber<Message>>,
    commands: HashMap<Command, Subscriber<Packet>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply a registration request.
    pub(crate) fn apply(&mut self, control: Control) {
        match control {
            Control::Connect { id, address, tx } => {
                tracing::debug!("Registering device connection {} for {}", id, address);
                self.devices.insert(address, Subscriber { id, tx });
            }
            Control::Monitor { id, tx } => {
                tracing::debug!("Registering monitor {}", id);
                self.monitors.push(Subscriber { id, tx });
            }
            Control::Subscribe { id, command, tx } => {
                tracing::debug!("Subscribing {} to {}", id, command);
                self.commands.insert(command, Subscriber { id, tx });
            }
            Control::Release { id } => self.release(id),
        }
    }

    fn release(&mut self, id: u64) {
        self.devices.retain(|_, s| s.id != id);
        self.monitors.retain(|s| s.id != id);
        self.commands.retain(|_, s| s.id != id);
    }

    /// Record the reply channel for `command`. Returns a waiter that was
    /// still registered for the same command, if any.
    pub(crate) fn insert_waiter(&mut self, command: Command, reply: AckSender) -> Option<AckSender> {
        self.acks.insert(command, reply)
    }

    /// Take the reply channel for `command`, clearing the table entry.
    pub(crate) fn take_waiter(&mut self, command: Command) -> Option<AckSender> {
        self.acks.remove(&command)
    }

    /// Deliver an inbound device message to its subscriber and to monitors.
    /// Returns `true` if anyone took it.
    pub(crate) fn deliver_message(&mut self, msg: Message) -> bool {
        let mut delivered = false;

        self.monitors.retain(|monitor| match monitor.offer(msg.clone()) {
            Offer::Delivered => {
                delivered = true;
                true
            }
            Offer::Dropped => {
                tracing::info!("Monitor {} is full, dropping {}", monitor.id, msg);
                true
            }
            Offer::Closed(_) => false,
        });

        let src = msg.src;
        if let Some(conn) = self.devices.get(&src) {
            tracing::debug!("Dispatching message to device connection {}", src);
            match conn.offer(msg) {
                Offer::Delivered => delivered = true,
                Offer::Dropped => {
                    tracing::info!("Connection for {} is full, dropping message", src)
                }
                Offer::Closed(_) => {
                    self.devices.remove(&src);
                }
            }
        }

        delivered
    }

    /// Deliver a modem-class packet to its command subscriber. Gives the
    /// packet back when nobody is listening for it.
    pub(crate) fn deliver_packet(&mut self, packet: Packet) -> Option<Packet> {
        let command = packet.command;
        let Some(sub) = self.commands.get(&command) else {
            return Some(packet);
        };
        match sub.offer(packet) {
            Offer::Delivered => None,
            Offer::Dropped => {
                tracing::info!("Subscriber for {} is full, dropping packet", command);
                None
            }
            Offer::Closed(packet) => {
                self.commands.remove(&command);
                Some(packet)
            }
        }
    }

    /// Number of live device connections.
    #[cfg(test)]
    pub(crate) fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of live command subscriptions.
    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.commands.len()
    }
}

//! # insteon-plm
//!
//! Protocol engine for Insteon PowerLinc modems (PLM).
//!
//! This crate turns the modem's serial byte stream into request/response
//! exchanges with remote devices, and edits the modem's link database.
//!
//! ## Architecture
//!
//! - **Frame reader** (task): bytes to packets, resynchronizing on garbage
//! - **Dispatcher** (task): sole owner of the ack table and subscriber
//!   registries, serializes writes
//! - **[`Modem`]**: send-and-wait-for-ack and receive, bounded by timeouts
//! - **[`LinkDb`]**: paged record retrieval, idempotent add/remove, cleanup
//!
//! ## Example
//!
//! ```no_run
//! use insteon_plm::{Modem, protocol::{Address, Message}};
//!
//! # async fn run(port: tokio::io::DuplexStream) -> insteon_plm::Result<()> {
//! let modem = Modem::open(port);
//!
//! let mut lamp = modem.connect("11.22.33".parse().unwrap())?;
//! lamp.send(Message::standard(lamp.address(), [0x11, 0xff])).await?;
//! let status = lamp.receive().await?;
//! println!("{}", status);
//!
//! modem.link_db().cleanup().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod linkdb;
pub mod protocol;
pub mod transport;

mod connection;
mod dispatcher;
mod modem;
mod reader;

pub use config::ModemConfig;
pub use connection::{DeviceConnection, Monitor, Subscription};
pub use error::{FramingError, ModemError, Result};
pub use linkdb::LinkDb;
pub use modem::{Modem, ModemBuilder};

//! Modem configuration.
//!
//! [`ModemConfig`] holds the timeouts and queue sizes used by the façade,
//! the dispatcher and the link database. It deserializes from the host
//! application's config file with durations given in milliseconds:
//!
//! ```
//! use insteon_plm::ModemConfig;
//!
//! let config: ModemConfig = serde_json::from_str(r#"{ "timeout_ms": 5000 }"#).unwrap();
//! assert_eq!(config.timeout, std::time::Duration::from_secs(5));
//! assert_eq!(config.queue_capacity, insteon_plm::config::DEFAULT_QUEUE_CAPACITY);
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Default bound on every ack/receive wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default bound on the wait for each link record during retrieval.
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(3);

/// Default pause before resending a nak'd packet.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(150);

/// Default capacity of the dispatcher's outbound and inbound queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default capacity of each subscriber's delivery channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 8;

/// Configuration for a modem connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Bound on queueing a send, waiting for its ack, and waiting in receive.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Bound on the wait for each record response during link retrieval.
    #[serde(rename = "record_timeout_ms", with = "millis")]
    pub record_timeout: Duration,
    /// Pause before resending a packet the modem nak'd.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Capacity of the dispatcher's outbound and inbound queues.
    pub queue_capacity: usize,
    /// Capacity of each device/command subscriber channel.
    pub subscriber_capacity: usize,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            record_timeout: DEFAULT_RECORD_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl ModemConfig {
    /// Clamp capacities so that every channel can hold at least one item.
    pub(crate) fn normalized(mut self) -> Self {
        self.queue_capacity = self.queue_capacity.max(1);
        self.subscriber_capacity = self.subscriber_capacity.max(1);
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

//! External capabilities for the Fanuc client bot.
//!
//! Two adapters are provided behind async traits so the interaction engine
//! can be exercised with fakes:
//!
//! - [`KafkaFetch`]: reads the newest record of a topic, optionally filtered
//!   by message key ([`KafkaReader`], backed by rskafka).
//! - [`MachineControl`]: manages machine connections on a remote Fanuc
//!   control API ([`FanucHttpClient`], backed by reqwest).

pub mod error;
pub mod fanuc;
pub mod kafka;
pub mod traits;

pub use error::{AdapterError, Result};
pub use fanuc::{normalize_base_url, FanucHttpClient};
pub use kafka::{KafkaReader, DEFAULT_SCAN_WINDOW};
pub use traits::{KafkaFetch, KafkaRecord, MachineControl};

//! Capability traits for the remote systems the bot talks to.

use async_trait::async_trait;

use fanuc_models::{ConnectionRequest, FanucService, Machine, MachineId};

use crate::error::Result;

/// A record read from Kafka.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaRecord {
    /// Message key, when the record carries one.
    pub key: Option<String>,
    /// Message payload decoded as UTF-8 (lossy).
    pub value: String,
}

/// Read access to the newest record of a topic.
#[async_trait]
pub trait KafkaFetch: Send + Sync {
    /// Returns the newest record, or the newest one whose key equals
    /// `key_filter`.
    ///
    /// Fails with `NotFound` when the topic is empty or no record in the
    /// scanned window matches, and with `Unavailable` on connection errors.
    async fn get_last_message(
        &self,
        broker: &str,
        topic: &str,
        key_filter: Option<&str>,
    ) -> Result<KafkaRecord>;
}

/// Machine-connection management on a remote Fanuc control API.
#[async_trait]
pub trait MachineControl: Send + Sync {
    async fn list_machines(&self, service: &FanucService) -> Result<Vec<Machine>>;

    async fn get_machine(&self, service: &FanucService, id: &MachineId) -> Result<Machine>;

    async fn create_machine(
        &self,
        service: &FanucService,
        request: &ConnectionRequest,
    ) -> Result<Machine>;

    async fn delete_machine(&self, service: &FanucService, id: &MachineId) -> Result<()>;

    async fn start_polling(
        &self,
        service: &FanucService,
        id: &MachineId,
        interval_ms: u64,
    ) -> Result<()>;

    async fn stop_polling(&self, service: &FanucService, id: &MachineId) -> Result<()>;

    /// Returns the control program currently loaded on the machine.
    async fn get_program_text(&self, service: &FanucService, id: &MachineId) -> Result<String>;
}

//! Kafka monitoring targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{KeyId, TargetId, UserId};

/// A key filter stored under a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringKey {
    /// Unique identifier for the key.
    pub id: KeyId,
    /// Target this key belongs to.
    pub target_id: TargetId,
    /// The Kafka message key to filter on.
    pub key: String,
}

/// A saved Kafka read endpoint.
///
/// A keyless "Default" view is always available; every stored key is an
/// independent lookup filter under the same broker/topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringTarget {
    /// Unique identifier for the target.
    pub id: TargetId,
    /// Owning user.
    pub user_id: UserId,
    /// Friendly name.
    pub name: String,
    /// Broker address (`host:port`).
    pub broker: String,
    /// Topic to read from.
    pub topic: String,
    /// Stored key filters.
    #[serde(default)]
    pub keys: Vec<MonitoringKey>,
    /// When the target was created.
    pub created_at: DateTime<Utc>,
}

impl MonitoringTarget {
    /// Finds a stored key by id.
    pub fn key(&self, key_id: KeyId) -> Option<&MonitoringKey> {
        self.keys.iter().find(|k| k.id == key_id)
    }
}

/// A target assembled by the wizard, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTarget {
    /// Owning user.
    pub user_id: UserId,
    /// Friendly name.
    pub name: String,
    /// Broker address.
    pub broker: String,
    /// Topic name.
    pub topic: String,
    /// Initial key filter; empty means no key is stored.
    pub key: String,
}

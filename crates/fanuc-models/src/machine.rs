//! Machine connections exposed by a remote Fanuc service.
//!
//! These are never persisted locally; they mirror the JSON shapes of the
//! remote control API.

use serde::{Deserialize, Serialize};

use crate::ids::MachineId;

/// Connection status reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Connected,
    Disconnected,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Data acquisition mode of a machine connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MachineMode {
    Polling,
    #[default]
    #[serde(other)]
    Static,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Connected => "connected",
            MachineStatus::Disconnected => "disconnected",
            MachineStatus::Unknown => "unknown",
        }
    }
}

impl MachineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineMode::Polling => "polling",
            MachineMode::Static => "static",
        }
    }
}

/// A machine connection on a remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Remote identifier.
    pub id: MachineId,
    /// Controller address (`ip:port`).
    #[serde(default)]
    pub endpoint: String,
    /// Connection timeout in milliseconds.
    #[serde(default)]
    pub timeout: u32,
    /// Controller model.
    #[serde(default)]
    pub model: String,
    /// Controller series (0i, 30i, ...).
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub status: MachineStatus,
    #[serde(default)]
    pub mode: MachineMode,
    /// Polling interval in milliseconds when `mode` is polling.
    #[serde(default)]
    pub interval: u64,
}

impl Machine {
    /// Whether the remote side reports an established connection.
    pub fn is_connected(&self) -> bool {
        self.status == MachineStatus::Connected
    }

    /// Whether the machine is currently being polled.
    pub fn is_polling(&self) -> bool {
        self.mode == MachineMode::Polling
    }
}

/// Request body for creating a machine connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub endpoint: String,
    pub timeout: u32,
    pub model: String,
    pub series: String,
}

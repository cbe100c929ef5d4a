//! Fanuc control-API services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ServiceId, UserId};

/// A saved remote control-API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanucService {
    /// Unique identifier for the service.
    pub id: ServiceId,
    /// Owning user.
    pub user_id: UserId,
    /// Friendly name.
    pub name: String,
    /// Base URL as entered by the user (scheme optional).
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// When the service was created.
    pub created_at: DateTime<Utc>,
}

/// A service assembled by the wizard, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewService {
    pub user_id: UserId,
    pub name: String,
    pub base_url: String,
    pub api_key: String,
}

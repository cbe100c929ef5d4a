//! Store capabilities consumed by the interaction engine.

use async_trait::async_trait;

use fanuc_models::{
    Draft, FanucService, KeyId, MonitoringKey, MonitoringTarget, NewService, NewTarget, ServiceId,
    State, TargetId, UserId, UserSession,
};

use crate::error::Result;

/// Per-user FSM record storage.
///
/// The write operations create the session record when it does not exist yet.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Creates the session on first contact and refreshes the display name.
    async fn upsert_user(&self, user: UserId, display_name: &str) -> Result<UserSession>;

    /// Returns the stored session, if any.
    async fn get_user_state(&self, user: UserId) -> Result<Option<UserSession>>;

    /// Overwrites only the FSM state.
    async fn set_state(&self, user: UserId, state: State) -> Result<()>;

    /// Overwrites only the draft.
    async fn update_draft(&self, user: UserId, draft: Draft) -> Result<()>;

    /// Overwrites state and draft in one write.
    async fn transition(&self, user: UserId, state: State, draft: Draft) -> Result<()>;

    /// Persists a finished target wizard and returns its owner to idle in
    /// one write.
    async fn finish_target(&self, target: NewTarget) -> Result<TargetId>;

    /// Persists a finished service wizard and returns its owner to idle in
    /// one write.
    async fn finish_service(&self, service: NewService) -> Result<ServiceId>;

    /// Appends a key to a target owned by `user` and returns `user` to idle
    /// in one write. Fails `NotFound` without touching the session when the
    /// target is gone or foreign.
    async fn finish_key(&self, user: UserId, target: TargetId, key: &str) -> Result<KeyId>;
}

/// Kafka target storage.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Persists a target (and its initial key, when non-empty).
    async fn add_target(&self, target: NewTarget) -> Result<TargetId>;

    /// Deletes a target owned by `user`, together with its keys.
    async fn delete_target(&self, id: TargetId, user: UserId) -> Result<()>;

    /// Targets owned by `user`, oldest first.
    async fn list_targets(&self, user: UserId) -> Result<Vec<MonitoringTarget>>;

    async fn get_target(&self, id: TargetId) -> Result<MonitoringTarget>;

    /// Appends a key to an existing target.
    async fn add_key(&self, target: TargetId, key: &str) -> Result<KeyId>;

    /// Deletes a key whose target is owned by `user`.
    async fn delete_key(&self, key: KeyId, user: UserId) -> Result<()>;

    async fn get_key(&self, key: KeyId) -> Result<MonitoringKey>;
}

/// Fanuc service storage.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn add_service(&self, service: NewService) -> Result<ServiceId>;

    /// Deletes a service owned by `user`.
    async fn delete_service(&self, id: ServiceId, user: UserId) -> Result<()>;

    /// Services owned by `user`, oldest first.
    async fn list_services(&self, user: UserId) -> Result<Vec<FanucService>>;

    async fn get_service(&self, id: ServiceId) -> Result<FanucService>;
}

//! Single-document JSON store.
//!
//! Everything lives in one file:
//! ```text
//! state_dir/
//! └── store.json   { next_id, users: [...], targets: [...], services: [...] }
//! ```
//!
//! Each mutation runs against a clone of the in-memory document. The clone
//! is written atomically and only then swapped in, so a failed write leaves
//! both memory and disk untouched.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use fanuc_models::{
    Draft, FanucService, KeyId, MonitoringKey, MonitoringTarget, NewService, NewTarget, ServiceId,
    State, TargetId, UserId, UserSession,
};

use crate::atomic::{read_json_if_exists, write_json_atomic};
use crate::error::{PersistenceError, Result};
use crate::traits::{ServiceStore, StateStore, TargetStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    /// Shared counter for target, key and service ids.
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    users: Vec<UserSession>,
    #[serde(default)]
    targets: Vec<MonitoringTarget>,
    #[serde(default)]
    services: Vec<FanucService>,
}

impl StoreData {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn session_mut(&mut self, user: UserId) -> &mut UserSession {
        let idx = match self.users.iter().position(|u| u.user_id == user) {
            Some(idx) => idx,
            None => {
                self.users.push(UserSession::new(user, ""));
                self.users.len() - 1
            }
        };
        &mut self.users[idx]
    }

    fn reset_session(&mut self, user: UserId) {
        let session = self.session_mut(user);
        session.state = State::Idle;
        session.draft = Draft::Empty;
        session.updated_at = Utc::now();
    }

    fn push_target(&mut self, target: NewTarget) -> TargetId {
        let id = TargetId(self.allocate_id());
        let mut keys = Vec::new();
        if !target.key.is_empty() {
            keys.push(MonitoringKey {
                id: KeyId(self.allocate_id()),
                target_id: id,
                key: target.key,
            });
        }
        self.targets.push(MonitoringTarget {
            id,
            user_id: target.user_id,
            name: target.name,
            broker: target.broker,
            topic: target.topic,
            keys,
            created_at: Utc::now(),
        });
        id
    }

    fn push_service(&mut self, service: NewService) -> ServiceId {
        let id = ServiceId(self.allocate_id());
        self.services.push(FanucService {
            id,
            user_id: service.user_id,
            name: service.name,
            base_url: service.base_url,
            api_key: service.api_key,
            created_at: Utc::now(),
        });
        id
    }

    fn push_key(&mut self, target: TargetId, key: &str) -> Result<KeyId> {
        let id = KeyId(self.allocate_id());
        self.target_mut(target)?.keys.push(MonitoringKey {
            id,
            target_id: target,
            key: key.to_string(),
        });
        Ok(id)
    }

    fn target_mut(&mut self, id: TargetId) -> Result<&mut MonitoringTarget> {
        self.targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PersistenceError::not_found("target", id))
    }
}

/// JSON-file implementation of every store capability.
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    ///
    /// Nothing is written until the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data: StoreData = read_json_if_exists(&path)?.unwrap_or_default();
        info!(
            path = %path.display(),
            users = data.users.len(),
            targets = data.targets.len(),
            services = data.services.len(),
            "Opened store"
        );
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    async fn read<R>(&self, f: impl FnOnce(&StoreData) -> Result<R>) -> Result<R> {
        let guard = self.data.lock().await;
        f(&guard)
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut StoreData) -> Result<R>) -> Result<R> {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_json_atomic(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl StateStore for JsonStore {
    async fn upsert_user(&self, user: UserId, display_name: &str) -> Result<UserSession> {
        {
            let guard = self.data.lock().await;
            if let Some(existing) = guard.users.iter().find(|u| u.user_id == user) {
                if existing.display_name == display_name {
                    return Ok(existing.clone());
                }
            }
        }

        self.mutate(|data| {
            let session = data.session_mut(user);
            session.display_name = display_name.to_string();
            session.updated_at = Utc::now();
            Ok(session.clone())
        })
        .await
    }

    async fn get_user_state(&self, user: UserId) -> Result<Option<UserSession>> {
        self.read(|data| Ok(data.users.iter().find(|u| u.user_id == user).cloned()))
            .await
    }

    async fn set_state(&self, user: UserId, state: State) -> Result<()> {
        self.mutate(|data| {
            let session = data.session_mut(user);
            session.state = state;
            session.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn update_draft(&self, user: UserId, draft: Draft) -> Result<()> {
        self.mutate(|data| {
            let session = data.session_mut(user);
            session.draft = draft;
            session.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn transition(&self, user: UserId, state: State, draft: Draft) -> Result<()> {
        debug!(user_id = %user, state = %state, "State transition");
        self.mutate(|data| {
            let session = data.session_mut(user);
            session.state = state;
            session.draft = draft;
            session.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn finish_target(&self, target: NewTarget) -> Result<TargetId> {
        self.mutate(|data| {
            let user = target.user_id;
            let id = data.push_target(target);
            data.reset_session(user);
            Ok(id)
        })
        .await
    }

    async fn finish_service(&self, service: NewService) -> Result<ServiceId> {
        self.mutate(|data| {
            let user = service.user_id;
            let id = data.push_service(service);
            data.reset_session(user);
            Ok(id)
        })
        .await
    }

    async fn finish_key(&self, user: UserId, target: TargetId, key: &str) -> Result<KeyId> {
        self.mutate(|data| {
            if data.target_mut(target)?.user_id != user {
                return Err(PersistenceError::not_found("target", target));
            }
            let id = data.push_key(target, key)?;
            data.reset_session(user);
            Ok(id)
        })
        .await
    }
}

#[async_trait]
impl TargetStore for JsonStore {
    async fn add_target(&self, target: NewTarget) -> Result<TargetId> {
        self.mutate(|data| Ok(data.push_target(target))).await
    }

    async fn delete_target(&self, id: TargetId, user: UserId) -> Result<()> {
        self.mutate(|data| {
            let idx = data
                .targets
                .iter()
                .position(|t| t.id == id && t.user_id == user)
                .ok_or_else(|| PersistenceError::not_found("target", id))?;
            data.targets.remove(idx);
            Ok(())
        })
        .await
    }

    async fn list_targets(&self, user: UserId) -> Result<Vec<MonitoringTarget>> {
        self.read(|data| {
            Ok(data
                .targets
                .iter()
                .filter(|t| t.user_id == user)
                .cloned()
                .collect())
        })
        .await
    }

    async fn get_target(&self, id: TargetId) -> Result<MonitoringTarget> {
        self.read(|data| {
            data.targets
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| PersistenceError::not_found("target", id))
        })
        .await
    }

    async fn add_key(&self, target: TargetId, key: &str) -> Result<KeyId> {
        self.mutate(|data| data.push_key(target, key)).await
    }

    async fn delete_key(&self, key: KeyId, user: UserId) -> Result<()> {
        self.mutate(|data| {
            let target = data
                .targets
                .iter_mut()
                .filter(|t| t.user_id == user)
                .find(|t| t.keys.iter().any(|k| k.id == key))
                .ok_or_else(|| PersistenceError::not_found("key", key))?;
            target.keys.retain(|k| k.id != key);
            Ok(())
        })
        .await
    }

    async fn get_key(&self, key: KeyId) -> Result<MonitoringKey> {
        self.read(|data| {
            data.targets
                .iter()
                .flat_map(|t| t.keys.iter())
                .find(|k| k.id == key)
                .cloned()
                .ok_or_else(|| PersistenceError::not_found("key", key))
        })
        .await
    }
}

#[async_trait]
impl ServiceStore for JsonStore {
    async fn add_service(&self, service: NewService) -> Result<ServiceId> {
        self.mutate(|data| Ok(data.push_service(service))).await
    }

    async fn delete_service(&self, id: ServiceId, user: UserId) -> Result<()> {
        self.mutate(|data| {
            let idx = data
                .services
                .iter()
                .position(|s| s.id == id && s.user_id == user)
                .ok_or_else(|| PersistenceError::not_found("service", id))?;
            data.services.remove(idx);
            Ok(())
        })
        .await
    }

    async fn list_services(&self, user: UserId) -> Result<Vec<FanucService>> {
        self.read(|data| {
            Ok(data
                .services
                .iter()
                .filter(|s| s.user_id == user)
                .cloned()
                .collect())
        })
        .await
    }

    async fn get_service(&self, id: ServiceId) -> Result<FanucService> {
        self.read(|data| {
            data.services
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| PersistenceError::not_found("service", id))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanuc_models::{NewKeyDraft, ServiceDraft, TargetDraft};
    use tempfile::tempdir;

    fn new_target(user: i64, name: &str, key: &str) -> NewTarget {
        NewTarget {
            user_id: UserId(user),
            name: name.to_string(),
            broker: "10.0.0.5:9092".to_string(),
            topic: "telemetry".to_string(),
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonStore::open(&path).unwrap();
        assert!(store.list_targets(UserId(1)).await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_upsert_user_refreshes_name_and_keeps_state() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();
        let user = UserId(5);

        store.upsert_user(user, "Ann").await.unwrap();
        store
            .transition(user, State::WaitingBroker, Draft::Target(TargetDraft::default()))
            .await
            .unwrap();
        let session = store.upsert_user(user, "Ann B").await.unwrap();

        assert_eq!(session.display_name, "Ann B");
        assert_eq!(session.state, State::WaitingBroker);
    }

    #[tokio::test]
    async fn test_add_target_with_empty_key_stores_no_key() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();

        let id = store.add_target(new_target(1, "CNC1", "")).await.unwrap();
        let target = store.get_target(id).await.unwrap();
        assert!(target.keys.is_empty());

        let id = store.add_target(new_target(1, "CNC2", "m-7")).await.unwrap();
        let target = store.get_target(id).await.unwrap();
        assert_eq!(target.keys.len(), 1);
        assert_eq!(target.keys[0].key, "m-7");
        assert_eq!(target.keys[0].target_id, id);
    }

    #[tokio::test]
    async fn test_delete_target_checks_owner() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();

        let id = store.add_target(new_target(1, "CNC1", "")).await.unwrap();
        let err = store.delete_target(id, UserId(2)).await.unwrap_err();
        assert!(err.is_not_found());

        store.delete_target(id, UserId(1)).await.unwrap();
        assert!(store.get_target(id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_keys_are_addressed_globally() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();

        let target = store.add_target(new_target(1, "CNC1", "")).await.unwrap();
        let key = store.add_key(target, "spindle").await.unwrap();

        let stored = store.get_key(key).await.unwrap();
        assert_eq!(stored.target_id, target);
        assert_eq!(stored.key, "spindle");

        assert!(store.delete_key(key, UserId(9)).await.unwrap_err().is_not_found());
        store.delete_key(key, UserId(1)).await.unwrap();
        assert!(store.get_key(key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_add_key_to_missing_target_fails() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();

        let err = store.add_key(TargetId(404), "k").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let store = JsonStore::open(state_dir.join("store.json")).unwrap();
        store.add_target(new_target(1, "CNC1", "")).await.unwrap();

        // swap the state dir for a regular file so the next write fails
        std::fs::remove_dir_all(&state_dir).unwrap();
        std::fs::write(&state_dir, "regular file").unwrap();

        let err = store.add_target(new_target(1, "CNC2", "")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::DirectoryError { .. }));

        let targets = store.list_targets(UserId(1)).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "CNC1");
    }

    #[tokio::test]
    async fn test_set_state_and_update_draft_write_one_field_each() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();
        let user = UserId(3);

        // writes create the session on first contact
        store.set_state(user, State::WaitingBroker).await.unwrap();
        let session = store.get_user_state(user).await.unwrap().unwrap();
        assert_eq!(session.state, State::WaitingBroker);
        assert_eq!(session.draft, Draft::Empty);

        let draft = Draft::Target(TargetDraft {
            name: "CNC1".into(),
            ..TargetDraft::default()
        });
        store.update_draft(user, draft.clone()).await.unwrap();
        let session = store.get_user_state(user).await.unwrap().unwrap();
        assert_eq!(session.state, State::WaitingBroker);
        assert_eq!(session.draft, draft);
        assert!(session.is_consistent());
    }

    #[tokio::test]
    async fn test_finish_target_saves_and_resets_in_one_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonStore::open(&path).unwrap();
        let user = UserId(1);
        store
            .transition(user, State::WaitingKey, Draft::Target(TargetDraft::default()))
            .await
            .unwrap();

        let id = store.finish_target(new_target(1, "CNC1", "m-7")).await.unwrap();

        let reopened = JsonStore::open(&path).unwrap();
        let session = reopened.get_user_state(user).await.unwrap().unwrap();
        assert_eq!(session.state, State::Idle);
        assert_eq!(session.draft, Draft::Empty);
        assert_eq!(reopened.get_target(id).await.unwrap().keys.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_finish_keeps_session_and_records() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let store = JsonStore::open(state_dir.join("store.json")).unwrap();
        let user = UserId(1);
        store
            .transition(user, State::WaitingSvcKey, Draft::Service(ServiceDraft::default()))
            .await
            .unwrap();

        std::fs::remove_dir_all(&state_dir).unwrap();
        std::fs::write(&state_dir, "regular file").unwrap();

        let err = store
            .finish_service(NewService {
                user_id: user,
                name: "Plant A".into(),
                base_url: "10.0.0.2:8080".into(),
                api_key: "secret".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::DirectoryError { .. }));

        let session = store.get_user_state(user).await.unwrap().unwrap();
        assert_eq!(session.state, State::WaitingSvcKey);
        assert!(store.list_services(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finish_key_checks_owner_before_resetting() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();
        let target = store.add_target(new_target(1, "CNC1", "")).await.unwrap();
        let intruder = UserId(2);
        store
            .transition(
                intruder,
                State::WaitingNewKey,
                Draft::NewKey(NewKeyDraft { target_id: target }),
            )
            .await
            .unwrap();

        let err = store.finish_key(intruder, target, "spindle").await.unwrap_err();
        assert!(err.is_not_found());
        let session = store.get_user_state(intruder).await.unwrap().unwrap();
        assert_eq!(session.state, State::WaitingNewKey);

        let key = store.finish_key(UserId(1), target, "spindle").await.unwrap();
        assert_eq!(store.get_key(key).await.unwrap().target_id, target);
        let owner = store.get_user_state(UserId(1)).await.unwrap().unwrap();
        assert_eq!(owner.state, State::Idle);
    }

    #[tokio::test]
    async fn test_services_are_scoped_per_user() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).unwrap();

        let a = store
            .add_service(NewService {
                user_id: UserId(1),
                name: "Plant A".into(),
                base_url: "10.0.0.2:8080".into(),
                api_key: "secret".into(),
            })
            .await
            .unwrap();

        assert_eq!(store.list_services(UserId(1)).await.unwrap().len(), 1);
        assert!(store.list_services(UserId(2)).await.unwrap().is_empty());
        assert!(store.delete_service(a, UserId(2)).await.unwrap_err().is_not_found());
        store.delete_service(a, UserId(1)).await.unwrap();
        assert!(store.list_services(UserId(1)).await.unwrap().is_empty());
    }
}

//! Kafka target lookups shared by one-shot checks and live sessions.

use std::sync::Arc;

use fanuc_adapters::{AdapterError, KafkaFetch, KafkaRecord};
use fanuc_models::{KeyId, MonitoringKey, MonitoringTarget, TargetId, UserId};
use fanuc_persistence::TargetStore;

use crate::error::{CoreError, Result};

/// Resolves targets and keys and reads their newest record.
#[derive(Clone)]
pub struct Monitoring {
    targets: Arc<dyn TargetStore>,
    kafka: Arc<dyn KafkaFetch>,
}

impl Monitoring {
    pub fn new(targets: Arc<dyn TargetStore>, kafka: Arc<dyn KafkaFetch>) -> Self {
        Self { targets, kafka }
    }

    /// Loads a target owned by `user` and, when given, one of its keys.
    pub async fn resolve(
        &self,
        user: UserId,
        target_id: TargetId,
        key_id: Option<KeyId>,
    ) -> Result<(MonitoringTarget, Option<MonitoringKey>)> {
        let target = self.targets.get_target(target_id).await?;
        if target.user_id != user {
            return Err(CoreError::not_found("target", target_id));
        }

        let key = match key_id {
            None => None,
            Some(key_id) => {
                let key = self.targets.get_key(key_id).await?;
                if key.target_id != target.id {
                    return Err(CoreError::not_found("key", key_id));
                }
                Some(key)
            }
        };
        Ok((target, key))
    }

    /// Reads the newest record for an already resolved target.
    pub async fn fetch(
        &self,
        target: &MonitoringTarget,
        key: Option<&MonitoringKey>,
    ) -> Result<KafkaRecord> {
        self.kafka
            .get_last_message(&target.broker, &target.topic, key.map(|k| k.key.as_str()))
            .await
            .map_err(|e| match e {
                AdapterError::NotFound(what) => CoreError::not_found("message", what),
                other => CoreError::from(other)
                    .during(format!("read {} from {}", target.topic, target.broker)),
            })
    }
}

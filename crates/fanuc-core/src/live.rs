//! Live sessions: a per-user loop that keeps one chat message showing the
//! newest Kafka record.

use std::sync::Arc;

use chrono::Local;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use fanuc_models::{KeyId, MonitoringKey, MonitoringTarget, UserId};

use crate::config::LiveConfig;
use crate::error::Result;
use crate::monitoring::Monitoring;
use crate::registry::{CancelToken, SessionId, SessionRegistry};
use crate::render::{RenderError, Renderer};
use crate::views;

/// Starts and stops live sessions.
#[derive(Clone)]
pub struct LiveSessionManager {
    registry: Arc<SessionRegistry>,
    monitoring: Monitoring,
    config: LiveConfig,
}

/// Everything a running loop owns.
struct LiveLoop {
    user: UserId,
    session: SessionId,
    token: CancelToken,
    title: String,
    target: MonitoringTarget,
    key: Option<MonitoringKey>,
    renderer: Arc<dyn Renderer>,
    registry: Arc<SessionRegistry>,
    monitoring: Monitoring,
    config: LiveConfig,
}

impl LiveSessionManager {
    pub fn new(registry: Arc<SessionRegistry>, monitoring: Monitoring, config: LiveConfig) -> Self {
        Self {
            registry,
            monitoring,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Starts streaming `target` (optionally filtered by `key`) for `user`.
    ///
    /// Any previous session of the user is cancelled first. The placeholder
    /// is rendered before this returns; the refresh loop runs on its own task.
    pub async fn start_live(
        &self,
        user: UserId,
        target: MonitoringTarget,
        key: Option<MonitoringKey>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<()> {
        let gate = self.registry.render_gate(user).await;
        let _render = gate.lock().await;
        let (session, token) = self.registry.replace(user).await;

        let title = views::live_title(&target, key.as_ref());
        let key_id = key.as_ref().map(|k| k.id);
        if let Err(e) = renderer
            .edit_current(views::live_placeholder(&title, target.id, key_id))
            .await
        {
            self.registry.release(user, session).await;
            return Err(e.into());
        }

        info!(
            user_id = %user,
            target_id = %target.id,
            key_id = ?key_id.map(KeyId::get),
            "Live session started"
        );

        let live = LiveLoop {
            user,
            session,
            token,
            title,
            target,
            key,
            renderer,
            registry: Arc::clone(&self.registry),
            monitoring: self.monitoring.clone(),
            config: self.config,
        };
        tokio::spawn(live.run());
        Ok(())
    }

    /// Cancels the user's session, if any. Waits for a frame already being
    /// drawn; in-flight fetches finish but their result is dropped.
    pub async fn stop_live(&self, user: UserId) -> bool {
        let gate = self.registry.render_gate(user).await;
        let _render = gate.lock().await;
        let stopped = self.registry.remove(user).await;
        if stopped {
            info!(user_id = %user, "Live session stopped");
        }
        stopped
    }

    pub async fn is_live(&self, user: UserId) -> bool {
        self.registry.is_active(user).await
    }
}

impl LiveLoop {
    async fn run(mut self) {
        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_body: Option<String> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let body = self.fetch_body().await;
            if last_body.as_deref() == Some(body.as_str()) {
                continue;
            }

            let gate = self.registry.render_gate(self.user).await;
            let _render = gate.lock().await;
            if self.token.is_cancelled() {
                break;
            }

            let timestamp = Local::now().format("%H:%M:%S").to_string();
            let key_id = self.key.as_ref().map(|k| k.id);
            let view = views::live_frame(&self.title, &timestamp, &body, self.target.id, key_id);

            match self.renderer.edit_current(view).await {
                Ok(()) => last_body = Some(body),
                Err(RenderError::TargetGone(reason)) => {
                    info!(user_id = %self.user, reason = %reason, "Live message gone, ending session");
                    self.registry.release(self.user, self.session).await;
                    break;
                }
                Err(e) => {
                    warn!(user_id = %self.user, error = %e, "Failed to render live frame");
                }
            }
        }

        debug!(user_id = %self.user, "Live loop finished");
    }

    async fn fetch_body(&self) -> String {
        let fetch = self.monitoring.fetch(&self.target, self.key.as_ref());
        match timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(record)) => views::live_body(Ok(&record.value)),
            Ok(Err(e)) => views::live_body(Err(&e.to_string())),
            Err(_) => views::live_body(Err(&format!(
                "no answer within {} ms",
                self.config.fetch_timeout.as_millis()
            ))),
        }
    }
}

//! Process-wide registry of live sessions.
//!
//! Holds at most one cancellation handle per user. Cancellation is a
//! `watch` channel: the registry keeps the sender, the loop keeps a
//! [`CancelToken`] wrapping the receiver.
//!
//! Each user also has a render gate. Starting, stopping and drawing a frame
//! all happen under it, so a frame already on the wire lands before the
//! next session's placeholder, and a cancelled loop never draws again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::debug;

use fanuc_models::UserId;

/// Receiving side of a session's cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether the session was cancelled or its handle dropped.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the session is cancelled.
    pub async fn cancelled(&mut self) {
        while !self.is_cancelled() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Identifies one registration, so a loop can only remove its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

struct LiveHandle {
    session: SessionId,
    cancel: watch::Sender<bool>,
}

impl LiveHandle {
    fn cancel(self) {
        self.cancel.send_replace(true);
    }
}

/// Map from user to the handle of their live session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, LiveHandle>>,
    gates: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
    next_session: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for `user`, cancelling the previous one in
    /// the same critical section.
    pub async fn replace(&self, user: UserId) -> (SessionId, CancelToken) {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = watch::channel(false);

        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = sessions.insert(user, LiveHandle { session, cancel: tx }) {
            debug!(user_id = %user, "Replacing live session");
            previous.cancel();
        }
        (session, CancelToken { rx })
    }

    /// Cancels and removes the user's session. Returns whether one existed.
    pub async fn remove(&self, user: UserId) -> bool {
        let removed = self.sessions.lock().await.remove(&user);
        match removed {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes the user's session only if it is still `session`.
    ///
    /// Used by a loop terminating itself, so it never removes a newer
    /// session that replaced it.
    pub async fn release(&self, user: UserId, session: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(&user) {
            Some(handle) if handle.session == session => {
                if let Some(handle) = sessions.remove(&user) {
                    handle.cancel();
                }
                true
            }
            _ => false,
        }
    }

    /// The lock that orders every render of `user`'s live sessions.
    pub async fn render_gate(&self, user: UserId) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(user).or_default())
    }

    pub async fn is_active(&self, user: UserId) -> bool {
        self.sessions.lock().await.contains_key(&user)
    }

    /// Number of users with a live session.
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

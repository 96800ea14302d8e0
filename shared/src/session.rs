//! Per-conversation order drafts held in process memory.
//!
//! Each conversation is keyed by its own session id and its draft expires
//! after a period of inactivity. Nothing is persisted: a cold start forgets
//! every draft.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::OrderDraft;

#[derive(Debug, Clone)]
struct SessionEntry {
    draft: OrderDraft,
    expires_at: DateTime<Utc>,
}

/// Expiring map from session id to order draft.
pub struct SessionStore {
    entries: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a fresh session id.
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// The live draft for `session_id`, or an empty one.
    pub async fn load(&self, session_id: &str) -> OrderDraft {
        self.load_at(session_id, Utc::now()).await
    }

    async fn load_at(&self, session_id: &str, now: DateTime<Utc>) -> OrderDraft {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(session_id) {
            Some(entry) if entry.expires_at > now => return entry.draft.clone(),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(session_id = %session_id, "Session expired");
            entries.remove(session_id);
        }
        OrderDraft::default()
    }

    /// Store `draft` and push its expiry forward.
    pub async fn save(&self, session_id: &str, draft: OrderDraft) {
        self.save_at(session_id, draft, Utc::now()).await
    }

    async fn save_at(&self, session_id: &str, draft: OrderDraft, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        let purged = purge(&mut entries, now);
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        entries.insert(
            session_id.to_string(),
            SessionEntry {
                draft,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Forget the draft for `session_id`.
    pub async fn clear(&self, session_id: &str) {
        self.entries.lock().await.remove(session_id);
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        purge(&mut *self.entries.lock().await, Utc::now())
    }

    pub async fn session_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn purge(entries: &mut HashMap<String, SessionEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at > now);
    before - entries.len()
}

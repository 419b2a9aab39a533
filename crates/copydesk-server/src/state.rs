use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use copydesk_pipeline::wizard::WizardSession;
use copydesk_pipeline::Pipeline;

/// Shared server state: the orchestrator, the in-memory session table,
/// and the HTTP client used for fetching URL sources.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub sessions: SessionStore,
    pub fetcher: reqwest::Client,
}

/// In-memory wizard sessions keyed by id. Cloning shares the table.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, WizardSession>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: WizardSession) {
        self.inner.write().await.insert(session.id, session);
    }

    /// Returns a clone of the session, if it exists.
    pub async fn get(&self, id: Uuid) -> Option<WizardSession> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Runs `f` against the live session under the write lock. Returns
    /// `None` when the session does not exist.
    pub async fn modify<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut WizardSession) -> T,
    ) -> Option<T> {
        self.inner.write().await.get_mut(&id).map(f)
    }

    pub async fn remove(&self, id: Uuid) -> Option<WizardSession> {
        self.inner.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drops sessions idle past `ttl_secs`. Returns how many were removed.
    pub async fn sweep(&self, ttl_secs: u64) -> usize {
        let now = Utc::now();
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(ttl_secs, now));
        before - sessions.len()
    }
}

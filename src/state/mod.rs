//! Session persistence layer
//!
//! Checkpoints the conversation state of each session between turns,
//! including a suspended account confirmation.
//! Currently in-memory; the trait is the seam for a durable backend.

use crate::models::{ConversationState, PendingConfirmation};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// Held for the duration of one turn on a session
pub type SessionGuard = OwnedMutexGuard<()>;

/// Everything needed to continue a session on its next turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionCheckpoint {
    pub session_id: Uuid,
    pub state: ConversationState,
    pub pending: Option<PendingConfirmation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    pub fn new(session_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            state: ConversationState::new(),
            pending: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }
}

/// Trait for session persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>>;
    async fn save(&self, checkpoint: SessionCheckpoint) -> Result<()>;
    /// Returns whether a checkpoint existed
    async fn remove(&self, session_id: Uuid) -> Result<bool>;
    /// Exclusive access to a session until the guard drops
    async fn lock_session(&self, session_id: Uuid) -> Result<SessionGuard>;
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionCheckpoint>>>,
    locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).cloned())
    }

    async fn save(&self, mut checkpoint: SessionCheckpoint) -> Result<()> {
        checkpoint.updated_at = Utc::now();

        let mut sessions = self.sessions.write().await;
        sessions.insert(checkpoint.session_id, checkpoint);
        Ok(())
    }

    async fn remove(&self, session_id: Uuid) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&session_id).is_some())
    }

    async fn lock_session(&self, session_id: Uuid) -> Result<SessionGuard> {
        // Lock entries outlive their checkpoint so a waiter never races a
        // freshly created mutex
        let lock = {
            let mut locks = self.locks.write().await;
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        Ok(lock.lock_owned().await)
    }
}

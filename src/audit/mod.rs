//! Audit trail of conversation turns
//!
//! Every turn is recorded with the path it took through the graph and a
//! hash of the state it produced.

use crate::models::{ConversationState, CustomerIdentity};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcomeKind {
    Replied,
    AwaitingConfirmation,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub audit_id: Uuid,
    pub session_id: Uuid,
    /// User message or confirmation decision
    pub input: String,
    pub trace: Vec<String>,
    pub outcome: TurnOutcomeKind,
    pub identity: Option<CustomerIdentity>,
    pub state_hash: String,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    /// The state the hash was taken over
    #[serde(skip)]
    pub(crate) state: Option<ConversationState>,
}

impl TurnRecord {
    pub fn new(
        session_id: Uuid,
        input: impl Into<String>,
        trace: Vec<String>,
        outcome: TurnOutcomeKind,
        state: &ConversationState,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            session_id,
            input: input.into(),
            trace,
            outcome,
            identity: state.identity.clone(),
            state_hash: compute_state_hash(state),
            created_at: Utc::now(),
            execution_time_ms,
            state: Some(state.clone()),
        }
    }
}

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, TurnRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record(&self, record: TurnRecord) -> Result<Uuid> {
        let audit_id = record.audit_id;
        let mut records = self.records.write().await;
        records.insert(audit_id, record);
        Ok(audit_id)
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<Option<TurnRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&audit_id).cloned())
    }

    /// Turns of a session, oldest first
    pub async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<TurnRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| record.session_id == session_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.created_at);
        Ok(items)
    }

    /// Recompute the state hash of a record and compare
    pub async fn verify_integrity(&self, audit_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        Ok(match records.get(&audit_id) {
            Some(TurnRecord {
                state: Some(state),
                state_hash,
                ..
            }) => compute_state_hash(state) == *state_hash,
            _ => false,
        })
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA256 over the JSON form of a conversation state
pub fn compute_state_hash(state: &ConversationState) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), state).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into a digest via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    fn state() -> ConversationState {
        let mut state = ConversationState::new();
        state.push(Message::human("hi"));
        state
    }

    #[test]
    fn test_state_hash_is_stable() {
        let state = state();
        let hash = compute_state_hash(&state);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_state_hash(&state.clone()));

        let mut changed = state.clone();
        changed.summary = Some("s".to_string());
        assert_ne!(hash, compute_state_hash(&changed));
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let log = AuditLog::new();
        let session_id = Uuid::new_v4();
        let state = state();

        let first = log
            .record(TurnRecord::new(
                session_id,
                "hi",
                vec!["get_customer_email".to_string()],
                TurnOutcomeKind::Replied,
                &state,
                3,
            ))
            .await
            .unwrap();
        let second = log
            .record(TurnRecord::new(
                session_id,
                "a@x.com",
                vec![],
                TurnOutcomeKind::AwaitingConfirmation,
                &state,
                5,
            ))
            .await
            .unwrap();
        log.record(TurnRecord::new(
            Uuid::new_v4(),
            "other",
            vec![],
            TurnOutcomeKind::Failed,
            &state,
            1,
        ))
        .await
        .unwrap();

        let turns = log.list_for_session(session_id).await.unwrap();
        let ids: Vec<_> = turns.iter().map(|t| t.audit_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first) && ids.contains(&second));
        assert!(turns[0].created_at <= turns[1].created_at);

        assert_eq!(log.get(first).await.unwrap().unwrap().input, "hi");
        assert!(log.verify_integrity(first).await.unwrap());
        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
    }
}

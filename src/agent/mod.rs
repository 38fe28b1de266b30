//! Session-level agent
//!
//! INPUT → LOAD CHECKPOINT → RUN GRAPH → SAVE CHECKPOINT → AUDIT
//!
//! Turns on one session run one at a time. A suspended session only
//! accepts a confirmation decision; a failed turn leaves the stored
//! checkpoint as it was.

use crate::audit::{AuditLog, TurnOutcomeKind, TurnRecord};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::{Graph, GraphRun};
use crate::llm::{ChatModel, OpenAiChatClient};
use crate::models::{ConfirmationRequest, ConversationState, Message};
use crate::state::{InMemorySessionStore, SessionCheckpoint, SessionStore};
use crate::store::MusicStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a turn produced for the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub audit_id: Uuid,
    /// Latest assistant reply; absent while a confirmation is pending
    pub reply: Option<String>,
    pub confirmation: Option<ConfirmationRequest>,
    pub trace: Vec<String>,
    pub state: ConversationState,
}

pub struct Agent {
    graph: Graph,
    sessions: Box<dyn SessionStore>,
    audit_log: AuditLog,
}

impl Agent {
    pub fn new(graph: Graph, sessions: Box<dyn SessionStore>, audit_log: AuditLog) -> Self {
        Self {
            graph,
            sessions,
            audit_log,
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Run one user turn
    pub async fn handle_message(&self, session_id: Uuid, content: &str) -> Result<TurnOutcome> {
        if content.trim().is_empty() {
            return Err(AgentError::InvalidInput("message content is empty".to_string()));
        }

        let start_time = Instant::now();
        let _guard = self.sessions.lock_session(session_id).await?;

        let mut checkpoint = match self.sessions.load(session_id).await? {
            Some(checkpoint) => checkpoint,
            None => {
                debug!(session_id = %session_id, "Starting new session");
                SessionCheckpoint::new(session_id)
            }
        };

        if checkpoint.is_suspended() {
            return Err(AgentError::ConfirmationPending(session_id));
        }

        info!(
            session_id = %session_id,
            verified = checkpoint.state.is_verified(),
            "Agent: handling message"
        );

        let mut state = checkpoint.state.clone();
        state.push(Message::human(content));

        let result = self.graph.invoke(state.clone()).await;
        let run = self
            .finish_run(session_id, content, &state, result, start_time)
            .await?;

        self.commit(&mut checkpoint, run, content, start_time).await
    }

    /// Resume a session suspended on account confirmation
    pub async fn confirm(&self, session_id: Uuid, decision: &str) -> Result<TurnOutcome> {
        let start_time = Instant::now();
        let _guard = self.sessions.lock_session(session_id).await?;

        let mut checkpoint = self
            .sessions
            .load(session_id)
            .await?
            .ok_or(AgentError::SessionNotFound(session_id))?;

        let pending = checkpoint
            .pending
            .clone()
            .ok_or(AgentError::NoPendingConfirmation(session_id))?;

        info!(
            session_id = %session_id,
            customer_id = pending.candidate.customer_id,
            "Agent: applying confirmation decision"
        );

        let state = checkpoint.state.clone();
        let result = self.graph.resume(state.clone(), &pending, decision).await;
        let run = self
            .finish_run(session_id, decision, &state, result, start_time)
            .await?;

        self.commit(&mut checkpoint, run, decision, start_time).await
    }

    pub async fn session(&self, session_id: Uuid) -> Result<SessionCheckpoint> {
        self.sessions
            .load(session_id)
            .await?
            .ok_or(AgentError::SessionNotFound(session_id))
    }

    /// Confirmation the session is suspended on, if any. Unknown sessions
    /// have none.
    pub async fn pending_confirmation(
        &self,
        session_id: Uuid,
    ) -> Result<Option<ConfirmationRequest>> {
        Ok(self
            .sessions
            .load(session_id)
            .await?
            .and_then(|checkpoint| checkpoint.pending)
            .map(|pending| pending.request()))
    }

    /// Forget a session entirely
    pub async fn reset(&self, session_id: Uuid) -> Result<()> {
        let _guard = self.sessions.lock_session(session_id).await?;

        if self.sessions.remove(session_id).await? {
            info!(session_id = %session_id, "Session reset");
            Ok(())
        } else {
            Err(AgentError::SessionNotFound(session_id))
        }
    }

    /// Audit failed runs before surfacing the error
    async fn finish_run(
        &self,
        session_id: Uuid,
        input: &str,
        state: &ConversationState,
        result: Result<GraphRun>,
        start_time: Instant,
    ) -> Result<GraphRun> {
        match result {
            Ok(run) => Ok(run),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Turn failed");
                self.audit_log
                    .record(TurnRecord::new(
                        session_id,
                        input,
                        Vec::new(),
                        TurnOutcomeKind::Failed,
                        state,
                        start_time.elapsed().as_millis() as u64,
                    ))
                    .await?;
                Err(e)
            }
        }
    }

    async fn commit(
        &self,
        checkpoint: &mut SessionCheckpoint,
        run: GraphRun,
        input: &str,
        start_time: Instant,
    ) -> Result<TurnOutcome> {
        let session_id = checkpoint.session_id;
        let confirmation = run.pending().map(|pending| pending.request());
        let outcome = if confirmation.is_some() {
            TurnOutcomeKind::AwaitingConfirmation
        } else {
            TurnOutcomeKind::Replied
        };

        checkpoint.pending = run.pending().cloned();
        checkpoint.state = run.state;
        self.sessions.save(checkpoint.clone()).await?;

        let audit_id = self
            .audit_log
            .record(TurnRecord::new(
                session_id,
                input,
                run.trace.clone(),
                outcome,
                &checkpoint.state,
                start_time.elapsed().as_millis() as u64,
            ))
            .await?;

        info!(
            session_id = %session_id,
            steps = run.trace.len(),
            awaiting_confirmation = confirmation.is_some(),
            "Agent: turn complete"
        );

        Ok(TurnOutcome {
            session_id,
            audit_id,
            reply: if confirmation.is_some() { None } else { run.reply },
            confirmation,
            trace: run.trace,
            state: checkpoint.state.clone(),
        })
    }
}

/// Wire the live agent: fetch the catalogue, connect the model
pub async fn build_agent(config: &AgentConfig) -> Result<Agent> {
    let store = Arc::new(MusicStore::fetch(&config.chinook_sql_url).await?);
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatClient::new(config.llm.clone())?);

    let graph = Graph::new(model, store, config.compaction, config.max_steps);

    Ok(Agent::new(
        graph,
        Box::new(InMemorySessionStore::new()),
        AuditLog::new(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedChatModel;
    use crate::memory::CompactionPolicy;
    use crate::test_support::{fixture_store, lookup_call, sql_call};
    use tokio_test::{assert_err, assert_ok};

    async fn agent(model: Arc<ScriptedChatModel>) -> Agent {
        let graph = Graph::new(model, fixture_store().await, CompactionPolicy::default(), 25);
        Agent::new(
            graph,
            Box::new(InMemorySessionStore::new()),
            AuditLog::new(),
        )
    }

    #[tokio::test]
    async fn test_sign_in_then_query() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_tool_call(lookup_call("call_1", "a@x.com"));
        model.push_text("Welcome back, Ana!");
        model.push_tool_call(sql_call(
            "call_2",
            "SELECT COUNT(*) AS n FROM Invoice WHERE CustomerId = 7",
        ));
        model.push_text("You have one invoice.");
        model.push_text("Ana signed in and asked about invoices.");
        let agent = agent(model).await;
        let session_id = Uuid::new_v4();

        let first = agent
            .handle_message(session_id, "my email is a@x.com")
            .await
            .unwrap();
        assert!(first.reply.is_none());
        let request = first.confirmation.unwrap();
        assert_eq!(request.account_details.customer_id, 7);

        // Suspended sessions reject new messages
        let blocked = agent.handle_message(session_id, "hello?").await;
        assert!(matches!(blocked, Err(AgentError::ConfirmationPending(id)) if id == session_id));

        let confirmed = agent.confirm(session_id, "yes").await.unwrap();
        assert_eq!(confirmed.reply.as_deref(), Some("Welcome back, Ana!"));
        assert_eq!(confirmed.state.customer_id(), Some(7));

        let answer = agent
            .handle_message(session_id, "How many invoices do I have?")
            .await
            .unwrap();
        assert_eq!(answer.reply.as_deref(), Some("You have one invoice."));
        assert_eq!(answer.trace.first().map(String::as_str), Some("sql_model_node"));

        let checkpoint = agent.session(session_id).await.unwrap();
        assert_eq!(
            checkpoint.state.summary.as_deref(),
            Some("Ana signed in and asked about invoices.")
        );
        assert!(!checkpoint.is_suspended());

        let turns = agent.audit_log().list_for_session(session_id).await.unwrap();
        assert_eq!(turns.len(), 3);
    }

    #[tokio::test]
    async fn test_confirm_without_pending() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_text("What's your email?");
        let agent = agent(model).await;
        let session_id = Uuid::new_v4();

        assert!(matches!(
            agent.confirm(session_id, "yes").await,
            Err(AgentError::SessionNotFound(_))
        ));

        assert_ok!(agent.handle_message(session_id, "hi").await);
        assert!(matches!(
            agent.confirm(session_id, "yes").await,
            Err(AgentError::NoPendingConfirmation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_confirmation_can_be_retried() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_tool_call(lookup_call("call_1", "a@x.com"));
        let agent = agent(model.clone()).await;
        let session_id = Uuid::new_v4();

        assert!(agent.pending_confirmation(session_id).await.unwrap().is_none());

        let first = agent.handle_message(session_id, "a@x.com").await.unwrap();
        assert!(first.confirmation.is_some());

        // No reply scripted for the email prompt after the decision
        assert_err!(agent.confirm(session_id, "yes").await);

        let pending = agent.pending_confirmation(session_id).await.unwrap();
        assert_eq!(pending.map(|r| r.account_details.customer_id), Some(7));
        assert!(matches!(
            agent.handle_message(session_id, "hello").await,
            Err(AgentError::ConfirmationPending(_))
        ));

        model.push_text("Welcome back, Ana!");
        let retried = agent.confirm(session_id, "yes").await.unwrap();
        assert_eq!(retried.reply.as_deref(), Some("Welcome back, Ana!"));
        assert_eq!(retried.state.customer_id(), Some(7));
        assert!(agent.pending_confirmation(session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_resume_once() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_tool_call(lookup_call("call_1", "a@x.com"));
        model.push_text("Welcome back, Ana!");
        let agent = agent(model.clone()).await;
        let session_id = Uuid::new_v4();

        assert_ok!(agent.handle_message(session_id, "a@x.com").await);

        let (first, second) = tokio::join!(
            agent.confirm(session_id, "yes"),
            agent.confirm(session_id, "yes")
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AgentError::NoPendingConfirmation(_)))));

        let checkpoint = agent.session(session_id).await.unwrap();
        let confirmations = checkpoint
            .state
            .messages
            .iter()
            .filter(|m| m.tool_call_id.as_deref() == Some("call_1"))
            .count();
        assert_eq!(confirmations, 1);
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let agent = agent(Arc::new(ScriptedChatModel::default())).await;
        let result = agent.handle_message(Uuid::new_v4(), "   ").await;
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_previous_checkpoint() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_text("What's your email?");
        let agent = agent(model).await;
        let session_id = Uuid::new_v4();

        assert_ok!(agent.handle_message(session_id, "hi").await);
        let before = agent.session(session_id).await.unwrap();

        // Script exhausted: the model call fails
        assert_err!(agent.handle_message(session_id, "still there?").await);

        let after = agent.session(session_id).await.unwrap();
        assert_eq!(after.state, before.state);

        let turns = agent.audit_log().list_for_session(session_id).await.unwrap();
        assert!(turns.iter().any(|t| t.outcome == TurnOutcomeKind::Failed));
    }

    #[tokio::test]
    async fn test_reset() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_text("What's your email?");
        let agent = agent(model).await;
        let session_id = Uuid::new_v4();

        assert_ok!(agent.handle_message(session_id, "hi").await);
        assert_ok!(agent.reset(session_id).await);
        assert!(matches!(
            agent.session(session_id).await,
            Err(AgentError::SessionNotFound(_))
        ));
        assert!(matches!(
            agent.reset(session_id).await,
            Err(AgentError::SessionNotFound(_))
        ));
    }
}

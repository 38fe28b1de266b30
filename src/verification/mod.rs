//! Identity verification flow
//!
//! Collects an email, looks up the matching account and hands the match to
//! a human for confirmation before the identity is trusted.
//!
//! EMAIL PROMPT → LOOKUP → (CONFIRM?) → EMAIL PROMPT → ... → END

use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::models::{ConversationState, CustomerIdentity, Message, PendingConfirmation, ToolInput};
use crate::prompts::{
    CONFIRMATION_REJECTED_MESSAGE, EMAIL_SYSTEM_PROMPT, EXTRA_LOOKUP_MESSAGE, LOOKUP_FAILED_MESSAGE,
};
use crate::store::MusicStore;
use crate::tools::customer::LOOKUP_TOOL_NAME;
use crate::tools::{CustomerLookupTool, Tool};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of running the lookup step
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// A tool message was appended; continue with the email prompt
    Resolved,
    /// A candidate account was found; suspend until a human decides
    AwaitingConfirmation(PendingConfirmation),
}

pub struct IdentityVerifier {
    model: Arc<dyn ChatModel>,
    lookup: CustomerLookupTool,
}

impl IdentityVerifier {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<MusicStore>) -> Self {
        Self {
            model,
            lookup: CustomerLookupTool::new(store),
        }
    }

    /// Ask the model for the next email-collection turn
    pub async fn prompt_for_email(&self, state: &mut ConversationState) -> Result<()> {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(Message::system(EMAIL_SYSTEM_PROMPT));
        messages.extend(state.messages.iter().cloned());

        let reply = self.model.invoke(&messages, &[self.lookup.spec()]).await?;

        debug!(
            tool_calls = reply.tool_calls.len(),
            "Email prompt reply received"
        );

        state.push(reply);
        Ok(())
    }

    /// Execute the lookup requested by the latest assistant message
    pub async fn lookup(&self, state: &mut ConversationState) -> Result<LookupOutcome> {
        let calls = match state.last_message() {
            Some(message) if message.has_tool_calls() => message.tool_calls.clone(),
            _ => {
                return Err(AgentError::InvalidState(
                    "lookup requires an assistant message with tool calls".to_string(),
                ))
            }
        };

        let (call, extra) = calls
            .split_first()
            .ok_or_else(|| AgentError::InvalidState("no tool call to execute".to_string()))?;

        for ignored in extra {
            warn!(tool_call_id = %ignored.id, "Ignoring additional lookup call");
            state.push(Message::tool(&ignored.id, EXTRA_LOOKUP_MESSAGE));
        }

        if call.name != LOOKUP_TOOL_NAME {
            warn!(tool = %call.name, "Email flow received an unknown tool call");
            state.push(Message::tool(&call.id, LOOKUP_FAILED_MESSAGE));
            return Ok(LookupOutcome::Resolved);
        }

        let output = self.lookup.execute(&ToolInput::from(call)).await?;

        let candidate = if output.success {
            serde_json::from_value::<CustomerIdentity>(output.data).ok()
        } else {
            None
        };

        match candidate {
            Some(candidate) => {
                info!(
                    customer_id = candidate.customer_id,
                    "Account found, awaiting confirmation"
                );
                Ok(LookupOutcome::AwaitingConfirmation(PendingConfirmation {
                    tool_call_id: call.id.clone(),
                    candidate,
                    requested_at: Utc::now(),
                }))
            }
            None => {
                info!(reason = ?output.error, "Sign-in lookup failed");
                state.push(Message::tool(&call.id, LOOKUP_FAILED_MESSAGE));
                Ok(LookupOutcome::Resolved)
            }
        }
    }
}

/// Whether the host's decision accepts the candidate account.
/// Only the exact string `yes` does.
pub fn is_affirmative(decision: &str) -> bool {
    decision == "yes"
}

/// Apply a human decision to a suspended lookup. Returns whether the
/// identity was committed.
pub fn apply_decision(
    state: &mut ConversationState,
    pending: &PendingConfirmation,
    decision: &str,
) -> Result<bool> {
    if is_affirmative(decision) {
        let content = serde_json::to_string(&pending.candidate)?;
        state.identity = Some(pending.candidate.clone());
        state.push(Message::tool(&pending.tool_call_id, content));
        info!(customer_id = pending.candidate.customer_id, "Identity confirmed");
        Ok(true)
    } else {
        state.push(Message::tool(&pending.tool_call_id, CONFIRMATION_REJECTED_MESSAGE));
        info!("Identity rejected by user");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedChatModel;
    use crate::models::{Role, ToolCallRequest};
    use crate::test_support::{fixture_store, lookup_call};
    use serde_json::json;

    async fn verifier(model: Arc<ScriptedChatModel>) -> IdentityVerifier {
        IdentityVerifier::new(model, fixture_store().await)
    }

    fn state_with_call(call: ToolCallRequest) -> ConversationState {
        let mut state = ConversationState::new();
        state.push(Message::human("hello"));
        state.push(Message::assistant_with_tool_calls("", vec![call]));
        state
    }

    #[tokio::test]
    async fn test_prompt_for_email_binds_lookup_tool() {
        let model = Arc::new(ScriptedChatModel::default());
        model.push_text("Hi! What's your email?");
        let verifier = verifier(model.clone()).await;

        let mut state = ConversationState::new();
        state.push(Message::human("hello"));
        verifier.prompt_for_email(&mut state).await.unwrap();

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "Hi! What's your email?");

        let requests = model.requests();
        assert_eq!(requests[0].tool_names, vec![LOOKUP_TOOL_NAME]);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[0].content, EMAIL_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_lookup_miss_appends_retry_prompt() {
        let verifier = verifier(Arc::new(ScriptedChatModel::default())).await;
        let mut state = state_with_call(lookup_call("call_1", "nobody@x.com"));

        let outcome = verifier.lookup(&mut state).await.unwrap();

        assert_eq!(outcome, LookupOutcome::Resolved);
        let last = state.last_message().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(last.content, LOOKUP_FAILED_MESSAGE);
        assert!(state.identity.is_none());
    }

    #[tokio::test]
    async fn test_lookup_match_suspends_without_touching_identity() {
        let verifier = verifier(Arc::new(ScriptedChatModel::default())).await;
        let mut state = state_with_call(lookup_call("call_1", "a@x.com"));
        let before = state.messages.len();

        let outcome = verifier.lookup(&mut state).await.unwrap();

        let LookupOutcome::AwaitingConfirmation(pending) = outcome else {
            panic!("expected confirmation request");
        };
        assert_eq!(pending.tool_call_id, "call_1");
        assert_eq!(pending.candidate.customer_id, 7);
        assert_eq!(pending.candidate.customer_name, "Ana");
        assert_eq!(state.messages.len(), before);
        assert!(state.identity.is_none());
    }

    #[tokio::test]
    async fn test_extra_lookup_calls_get_answered() {
        let verifier = verifier(Arc::new(ScriptedChatModel::default())).await;
        let mut state = ConversationState::new();
        state.push(Message::assistant_with_tool_calls(
            "",
            vec![lookup_call("call_1", "nobody@x.com"), lookup_call("call_2", "a@x.com")],
        ));

        verifier.lookup(&mut state).await.unwrap();

        let answered: Vec<_> = state
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(answered, vec!["call_2", "call_1"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_in_email_flow() {
        let verifier = verifier(Arc::new(ScriptedChatModel::default())).await;
        let mut state = state_with_call(ToolCallRequest::new(
            "call_1",
            "make_sql_query",
            json!({"sql_query": "SELECT * FROM Customer"}),
        ));

        let outcome = verifier.lookup(&mut state).await.unwrap();
        assert_eq!(outcome, LookupOutcome::Resolved);
        assert_eq!(state.last_message().unwrap().content, LOOKUP_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_lookup_without_tool_calls_is_invalid() {
        let verifier = verifier(Arc::new(ScriptedChatModel::default())).await;
        let mut state = ConversationState::new();
        state.push(Message::assistant("What's your email?"));

        let result = verifier.lookup(&mut state).await;
        assert!(matches!(result, Err(AgentError::InvalidState(_))));
    }

    fn pending() -> PendingConfirmation {
        PendingConfirmation {
            tool_call_id: "call_1".to_string(),
            candidate: CustomerIdentity {
                customer_id: 7,
                customer_name: "Ana".to_string(),
            },
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_yes_commits_identity() {
        let mut state = ConversationState::new();
        let confirmed = apply_decision(&mut state, &pending(), "yes").unwrap();

        assert!(confirmed);
        assert_eq!(state.customer_id(), Some(7));
        assert_eq!(state.customer_name(), Some("Ana"));

        let tool_msg = state.last_message().unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        let content: serde_json::Value = serde_json::from_str(&tool_msg.content).unwrap();
        assert_eq!(content, json!({"customer_id": 7, "customer_name": "Ana"}));
    }

    #[test]
    fn test_apply_other_decision_keeps_identity_unset() {
        for decision in ["no", "", "yes please", "y", "YES", " yes ", "Yes\n"] {
            let mut state = ConversationState::new();
            let confirmed = apply_decision(&mut state, &pending(), decision).unwrap();

            assert!(!confirmed);
            assert!(state.identity.is_none());
            assert_eq!(state.last_message().unwrap().content, CONFIRMATION_REJECTED_MESSAGE);
        }
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("yes"));
        assert!(!is_affirmative("  YES\n"));
        assert!(!is_affirmative("Yes"));
        assert!(!is_affirmative("yeah"));
        assert!(!is_affirmative("no"));
    }
}

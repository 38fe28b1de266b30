//! Conversation graph driver
//!
//! ENTRY → get_customer_email ⇄ get_info_node (interrupt) → END
//! ENTRY → sql_model_node ⇄ sql_tools → summarizer_node → END
//!
//! One node runs at a time; the router picks the next one from the state
//! the node left behind.

use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::memory::{CompactionPolicy, ConversationSummarizer};
use crate::models::{ConversationState, PendingConfirmation};
use crate::query::QueryAgent;
use crate::store::MusicStore;
use crate::verification::{self, IdentityVerifier, LookupOutcome};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub mod router;
pub use router::Node;

/// How a run stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Interrupted { pending: PendingConfirmation },
}

#[derive(Debug, Clone)]
pub struct GraphRun {
    pub state: ConversationState,
    pub status: RunStatus,
    /// Final assistant reply, captured before any compaction
    pub reply: Option<String>,
    /// Nodes visited, in order
    pub trace: Vec<String>,
}

impl GraphRun {
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match &self.status {
            RunStatus::Interrupted { pending } => Some(pending),
            RunStatus::Completed => None,
        }
    }
}

pub struct Graph {
    verifier: IdentityVerifier,
    query: QueryAgent,
    summarizer: ConversationSummarizer,
    max_steps: usize,
}

impl Graph {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Arc<MusicStore>,
        compaction: CompactionPolicy,
        max_steps: usize,
    ) -> Self {
        Self {
            verifier: IdentityVerifier::new(model.clone(), store.clone()),
            query: QueryAgent::new(model.clone(), store),
            summarizer: ConversationSummarizer::new(model, compaction),
            max_steps: max_steps.max(1),
        }
    }

    /// Run one routing pass to completion or suspension
    pub async fn invoke(&self, state: ConversationState) -> Result<GraphRun> {
        let entry = router::route_entry(&state);
        self.drive(state, entry, Vec::new()).await
    }

    /// Continue a run suspended on account confirmation
    pub async fn resume(
        &self,
        mut state: ConversationState,
        pending: &PendingConfirmation,
        decision: &str,
    ) -> Result<GraphRun> {
        let confirmed = verification::apply_decision(&mut state, pending, decision)?;

        let trace = vec![format!(
            "{}:{}",
            Node::GetInfo,
            if confirmed { "confirmed" } else { "rejected" }
        )];

        let next = router::next(Node::GetInfo, &state);
        self.drive(state, next, trace).await
    }

    async fn drive(
        &self,
        mut state: ConversationState,
        mut node: Node,
        mut trace: Vec<String>,
    ) -> Result<GraphRun> {
        let mut steps = 0usize;
        let mut reply = None;

        while node != Node::End {
            steps += 1;
            if steps > self.max_steps {
                return Err(AgentError::StepLimitExceeded(format!(
                    "run did not finish within {} steps (last node {})",
                    self.max_steps, node
                )));
            }

            debug!(node = %node, step = steps, "Entering node");
            trace.push(node.to_string());

            match node {
                Node::CustomerEmail => self.verifier.prompt_for_email(&mut state).await?,
                Node::GetInfo => {
                    if let LookupOutcome::AwaitingConfirmation(pending) =
                        self.verifier.lookup(&mut state).await?
                    {
                        return Ok(GraphRun {
                            state,
                            status: RunStatus::Interrupted { pending },
                            reply,
                            trace,
                        });
                    }
                }
                Node::SqlModel => self.query.respond(&mut state).await?,
                Node::SqlTools => {
                    self.query.execute_tools(&mut state).await?;
                }
                Node::Summarizer => {
                    self.summarizer.summarize(&mut state).await?;
                }
                Node::End => {}
            }

            let next = router::next(node, &state);

            if matches!(node, Node::CustomerEmail | Node::SqlModel) && !state.last_has_tool_calls() {
                reply = state.last_message().map(|m| m.content.clone());
            }

            node = next;
        }

        Ok(GraphRun {
            state,
            status: RunStatus::Completed,
            reply,
            trace,
        })
    }
}

//! Conversation Summarization
//!
//! Folds the message log into a rolling summary and compacts the log.
//! Compaction is lossy: removed messages survive only through the summary.

use crate::llm::ChatModel;
use crate::models::{ConversationState, Message, Role};
use crate::prompts::summary_instruction;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// How much of the log survives a summarization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionPolicy {
    /// Remove every message
    DropAll,
    /// Keep the N most recent messages
    RetainRecent(usize),
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        CompactionPolicy::RetainRecent(1)
    }
}

impl CompactionPolicy {
    pub fn from_retain_count(count: usize) -> Self {
        match count {
            0 => CompactionPolicy::DropAll,
            n => CompactionPolicy::RetainRecent(n),
        }
    }

    /// Index of the first retained message.
    ///
    /// The retained window never opens on a tool result, since its
    /// originating tool call would be gone.
    pub fn retained_from(&self, messages: &[Message]) -> usize {
        let mut start = match self {
            CompactionPolicy::DropAll => messages.len(),
            CompactionPolicy::RetainRecent(n) => messages.len().saturating_sub(*n),
        };

        while start < messages.len() && messages[start].role == Role::Tool {
            start += 1;
        }

        start
    }
}

/// What a summarization pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    pub removed: usize,
    pub retained: usize,
    pub extended: bool,
}

pub struct ConversationSummarizer {
    model: Arc<dyn ChatModel>,
    policy: CompactionPolicy,
}

impl ConversationSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, policy: CompactionPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    /// Create or extend the rolling summary, then compact the log
    pub async fn summarize(&self, state: &mut ConversationState) -> Result<SummaryReport> {
        let extended = state.summary.as_deref().is_some_and(|s| !s.is_empty());
        let instruction = summary_instruction(state.summary.as_deref());

        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.extend(state.messages.iter().cloned());
        messages.push(Message::human(instruction));

        let response = self.model.invoke(&messages, &[]).await?;

        if response.content.trim().is_empty() {
            warn!("Summarizer returned empty text");
        }

        let start = self.policy.retained_from(&state.messages);
        let removed = state.messages.drain(..start).count();
        state.summary = Some(response.content);

        info!(
            removed,
            retained = state.messages.len(),
            extended,
            "Conversation summarized"
        );

        Ok(SummaryReport {
            removed,
            retained: state.messages.len(),
            extended,
        })
    }
}

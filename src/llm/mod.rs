//! Language model boundary
//!
//! Each graph step sends an ordered message list plus the tools it may call
//! and gets back one assistant message, which either carries text or one
//! or more tool-call requests.

use crate::error::AgentError;
use crate::models::{Message, Role, ToolCallRequest};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub mod openai;
pub use openai::OpenAiChatClient;

/// Function declaration bound to a model call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next assistant message for `messages`
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;
}

/// A request observed by [`ScriptedChatModel`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Replays canned assistant messages in order.
///
/// Used by tests and offline demos; keeps the graph runnable without a
/// model endpoint.
#[derive(Default)]
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedChatModel {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: Message) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Convenience for a plain text reply
    pub fn push_text(&self, text: &str) {
        self.push_reply(Message::assistant(text));
    }

    /// Convenience for a reply consisting of a single tool call
    pub fn push_tool_call(&self, call: ToolCallRequest) {
        self.push_reply(Message::assistant_with_tool_calls("", vec![call]));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| AgentError::LlmError("scripted model lock poisoned".to_string()))?;
            requests.push(RecordedRequest {
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        let reply = self
            .replies
            .lock()
            .map_err(|_| AgentError::LlmError("scripted model lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AgentError::LlmError("scripted model has no replies left".to_string()))?;

        if reply.role != Role::Assistant {
            return Err(AgentError::LlmError(format!(
                "scripted reply has role {}, expected assistant",
                reply.role
            )));
        }

        Ok(reply)
    }
}

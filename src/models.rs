//! Core data models for the music store agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Assistant,
    Tool,
}

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Fetch a string argument by name
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::with_role(Role::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

//
// ================= Identity =================
//

/// A verified (or candidate) customer. Id and name always travel together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerIdentity {
    pub customer_id: i64,
    pub customer_name: String,
}

/// Full `Customer` row produced by the email lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    pub customer_id: i64,
    pub customer_name: String,
    pub columns: Map<String, Value>,
}

impl AccountRecord {
    pub fn identity(&self) -> CustomerIdentity {
        CustomerIdentity {
            customer_id: self.customer_id,
            customer_name: self.customer_name.clone(),
        }
    }
}

//
// ================= Conversation State =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CustomerIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the newest message is an assistant turn carrying tool calls
    pub fn last_has_tool_calls(&self) -> bool {
        self.last_message().is_some_and(Message::has_tool_calls)
    }

    pub fn customer_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|i| i.customer_id)
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.customer_name.as_str())
    }

    pub fn is_verified(&self) -> bool {
        self.identity.is_some()
    }

    /// Most recent assistant reply without tool calls, if any
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
    }
}

//
// ================= Human-in-the-loop =================
//

pub const CONFIRMATION_QUESTION: &str = "I've found the following account, is this you?";

/// Payload surfaced to the host when account confirmation is required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationRequest {
    pub question: String,
    pub account_details: CustomerIdentity,
}

/// Checkpoint of a graph run suspended on account confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingConfirmation {
    pub tool_call_id: String,
    pub candidate: CustomerIdentity,
    pub requested_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn request(&self) -> ConfirmationRequest {
        ConfirmationRequest {
            question: CONFIRMATION_QUESTION.to_string(),
            account_details: self.candidate.clone(),
        }
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: Value,
}

impl From<&ToolCallRequest> for ToolInput {
    fn from(call: &ToolCallRequest) -> Self {
        Self {
            tool_name: call.name.clone(),
            parameters: Value::Object(call.arguments.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::Human => "human",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_arguments_from_non_object() {
        let call = ToolCallRequest::new("call_1", "get_customer_info", json!("a@x.com"));
        assert!(call.arguments.is_empty());
        assert_eq!(call.str_arg("email"), None);
    }

    #[test]
    fn test_last_has_tool_calls_only_for_assistant() {
        let mut state = ConversationState::new();
        assert!(!state.last_has_tool_calls());

        state.push(Message::human("hi"));
        assert!(!state.last_has_tool_calls());

        state.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new("c1", "get_customer_info", json!({"email": "a@x.com"}))],
        ));
        assert!(state.last_has_tool_calls());

        state.push(Message::tool("c1", "done"));
        assert!(!state.last_has_tool_calls());
    }

    #[test]
    fn test_identity_fields_travel_together() {
        let mut state = ConversationState::new();
        assert_eq!(state.customer_id(), None);
        assert_eq!(state.customer_name(), None);

        state.identity = Some(CustomerIdentity {
            customer_id: 7,
            customer_name: "Ana".to_string(),
        });
        assert_eq!(state.customer_id(), Some(7));
        assert_eq!(state.customer_name(), Some("Ana"));
    }

    #[test]
    fn test_state_serialization_omits_absent_identity() {
        let state = ConversationState::new();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("identity").is_none());
        assert!(json.get("summary").is_none());
    }
}

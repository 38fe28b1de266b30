//! Routing between graph nodes
//!
//! Every function here is pure: the same state always yields the same node.

use crate::models::ConversationState;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    #[serde(rename = "get_customer_email")]
    CustomerEmail,
    #[serde(rename = "get_info_node")]
    GetInfo,
    #[serde(rename = "sql_model_node")]
    SqlModel,
    #[serde(rename = "sql_tools")]
    SqlTools,
    #[serde(rename = "summarizer_node")]
    Summarizer,
    #[serde(rename = "__end__")]
    End,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::CustomerEmail => "get_customer_email",
            Node::GetInfo => "get_info_node",
            Node::SqlModel => "sql_model_node",
            Node::SqlTools => "sql_tools",
            Node::Summarizer => "summarizer_node",
            Node::End => "__end__",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First node of a run
pub fn route_entry(state: &ConversationState) -> Node {
    if state.identity.is_none() {
        Node::CustomerEmail
    } else {
        Node::SqlModel
    }
}

pub fn route_after_email(state: &ConversationState) -> Node {
    if state.last_has_tool_calls() {
        Node::GetInfo
    } else {
        Node::End
    }
}

pub fn route_after_query(state: &ConversationState) -> Node {
    if state.last_has_tool_calls() {
        Node::SqlTools
    } else {
        Node::Summarizer
    }
}

/// Node that follows `from`, given the state `from` left behind
pub fn next(from: Node, state: &ConversationState) -> Node {
    match from {
        Node::CustomerEmail => route_after_email(state),
        Node::GetInfo => Node::CustomerEmail,
        Node::SqlModel => route_after_query(state),
        Node::SqlTools => Node::SqlModel,
        Node::Summarizer => Node::End,
        Node::End => Node::End,
    }
}

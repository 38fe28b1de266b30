//! Query flow for verified customers
//!
//! The model answers account and catalogue questions by calling the SQL
//! tools; every tool call gets exactly one tool message back.

use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::models::{ConversationState, Message, ToolInput, ToolOutput};
use crate::prompts::{sql_system_prompt, tool_error_message};
use crate::store::MusicStore;
use crate::tools::{create_query_registry, ToolRegistry};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct QueryAgent {
    model: Arc<dyn ChatModel>,
    store: Arc<MusicStore>,
    tools: ToolRegistry,
}

impl QueryAgent {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<MusicStore>) -> Self {
        let tools = create_query_registry(store.clone());
        Self {
            model,
            store,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Ask the model for the next turn, with customer and schema context
    pub async fn respond(&self, state: &mut ConversationState) -> Result<()> {
        let identity = state.identity.as_ref().ok_or_else(|| {
            AgentError::InvalidState("query flow requires a verified customer".to_string())
        })?;

        let table_names = self.store.usable_table_names().await?;
        let system = sql_system_prompt(identity, &table_names, state.summary.as_deref());

        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(Message::system(system));
        messages.extend(state.messages.iter().cloned());

        let reply = self.model.invoke(&messages, &self.tools.specs()).await?;

        debug!(
            customer_id = identity.customer_id,
            tool_calls = reply.tool_calls.len(),
            "Query reply received"
        );

        state.push(reply);
        Ok(())
    }

    /// Run every tool call of the latest assistant message, in order.
    /// Returns the number of calls executed.
    pub async fn execute_tools(&self, state: &mut ConversationState) -> Result<usize> {
        let calls = match state.last_message() {
            Some(message) if message.has_tool_calls() => message.tool_calls.clone(),
            _ => {
                return Err(AgentError::InvalidState(
                    "tool execution requires an assistant message with tool calls".to_string(),
                ))
            }
        };

        for call in &calls {
            let start = Instant::now();
            let result = self.tools.execute(&ToolInput::from(call)).await;

            let content = match result {
                Ok(output) => render_output(&output)?,
                Err(e) => {
                    warn!(tool = %call.name, tool_call_id = %call.id, "Tool call failed: {}", e);
                    tool_error_message(&e.to_string())
                }
            };

            info!(
                tool = %call.name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Tool call executed"
            );

            state.push(Message::tool(&call.id, content));
        }

        Ok(calls.len())
    }
}

/// Successful outputs render their data; failures keep their data when
/// there is any, so introspection errors stay visible to the model.
fn render_output(output: &ToolOutput) -> Result<String> {
    if output.data.is_null() {
        let detail = output.error.as_deref().unwrap_or("tool returned no result");
        return Ok(tool_error_message(detail));
    }
    Ok(serde_json::to_string(&output.data)?)
}

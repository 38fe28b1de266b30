//! Tool trait and registry
//!
//! Tools are the only way the model touches the music store. Each tool
//! declares a JSON schema that is bound to the model call.

use crate::error::AgentError;
use crate::llm::ToolSpec;
use crate::models::{ToolInput, ToolOutput};
use crate::store::MusicStore;
use crate::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod customer;
pub mod sql;

pub use customer::CustomerLookupTool;
pub use sql::{SqlQueryTool, TableInfoTool};

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the tool arguments
    fn parameters(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Declarations for every registered tool, ordered by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let tool = self
            .get(&input.tool_name)
            .ok_or_else(|| AgentError::ToolNotFound(input.tool_name.clone()))?;
        tool.execute(input).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tools available once the customer is verified
pub fn create_query_registry(store: Arc<MusicStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SqlQueryTool::new(store.clone())));
    registry.register(Arc::new(TableInfoTool::new(store)));
    registry
}

/// The argument exactly as the model sent it; blank values are rejected
pub(crate) fn require_str_param<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str> {
    if !input.parameters.is_object() {
        return Err(AgentError::InvalidToolInput(
            "tool arguments must be a JSON object".to_string(),
        ));
    }

    input
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            AgentError::InvalidToolInput(format!(
                "Expected string argument '{}' for {}",
                key, input.tool_name
            ))
        })
}

//! Schema introspection and query execution tools

use crate::models::{ToolInput, ToolOutput};
use crate::store::MusicStore;
use crate::tools::{require_str_param, Tool};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub struct TableInfoTool {
    store: Arc<MusicStore>,
}

impl TableInfoTool {
    pub fn new(store: Arc<MusicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for TableInfoTool {
    fn name(&self) -> &'static str {
        "get_table_info"
    }

    fn description(&self) -> &'static str {
        "Describe a table's columns and show a few sample rows. Call this on a table before querying it. The table name must be one of the valid database tables."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table_name": { "type": "string" }
            },
            "required": ["table_name"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let table_name = require_str_param(input, "table_name")?.trim();

        match self.store.table_info(table_name).await {
            Ok(table_info) => Ok(ToolOutput::ok(json!({
                "table_name": table_name,
                "table_info": table_info,
            }))),
            Err(e) => {
                warn!(table = %table_name, "Table introspection failed: {}", e);
                Ok(ToolOutput {
                    success: false,
                    data: json!({
                        "table_name": table_name,
                        "table_info": null,
                        "error": e.to_string(),
                    }),
                    error: Some(e.to_string()),
                })
            }
        }
    }
}

pub struct SqlQueryTool {
    store: Arc<MusicStore>,
}

impl SqlQueryTool {
    pub fn new(store: Arc<MusicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> &'static str {
        "make_sql_query"
    }

    fn description(&self) -> &'static str {
        "Run a SQLite query against the store database and return the rows. Check a table with get_table_info before querying it. Some tables are keyed by customer id; only ever query rows belonging to the current customer's id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql_query": { "type": "string" }
            },
            "required": ["sql_query"]
        })
    }

    /// Query failures propagate; the tool node turns them into a message
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let sql_query = require_str_param(input, "sql_query")?.trim();
        let rows = self.store.run(sql_query).await?;

        Ok(ToolOutput::ok(json!({ "sql_query_output": rows })))
    }
}

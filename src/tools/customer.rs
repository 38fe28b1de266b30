//! Email-based account lookup

use crate::models::{ToolInput, ToolOutput};
use crate::store::MusicStore;
use crate::tools::{require_str_param, Tool};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const LOOKUP_TOOL_NAME: &str = "get_customer_info";

pub struct CustomerLookupTool {
    store: Arc<MusicStore>,
}

impl CustomerLookupTool {
    pub fn new(store: Arc<MusicStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for CustomerLookupTool {
    fn name(&self) -> &'static str {
        LOOKUP_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Look up the customer's account from their email address. Only call this once the customer has given you their email."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email": {
                    "type": "string",
                    "description": "The email address the customer gave"
                }
            },
            "required": ["email"]
        })
    }

    /// Never fails: a miss, a bad argument and a backend error all come
    /// back as an unsuccessful output.
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let email = match require_str_param(input, "email") {
            Ok(email) => email,
            Err(e) => return Ok(ToolOutput::failed(e.to_string())),
        };

        match self.store.find_customer_by_email(email).await {
            Ok(Some(record)) => {
                info!(customer_id = record.customer_id, "Customer lookup matched");
                Ok(ToolOutput::ok(serde_json::to_value(record.identity())?))
            }
            Ok(None) => {
                info!("Customer lookup found no account");
                Ok(ToolOutput::failed("no account matches that email"))
            }
            Err(e) => {
                warn!("Customer lookup failed: {}", e);
                Ok(ToolOutput::failed(e.to_string()))
            }
        }
    }
}

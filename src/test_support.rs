//! Shared fixtures for unit tests

use crate::models::ToolCallRequest;
use crate::store::MusicStore;
use crate::tools::customer::LOOKUP_TOOL_NAME;
use serde_json::json;
use std::sync::Arc;

pub(crate) const CHINOOK_FIXTURE: &str = include_str!("store/testdata/chinook_subset.sql");

pub(crate) async fn fixture_store() -> Arc<MusicStore> {
    Arc::new(
        MusicStore::from_script(CHINOOK_FIXTURE)
            .await
            .expect("fixture script loads"),
    )
}

pub(crate) fn lookup_call(id: &str, email: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, LOOKUP_TOOL_NAME, json!({ "email": email }))
}

pub(crate) fn sql_call(id: &str, sql: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, "make_sql_query", json!({ "sql_query": sql }))
}

pub(crate) fn table_info_call(id: &str, table: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, "get_table_info", json!({ "table_name": table }))
}

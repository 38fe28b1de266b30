//! Music store data source
//!
//! Materializes the Chinook SQL dump into a single-connection in-memory
//! SQLite pool. The connection must never be recycled: dropping it drops
//! the database.

use crate::error::AgentError;
use crate::models::AccountRecord;
use crate::Result;
use serde_json::{json, Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, error, info};

/// Number of sample rows appended to a table description
const SAMPLE_ROWS: usize = 3;

pub struct MusicStore {
    pool: SqlitePool,
}

impl MusicStore {
    /// Open an empty in-memory store
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AgentError::DatabaseError(format!("Failed to open in-memory store: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory store populated by `script`
    pub async fn from_script(script: &str) -> Result<Self> {
        let store = Self::in_memory().await?;
        store.execute_script(script).await?;
        Ok(store)
    }

    /// Download the SQL dump at `url` and load it. Any failure is fatal.
    pub async fn fetch(url: &str) -> Result<Self> {
        info!(url = %url, "Fetching music store dataset");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let response = client.get(url).send().await.map_err(|e| {
            error!("Dataset request failed: {}", e);
            AgentError::DataSourceError(format!("Failed to fetch {}: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::DataSourceError(format!(
                "Dataset fetch returned {} for {}",
                status, url
            )));
        }

        let script = response.text().await.map_err(|e| {
            AgentError::DataSourceError(format!("Failed to read dataset body: {}", e))
        })?;

        let store = Self::from_script(&script).await?;
        let tables = store.usable_table_names().await?;
        info!(table_count = tables.len(), "Music store dataset loaded");

        Ok(store)
    }

    pub async fn execute_script(&self, script: &str) -> Result<()> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map_err(|e| AgentError::DataSourceError(format!("Failed to execute SQL script: {}", e)))?;
        Ok(())
    }

    /// User tables, sorted by name
    pub async fn usable_table_names(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// `CREATE TABLE` statement followed by a few sample rows
    pub async fn table_info(&self, table: &str) -> Result<String> {
        let create_sql = sqlx::query_scalar::<_, String>(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AgentError::TableNotFound(table.to_string()))?;

        let sample_sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_identifier(table),
            SAMPLE_ROWS
        );
        let rows = sqlx::query(&sample_sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;

        let mut info = String::with_capacity(create_sql.len() + 256);
        info.push_str(create_sql.trim());
        info.push_str(&format!("\n\n/*\n{} rows from {} table:\n", rows.len(), table));

        if let Some(first) = rows.first() {
            let header: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
            info.push_str(&header.join("\t"));
            info.push('\n');
        }

        for row in &rows {
            let object = row_to_object(row)?;
            let cells: Vec<String> = row
                .columns()
                .iter()
                .map(|c| object.get(c.name()).map(render_cell).unwrap_or_default())
                .collect();
            info.push_str(&cells.join("\t"));
            info.push('\n');
        }
        info.push_str("*/");

        Ok(info)
    }

    /// Execute a literal query and return its rows as JSON objects keyed by column
    pub async fn run(&self, sql: &str) -> Result<Value> {
        debug!(sql = %sql, "Executing query");

        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;

        let objects = rows
            .iter()
            .map(|row| row_to_object(row).map(Value::Object))
            .collect::<Result<Vec<_>>>()?;

        Ok(Value::Array(objects))
    }

    /// Exact email match against `Customer`
    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<AccountRecord>> {
        let row = sqlx::query("SELECT * FROM Customer WHERE Email = ?1 LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let columns = row_to_object(&row)?;

        let customer_id = columns
            .get("CustomerId")
            .and_then(Value::as_i64)
            .ok_or_else(|| AgentError::DatabaseError("Customer row has no CustomerId".to_string()))?;
        let customer_name = columns
            .get("FirstName")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::DatabaseError("Customer row has no FirstName".to_string()))?
            .to_string();

        Ok(Some(AccountRecord {
            customer_id,
            customer_name,
            columns,
        }))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Decode a row by the runtime storage class of each value
fn row_to_object(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut object = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let idx = column.ordinal();
        let (is_null, kind) = {
            let raw = row.try_get_raw(idx)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };

        let value = if is_null {
            Value::Null
        } else {
            match kind.as_str() {
                "INTEGER" | "BOOLEAN" => json!(row.try_get::<i64, _>(idx)?),
                "REAL" | "NUMERIC" => json!(row.try_get::<f64, _>(idx)?),
                "BLOB" => Value::String(hex::encode(row.try_get::<Vec<u8>, _>(idx)?)),
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };

        object.insert(column.name().to_string(), value);
    }

    Ok(object)
}

use chrono::{DateTime, Utc};
use duckdb::Row;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::db::db_utils::{enum_at, timestamp_at};

// Ledger records

#[derive(Debug, Clone, Serialize)]
pub struct QueryHistory {
    pub id: i64,
    pub natural_query: String,
    pub generated_sql: String,
    pub database_type: String,
    pub explanation: Option<String>,
    pub model_used: Option<String>,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
}

impl QueryHistory {
    pub(crate) const COLUMNS: &'static str = "id, natural_query, generated_sql, database_type, \
        explanation, model_used, context, created_at, is_favorite";

    pub(crate) fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            natural_query: row.get(1)?,
            generated_sql: row.get(2)?,
            database_type: row.get(3)?,
            explanation: row.get(4)?,
            model_used: row.get(5)?,
            context: row.get(6)?,
            created_at: timestamp_at(row, 7)?,
            is_favorite: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaVersion {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub schema_ddl: String,
    pub database_type: String,
    pub explanation: Option<String>,
    /// Serialized JSON list of table descriptors.
    pub tables_info: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl SchemaVersion {
    pub(crate) const COLUMNS: &'static str = "id, name, description, schema_ddl, database_type, \
        explanation, tables_info, version, created_at, is_active";

    pub(crate) fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            schema_ddl: row.get(3)?,
            database_type: row.get(4)?,
            explanation: row.get(5)?,
            tables_info: row.get(6)?,
            version: row.get(7)?,
            created_at: timestamp_at(row, 8)?,
            is_active: row.get(9)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub message: String,
    pub response: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub(crate) const COLUMNS: &'static str = "id, message, response, message_type, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message: row.get(1)?,
            response: row.get(2)?,
            message_type: enum_at(row, 3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub id: i64,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub query_history_id: Option<i64>,
}

impl AnalyticsEvent {
    pub(crate) const COLUMNS: &'static str = "id, event_type, created_at, query_history_id";

    pub(crate) fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            event_type: enum_at(row, 1)?,
            created_at: timestamp_at(row, 2)?,
            query_history_id: row.get(3)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryVersion {
    pub id: i64,
    pub query_history_id: i64,
    pub version_message: Option<String>,
    pub generated_sql: String,
    pub created_at: DateTime<Utc>,
}

impl QueryVersion {
    pub(crate) const COLUMNS: &'static str =
        "id, query_history_id, version_message, generated_sql, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            query_history_id: row.get(1)?,
            version_message: row.get(2)?,
            generated_sql: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }
}

// Insert payloads

#[derive(Debug, Clone)]
pub struct NewQueryHistory {
    pub natural_query: String,
    pub generated_sql: String,
    pub database_type: String,
    pub explanation: Option<String>,
    pub model_used: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSchemaVersion {
    pub name: String,
    pub description: String,
    pub schema_ddl: String,
    pub database_type: String,
    pub explanation: Option<String>,
    pub tables_info: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewQueryVersion {
    pub query_history_id: i64,
    pub generated_sql: String,
    pub version_message: Option<String>,
}

// Read models

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub sql_generations_total: i64,
    pub schema_generations_total: i64,
    pub total_queries_in_history: i64,
}

// Closed value sets

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    GenerateSql,
    GenerateSchema,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::GenerateSql => "generate_sql",
            EventType::GenerateSchema => "generate_schema",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate_sql" => Ok(EventType::GenerateSql),
            "generate_schema" => Ok(EventType::GenerateSchema),
            other => Err(format!("unknown analytics event type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    General,
    Schema,
    Query,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::General => "general",
            MessageType::Schema => "schema",
            MessageType::Query => "query",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(MessageType::General),
            "schema" => Ok(MessageType::Schema),
            "query" => Ok(MessageType::Query),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

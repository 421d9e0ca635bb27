use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Structured answer for a SQL generation request.
///
/// Only `sql_query` is required. The other fields are kept exactly as the
/// model wrote them, whatever their element types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    pub sql_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default = "empty_list")]
    pub tables_involved: Value,
    /// Any additional fields the model returned, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured answer for a schema generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaResult {
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Table descriptors: names, objects, whatever the model chose.
    #[serde(default = "empty_list")]
    pub tables: Value,
    #[serde(default = "empty_list")]
    pub recommendations: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A table recovered from raw DDL.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<String>,
}

impl From<TableInfo> for Value {
    fn from(table: TableInfo) -> Self {
        json!({ "name": table.name, "columns": table.columns })
    }
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

/// Outcome of parsing a completion: either the model honoured the JSON
/// contract, or the result was recovered heuristically from raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse<T> {
    Structured(T),
    Fallback(T),
}

impl<T> ParsedResponse<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, ParsedResponse::Structured(_))
    }

    pub fn inner(&self) -> &T {
        match self {
            ParsedResponse::Structured(value) | ParsedResponse::Fallback(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            ParsedResponse::Structured(value) | ParsedResponse::Fallback(value) => value,
        }
    }
}

/// A generator result with the metadata attached to every success.
#[derive(Debug, Clone, Serialize)]
pub struct Generated<T> {
    #[serde(flatten)]
    pub result: T,
    pub model_used: String,
    pub database_type: String,
}

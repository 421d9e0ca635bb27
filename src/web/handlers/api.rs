use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::db::ledger;
use crate::db::models::{
    AnalyticsSummary, ChatMessage, MessageType, NewQueryHistory, NewQueryVersion,
    NewSchemaVersion, QueryHistory, QueryVersion, SchemaVersion,
};
use crate::llm::models::{Generated, SchemaResult, SqlResult};
use crate::web::error::AppError;
use crate::web::state::AppState;

pub const SERVICE_NAME: &str = "SQLSense Backend API";
pub const DEFAULT_DATABASE_TYPE: &str = "postgresql";
pub const DEFAULT_SCHEMA_NAME: &str = "Generated Schema";
const DEFAULT_PER_PAGE: i64 = 10;
const MAX_PER_PAGE: i64 = 100;
const CHAT_HISTORY_LIMIT: i64 = 20;

// Request types

#[derive(Debug, Deserialize)]
pub struct GenerateSqlRequest {
    pub prompt: Option<String>,
    pub context: Option<String>,
    pub database_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateSchemaRequest {
    pub description: Option<String>,
    pub database_type: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub query_id: Option<i64>,
    pub schema_id: Option<i64>,
    pub is_favorite: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NewVersionRequest {
    pub generated_sql: Option<String>,
    pub version_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GenerateSqlResponse {
    #[serde(flatten)]
    pub generated: Generated<SqlResult>,
    pub query_id: i64,
}

#[derive(Debug, Serialize)]
pub struct GenerateSchemaResponse {
    #[serde(flatten)]
    pub generated: Generated<SchemaResult>,
    pub schema_id: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub queries: Vec<QueryHistory>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Unwraps a JSON body, turning a malformed one into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection);
            Err(AppError::validation("Invalid JSON body"))
        }
    }
}

/// A required text field: missing or blank is a validation error.
fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::validation(message))
}

fn database_type_or_default(database_type: Option<String>) -> String {
    database_type
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_TYPE.to_string())
}

// Service info

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Natural Language to SQL Generator API",
        "endpoints": {
            "health": "/api/health",
            "generate_sql": "/api/generate-sql",
            "generate_schema": "/api/generate-schema",
            "history": "/api/history",
            "query_versions": "/api/history/{id}/versions",
            "schema_versions": "/api/schema-versions",
            "save": "/api/save",
            "analytics": "/api/analytics",
            "chat": "/api/chat",
            "chat_history": "/api/chat/history"
        }
    }))
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Generation

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateSqlRequest>, JsonRejection>,
) -> Result<Json<GenerateSqlResponse>, AppError> {
    let request = json_body(payload)?;
    let prompt = required(request.prompt, "Prompt is required")?;
    let context = request.context.unwrap_or_default();
    let database_type = database_type_or_default(request.database_type);

    info!("Generating {} SQL for: {}", database_type, prompt);

    let generated = state
        .generator
        .generate_sql(&prompt, &context, &database_type)
        .await
        .map_err(|e| {
            error!("SQL generation failed: {}", e);
            AppError::Internal("Failed to generate SQL".to_string())
        })?;

    let record = NewQueryHistory {
        natural_query: prompt,
        generated_sql: generated.result.sql_query.clone(),
        database_type,
        explanation: generated.result.explanation.clone(),
        model_used: Some(generated.model_used.clone()),
        context: Some(context),
    };
    let query_id = state
        .with_conn(move |conn| ledger::save_sql_generation(conn, &record))
        .await?;

    Ok(Json(GenerateSqlResponse {
        generated,
        query_id,
    }))
}

pub async fn generate_schema(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateSchemaRequest>, JsonRejection>,
) -> Result<Json<GenerateSchemaResponse>, AppError> {
    let request = json_body(payload)?;
    let description = required(request.description, "Description is required")?;
    let database_type = database_type_or_default(request.database_type);
    let name = request
        .name
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SCHEMA_NAME.to_string());

    info!("Generating {} schema '{}'", database_type, name);

    let generated = state
        .generator
        .generate_schema(&description, &database_type)
        .await
        .map_err(|e| {
            error!("Schema generation failed: {}", e);
            AppError::Internal("Failed to generate schema".to_string())
        })?;

    let tables_info = serde_json::to_string(&generated.result.tables).map_err(|e| {
        error!("Failed to serialize table descriptors: {}", e);
        AppError::internal()
    })?;
    let record = NewSchemaVersion {
        name,
        description,
        schema_ddl: generated.result.schema.clone(),
        database_type,
        explanation: generated.result.explanation.clone(),
        tables_info: Some(tables_info),
    };
    let schema_id = state
        .with_conn(move |conn| ledger::save_schema_generation(conn, &record))
        .await?;

    Ok(Json(GenerateSchemaResponse {
        generated,
        schema_id,
    }))
}

// History

pub async fn history(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    // Unparseable paging parameters fall back to the defaults
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let listing = state
        .with_conn(move |conn| Ok(ledger::list_query_history(conn, page, per_page)?))
        .await?;

    Ok(Json(HistoryResponse {
        queries: listing.items,
        total: listing.total,
        pages: listing.pages,
        current_page: page,
    }))
}

pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(query_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state
        .with_conn(move |conn| ledger::delete_query_history(conn, query_id))
        .await?;
    info!("Deleted query {}", query_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn schema_versions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SchemaVersion>>, AppError> {
    let schemas = state
        .with_conn(|conn| Ok(ledger::list_schema_versions(conn)?))
        .await?;
    Ok(Json(schemas))
}

// Favorites and activation

pub async fn save_item(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let item_type = required(request.item_type, "Type is required")?;

    match item_type.as_str() {
        "query" => {
            let query_id = request
                .query_id
                .filter(|id| *id != 0)
                .ok_or_else(|| AppError::not_found("Query not found"))?;
            let is_favorite = request.is_favorite.unwrap_or(false);

            let found = state
                .with_conn(move |conn| Ok(ledger::set_favorite(conn, query_id, is_favorite)?))
                .await?;
            if !found {
                return Err(AppError::not_found("Query not found"));
            }
            debug!("Query {} favorite = {}", query_id, is_favorite);
        }
        "schema" => {
            let schema_id = request
                .schema_id
                .filter(|id| *id != 0)
                .ok_or_else(|| AppError::not_found("Schema not found"))?;
            let is_active = request.is_active.unwrap_or(true);

            let found = state
                .with_conn(move |conn| Ok(ledger::set_schema_active(conn, schema_id, is_active)?))
                .await?;
            if !found {
                return Err(AppError::not_found("Schema not found"));
            }
            debug!("Schema {} active = {}", schema_id, is_active);
        }
        _ => return Err(AppError::validation("Invalid type")),
    }

    Ok(Json(json!({ "success": true })))
}

// Analytics

pub async fn analytics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalyticsSummary>, AppError> {
    let summary = state
        .with_conn(|conn| Ok(ledger::analytics_summary(conn)?))
        .await?;
    Ok(Json(summary))
}

// Query versions

pub async fn create_query_version(
    State(state): State<Arc<AppState>>,
    Path(query_id): Path<i64>,
    payload: Result<Json<NewVersionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueryVersion>), AppError> {
    let request = json_body(payload)?;
    let generated_sql = request
        .generated_sql
        .ok_or_else(|| AppError::validation("generated_sql is required"))?;
    let version_message = request
        .version_message
        .unwrap_or_else(|| format!("Version saved at {}", Utc::now().to_rfc3339()));

    let new = NewQueryVersion {
        query_history_id: query_id,
        generated_sql,
        version_message: Some(version_message),
    };
    let version = state
        .with_conn(move |conn| ledger::add_query_version(conn, &new))
        .await?;

    info!("Saved version {} of query {}", version.id, query_id);
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn query_versions(
    State(state): State<Arc<AppState>>,
    Path(query_id): Path<i64>,
) -> Result<Json<Vec<QueryVersion>>, AppError> {
    let versions = state
        .with_conn(move |conn| ledger::list_query_versions(conn, query_id))
        .await?;
    Ok(Json(versions))
}

// Chat

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let request = json_body(payload)?;
    let message = required(request.message, "Message is required")?;
    let message_type = match request.message_type {
        Some(raw) => raw
            .parse::<MessageType>()
            .map_err(|_| AppError::validation("Invalid message type"))?,
        None => MessageType::default(),
    };

    let response = state
        .generator
        .generate_chat_response(&message, message_type)
        .await;

    let reply = response.clone();
    state
        .with_conn(move |conn| {
            Ok(ledger::insert_chat_message(
                conn,
                &message,
                &reply,
                message_type,
            )?)
        })
        .await?;

    Ok(Json(ChatResponse { response }))
}

pub async fn chat_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state
        .with_conn(|conn| Ok(ledger::list_recent_chat_messages(conn, CHAT_HISTORY_LIMIT)?))
        .await?;
    Ok(Json(messages))
}

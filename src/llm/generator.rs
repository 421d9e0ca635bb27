use std::sync::Arc;
use tracing::{debug, error, info};

use crate::db::models::MessageType;
use crate::llm::models::{Generated, SchemaResult, SqlResult};
use crate::llm::{parser, prompts, CompletionClient, LlmError};

pub const CHAT_UNAVAILABLE: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again.";
pub const CHAT_FAILED: &str = "I'm sorry, I encountered an error. Please try again.";

/// SQL, schema and chat generation on top of a completion client.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn CompletionClient>,
}

impl Generator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn generate_sql(
        &self,
        prompt: &str,
        context: &str,
        database_type: &str,
    ) -> Result<Generated<SqlResult>, LlmError> {
        let system = prompts::sql_system_prompt(database_type);
        let user = prompts::sql_user_prompt(prompt, context);
        debug!("SQL generation prompt: {}", user);

        let raw = self
            .client
            .complete(&system, &user, &prompts::SQL_OPTIONS)
            .await?;
        debug!("Raw SQL completion: {}", raw);

        let parsed = parser::parse_sql(&raw);
        info!(
            "Generated {} SQL (structured: {})",
            database_type,
            parsed.is_structured()
        );

        Ok(Generated {
            result: parsed.into_inner(),
            model_used: self.model().to_string(),
            database_type: database_type.to_string(),
        })
    }

    pub async fn generate_schema(
        &self,
        description: &str,
        database_type: &str,
    ) -> Result<Generated<SchemaResult>, LlmError> {
        let system = prompts::schema_system_prompt(database_type);
        let user = prompts::schema_user_prompt(description);

        let raw = self
            .client
            .complete(&system, &user, &prompts::SCHEMA_OPTIONS)
            .await?;
        debug!("Raw schema completion: {}", raw);

        let parsed = parser::parse_schema(&raw);
        info!(
            "Generated {} schema with {} tables (structured: {})",
            database_type,
            parsed.inner().tables.as_array().map_or(0, Vec::len),
            parsed.is_structured()
        );

        Ok(Generated {
            result: parsed.into_inner(),
            model_used: self.model().to_string(),
            database_type: database_type.to_string(),
        })
    }

    /// Never fails: errors degrade to a fixed apology.
    pub async fn generate_chat_response(&self, message: &str, message_type: MessageType) -> String {
        let system = prompts::chat_system_prompt(message_type);

        match self
            .client
            .complete(&system, message, &prompts::CHAT_OPTIONS)
            .await
        {
            Ok(response) => response,
            Err(e @ (LlmError::Api { .. } | LlmError::ResponseError(_))) => {
                error!("Chat completion unavailable: {}", e);
                CHAT_UNAVAILABLE.to_string()
            }
            Err(e) => {
                error!("Chat completion failed: {}", e);
                CHAT_FAILED.to_string()
            }
        }
    }
}

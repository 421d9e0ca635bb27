pub mod generator;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum LlmError {
    /// Non-success status from the endpoint, or a timeout (reported as 408).
    Api { status: u16, body: String },
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Api { status, body } => {
                write!(f, "LLM API call failed with status {}: {}", status, body)
            }
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Sampling parameters for one completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

/// A chat-style completion endpoint: one system and one user message in,
/// the first choice's text out. Implementations do not retry.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// Model identifier attached to generated results.
    fn model(&self) -> &str;
}

/// Builds the completion client selected by `llm.backend`.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, LlmError> {
    let client: Arc<dyn CompletionClient> = match config.backend.as_str() {
        "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(config)?),
        "ollama" => Arc::new(providers::ollama::OllamaProvider::new(config)?),
        _ => {
            return Err(LlmError::ConfigError(format!(
                "Unsupported LLM backend: {}",
                config.backend
            )))
        }
    };

    Ok(client)
}

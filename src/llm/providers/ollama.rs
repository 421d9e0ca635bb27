use crate::config::LlmConfig;
use crate::llm::{CompletionClient, CompletionOptions, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "http://localhost:11434/api/chat";

/// Local Ollama server via its non-streaming `/api/chat` endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    message: Option<OllamaReply>,
}

#[derive(Deserialize, Debug)]
struct OllamaReply {
    content: String,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);

        let request = OllamaRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system_prompt,
                },
                OllamaMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_p: options.top_p,
            },
        };

        debug!("Sending request to Ollama: {:?}", request);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Api {
                        status: 408,
                        body: format!("request timed out after {}s", self.timeout.as_secs()),
                    }
                } else {
                    LlmError::ConnectionError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Ollama API responded with status code: {} - {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = serde_json::from_str::<OllamaResponse>(&response_text).map_err(|e| {
            error!("Failed to parse Ollama response: {} - Response was: {}", e, response_text);
            LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
        })?;

        ollama_response
            .message
            .map(|reply| reply.content)
            .ok_or_else(|| LlmError::ResponseError("No message in Ollama response".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn upstream(reply: Value) -> String {
        let app = Router::new().route(
            "/api/chat",
            post(move || {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/chat", addr)
    }

    fn provider(api_url: String) -> OllamaProvider {
        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        config.model = "llama3".to_string();
        config.api_url = Some(api_url);
        OllamaProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_reads_message_content() {
        let url = upstream(json!({"model": "llama3", "done": true, "message": {"role": "assistant", "content": "hello"}})).await;
        let options = CompletionOptions {
            temperature: 0.7,
            max_tokens: 500,
            top_p: None,
        };

        let text = provider(url).complete("sys", "hi", &options).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_missing_message_is_response_error() {
        let url = upstream(json!({"done": true})).await;
        let options = CompletionOptions {
            temperature: 0.1,
            max_tokens: 10,
            top_p: Some(0.9),
        };

        let err = provider(url).complete("sys", "hi", &options).await.unwrap_err();
        assert!(matches!(err, LlmError::ResponseError(_)));
    }

    #[test]
    fn test_default_url_when_unset() {
        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.api_url, DEFAULT_API_URL);
    }
}

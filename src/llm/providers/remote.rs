use crate::config::LlmConfig;
use crate::llm::{CompletionClient, CompletionOptions, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenAI/OpenRouter-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = config.api_key.clone().filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!("No API key configured for remote LLM provider; requests will be unauthenticated");
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Api {
                status: 408,
                body: format!("request timed out after {}s", self.timeout.as_secs()),
            }
        } else {
            LlmError::ConnectionError(e.to_string())
        }
    }
}

#[async_trait]
impl CompletionClient for RemoteLlmProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
        };

        debug!("Sending completion request to {} with model {}", self.api_url, self.model);

        let mut builder = self
            .client
            .post(&self.api_url)
            .header("HTTP-Referer", "https://sqlsense.ai")
            .header("X-Title", "SQLSense")
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("LLM API call failed: {} - {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let prompt_response: PromptResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                LlmError::ResponseError(e.to_string())
            }
        })?;

        prompt_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Serves a canned reply on an ephemeral port and records what it received.
    async fn upstream(status: StatusCode, reply: Value) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().unwrap().push((auth, body));
                    (status, Json(reply))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v1/chat/completions", addr), seen)
    }

    fn provider(api_url: String, api_key: Option<&str>) -> RemoteLlmProvider {
        let mut config = AppConfig::default().llm;
        config.api_url = Some(api_url);
        config.api_key = api_key.map(str::to_string);
        config.model = "test-model".to_string();
        RemoteLlmProvider::new(&config).unwrap()
    }

    const OPTIONS: CompletionOptions = CompletionOptions {
        temperature: 0.1,
        max_tokens: 1000,
        top_p: Some(0.9),
    };

    #[tokio::test]
    async fn test_complete_returns_first_choice_and_sends_chat_request() {
        let (url, seen) = upstream(
            StatusCode::OK,
            json!({"choices": [{"message": {"content": "SELECT 1;"}}, {"message": {"content": "ignored"}}]}),
        )
        .await;

        let text = provider(url, Some("sk-test"))
            .complete("system rules", "user ask", &OPTIONS)
            .await
            .unwrap();
        assert_eq!(text, "SELECT 1;");

        let seen = seen.lock().unwrap();
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "system rules");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 1000);
        assert!(body.get("top_p").is_some());
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let (url, _) = upstream(StatusCode::TOO_MANY_REQUESTS, json!({"error": "slow down"})).await;

        let err = provider(url, None)
            .complete("s", "u", &OPTIONS)
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("slow down"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_response_error() {
        let (url, _) = upstream(StatusCode::OK, json!({"choices": []})).await;
        let err = provider(url.clone(), None)
            .complete("s", "u", &OPTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ResponseError(_)));

        let (url, _) = upstream(StatusCode::OK, json!({"id": "no-choices-field"})).await;
        let err = provider(url, None)
            .complete("s", "u", &OPTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ResponseError(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out_as_api_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"choices": [{"message": {"content": "too late"}}]}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = AppConfig::default().llm;
        config.api_url = Some(format!("http://{}/v1/chat/completions", addr));
        config.timeout_secs = 1;
        let provider = RemoteLlmProvider::new(&config).unwrap();

        let err = provider.complete("s", "u", &OPTIONS).await.unwrap_err();
        assert!(
            matches!(err, LlmError::Api { status: 408, .. }),
            "expected timeout as Api 408, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(format!("http://{}/v1/chat/completions", addr), None)
            .complete("s", "u", &OPTIONS)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ConnectionError(_)));
    }
}

//! OpenAI-compatible `chat/completions` backend.
//!
//! Works with any provider that speaks the OpenAI chat wire format. One
//! `reqwest::Client` is shared across requests so connections are reused.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::Completer;
use crate::config::CompletionConfig;
use crate::error::AppError;

/// Completion backend calling `{base_url}/chat/completions`.
pub struct OpenAiCompleter {
    client: reqwest::Client,
    endpoint: String,
    cfg: CompletionConfig,
}

impl OpenAiCompleter {
    /// Builds the HTTP client. The credential is taken from `cfg` and held for
    /// the lifetime of the backend.
    pub fn new(cfg: CompletionConfig) -> Result<Self, AppError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: chat_completions_url(&cfg.base_url),
            cfg,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.cfg.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::upstream(format!("completion request timed out: {err}"))
                } else {
                    AppError::upstream(format!("completion request failed: {err}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let snippet = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect::<String>();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::upstream(format!(
                    "completion service rejected credentials with {status}; check OPENAI_API_KEY"
                )),
                StatusCode::TOO_MANY_REQUESTS => AppError::upstream(format!(
                    "completion service rate limited the request: {snippet}"
                )),
                status => AppError::upstream(format!(
                    "completion service returned HTTP status {status}: {snippet}"
                )),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            AppError::upstream(format!("malformed completion response: {err}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::upstream("completion response carried no message content")
            })?;

        debug!(
            model = %self.cfg.model,
            reply_chars = content.chars().count(),
            "completion received"
        );
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.cfg.model
    }
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::{chat_completions_url, OpenAiCompleter};
    use crate::backend::Completer;
    use crate::config::CompletionConfig;
    use crate::error::AppError;

    fn cfg(base_url: String) -> CompletionConfig {
        CompletionConfig {
            base_url,
            api_key: "sk-test".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.5,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn completions_url_normalizes_trailing_slash() {
        assert_eq!(
            chat_completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn sends_single_user_message_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "ping" }],
                "temperature": 0.5,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{ "message": { "role": "assistant", "content": "pong" } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = OpenAiCompleter::new(cfg(format!("{}/v1", server.url()))).unwrap();
        let reply = backend.complete("ping").await.unwrap();

        assert_eq!(reply, "pong");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let backend = OpenAiCompleter::new(cfg(format!("{}/v1", server.url()))).unwrap();
        let err = backend.complete("ping").await.unwrap_err();

        match err {
            AppError::Upstream { detail, .. } => assert!(detail.contains("503")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_choices_is_an_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let backend = OpenAiCompleter::new(cfg(format!("{}/v1", server.url()))).unwrap();
        assert!(matches!(
            backend.complete("ping").await,
            Err(AppError::Upstream { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_upstream_error() {
        let backend = OpenAiCompleter::new(cfg("http://127.0.0.1:9/v1".to_string())).unwrap();
        assert!(matches!(
            backend.complete("ping").await,
            Err(AppError::Upstream { .. })
        ));
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{
    CompletionBackend, CompletionError, CompletionOutput, CompletionRequest, ProviderKind,
    TokenUsage, DEFAULT_TIMEOUT,
};

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY: usize = 300;

/// Chat-completions client for any OpenAI-compatible provider
pub struct OpenAiCompatibleBackend {
    provider: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    /// Backend for `provider`, reading its API key from the environment
    pub fn new(provider: ProviderKind) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("quiploops/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            provider,
            base_url: provider.base_url().to_string(),
            api_key: provider.api_key_from_env(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = self.provider.is_usable_key(&key).then_some(key);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl CompletionBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        self.provider.display_name()
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionOutput, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredentials {
                provider: self.provider,
                env_var: self.provider.api_key_env(),
            })?;

        let body = ChatRequest {
            model: &request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        debug!(
            provider = %self.provider,
            model = %request.model,
            role = %request.role,
            "Sending chat completion request"
        );

        let start = Instant::now();
        let mut call = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body);
        if let Some(limit) = request.timeout {
            call = call.timeout(limit);
        }
        let response = call
            .send()
            .await
            .map_err(|e| send_error(self.provider, request.timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.provider, status = status.as_u16(), "Completion request rejected");
            return Err(classify_status(
                self.provider,
                &request.model,
                status.as_u16(),
                &body,
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                send_error(self.provider, request.timeout, &e)
            } else {
                CompletionError::InvalidResponse {
                    provider: self.provider,
                    message: e.to_string(),
                }
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse {
                provider: self.provider,
                message: "response contained no message content".to_string(),
            })?;

        let mut output = CompletionOutput::new(
            text,
            parsed.model.unwrap_or_else(|| request.model.clone()),
            start.elapsed(),
        );
        if let Some(usage) = parsed.usage {
            output = output.with_usage(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            });
        }

        debug!(
            provider = %self.provider,
            duration_ms = output.duration.as_millis() as u64,
            "Chat completion received"
        );

        Ok(output)
    }
}

/// Map a failed request to a completion error
fn send_error(
    provider: ProviderKind,
    limit: Option<Duration>,
    error: &reqwest::Error,
) -> CompletionError {
    if error.is_timeout() {
        CompletionError::Timeout(limit.unwrap_or(DEFAULT_TIMEOUT))
    } else {
        CompletionError::Transport {
            provider,
            message: error.to_string(),
        }
    }
}

/// Map a non-success HTTP status to a completion error
pub(crate) fn classify_status(
    provider: ProviderKind,
    model: &str,
    status: u16,
    body: &str,
) -> CompletionError {
    let message = error_message(status, body);
    match status {
        401 | 403 => CompletionError::Auth { provider, message },
        404 => CompletionError::ModelUnavailable {
            provider,
            model: model.to_string(),
            message,
        },
        429 => CompletionError::RateLimited { provider, message },
        _ => CompletionError::Transport { provider, message },
    }
}

/// Prefer the `error.message` field of an OpenAI-style error body
fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string());

    let detail: String = detail.chars().take(MAX_ERROR_BODY).collect();
    if detail.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_classify_status() {
        let err = classify_status(ProviderKind::Groq, "llama", 401, "");
        assert!(matches!(err, CompletionError::Auth { .. }));

        let err = classify_status(ProviderKind::Groq, "llama", 404, "");
        assert!(matches!(
            err,
            CompletionError::ModelUnavailable { ref model, .. } if model == "llama"
        ));

        let err = classify_status(ProviderKind::Groq, "llama", 429, "");
        assert!(matches!(err, CompletionError::RateLimited { .. }));

        let err = classify_status(ProviderKind::Groq, "llama", 503, "overloaded");
        assert!(matches!(err, CompletionError::Transport { .. }));
        assert_eq!(err.provider_message(), "HTTP 503: overloaded");
    }

    #[test]
    fn test_error_message_prefers_json_detail() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
        assert_eq!(error_message(401, body), "HTTP 401: Invalid API key");
        assert_eq!(error_message(500, ""), "HTTP 500");
    }

    #[test]
    fn test_error_message_is_bounded() {
        let body = "x".repeat(5000);
        assert!(error_message(500, &body).len() < MAX_ERROR_BODY + 20);
    }

    #[test]
    fn test_placeholder_key_is_not_usable() {
        let backend =
            OpenAiCompatibleBackend::new(ProviderKind::OpenAi).with_api_key("sk-your-key");
        assert!(backend.api_key.is_none());

        let backend = OpenAiCompatibleBackend::new(ProviderKind::OpenAi)
            .with_api_key("sk-live")
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut backend = OpenAiCompatibleBackend::new(ProviderKind::DeepInfra);
        backend.api_key = None;
        assert!(!backend.is_available().await);

        let request = CompletionRequest {
            role: Role::Generator,
            model: "m".into(),
            temperature: 0.9,
            max_tokens: 10,
            system: String::new(),
            prompt: "hi".into(),
            timeout: None,
        };
        let err = backend.complete(&request).await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::MissingCredentials {
                provider: ProviderKind::DeepInfra,
                env_var: "DEEPINFRA_API_KEY",
            }
        );
    }

    fn local_backend(addr: std::net::SocketAddr) -> OpenAiCompatibleBackend {
        OpenAiCompatibleBackend::new(ProviderKind::OpenAi)
            .with_api_key("sk-live")
            .with_base_url(format!("http://{}/v1", addr))
    }

    fn request_with_timeout(timeout: Option<Duration>) -> CompletionRequest {
        CompletionRequest {
            role: Role::Evaluator,
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            max_tokens: 10,
            system: String::new(),
            prompt: "hi".into(),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_silent_server_is_a_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let limit = Duration::from_millis(200);
        let err = local_backend(addr)
            .complete(&request_with_timeout(Some(limit)))
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Timeout(limit));
        server.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = local_backend(addr)
            .complete(&request_with_timeout(Some(Duration::from_secs(5))))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Transport {
                provider: ProviderKind::OpenAi,
                ..
            }
        ));
    }
}

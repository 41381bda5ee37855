//! Model endpoint client.
//!
//! The pipeline only needs "prompt plus optional image in, one text
//! completion out". [`ChatCompletionsClient`] provides that over an
//! OpenAI-compatible `/chat/completions` endpoint.

use crate::config::ModelConfig;
use crate::error::ExtractorError;
use crate::snapshot::ImagePayload;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Attempts per call: the first try plus at most one retry
const MAX_ATTEMPTS: usize = 2;

/// Pause before the retry
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// One completion request
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub image: Option<&'a ImagePayload>,
    /// Ask the endpoint to constrain output to a JSON object
    pub json: bool,
}

/// Trait for anything that can answer a completion request
pub trait ModelClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest<'a>,
    ) -> BoxFuture<'a, Result<String, ExtractorError>>;
}

/// OpenAI-compatible chat completions client
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ExtractorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExtractorError::Initialization(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, request: &CompletionRequest<'_>) -> ChatRequest {
        let content = match request.image {
            Some(image) => json!([
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": image.data_url() } },
            ]),
            None => Value::String(request.prompt.to_string()),
        };

        ChatRequest {
            model: request.model.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.max_tokens,
            temperature: 0.0,
            response_format: request.json.then(|| json!({ "type": "json_object" })),
        }
    }

    async fn send_once(&self, body: &ChatRequest) -> Result<String, ExtractorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractorError::Timeout(self.timeout_secs)
            } else {
                ExtractorError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractorError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractorError::Request(format!("Invalid completion body: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExtractorError::EmptyCompletion);
        }

        Ok(text)
    }
}

impl ModelClient for ChatCompletionsClient {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest<'a>,
    ) -> BoxFuture<'a, Result<String, ExtractorError>> {
        async move {
            let body = self.request_body(&request);
            let mut attempt = 1;
            loop {
                match self.send_once(&body).await {
                    Ok(text) => return Ok(text),
                    Err(e) if attempt < MAX_ATTEMPTS && e.is_transient() => {
                        tracing::warn!(
                            model = request.model,
                            attempt,
                            error = %e,
                            "Model call failed, retrying once"
                        );
                        attempt += 1;
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        .boxed()
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ============================================================================
// Test double
// ============================================================================

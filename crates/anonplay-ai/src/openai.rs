//! OpenAI Responses API client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{AiError, CompletionClient, CompletionRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer credential. Calls fail with [`AiError::Auth`] while unset.
    pub api_key: Option<String>,
    pub model: String,
    /// API root without trailing slash, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Transport-level deadline per request.
    pub request_timeout: Option<Duration>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(mut config: OpenAiConfig) -> Result<Self, AiError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "input": [
                { "role": "developer", "content": request.instruction },
                { "role": "user", "content": request.input },
            ],
            "max_output_tokens": request.max_output_tokens,
        });
        if let Some(schema) = &request.schema {
            body["text"] = json!({
                "format": {
                    "type": "json_schema",
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": true,
                }
            });
        }
        body
    }

    fn transport_error(&self, err: reqwest::Error) -> AiError {
        match self.config.request_timeout {
            Some(limit) if err.is_timeout() => AiError::Timeout(limit),
            _ => AiError::Transport(err.to_string()),
        }
    }
}

/// Text of the last content part of the last output item, trimmed.
fn output_text(body: &ResponsesBody) -> Option<String> {
    let text = body.output.last()?.content.last()?.text.as_deref()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AiError::Auth)?;
        if request.input.is_empty() {
            return Err(AiError::Input("input"));
        }

        let url = format!("{}/responses", self.config.base_url);
        debug!(
            model = %self.config.model,
            schema = request.schema_name(),
            max_output_tokens = request.max_output_tokens,
            "sending completion request"
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            info!(status = status.as_u16(), "completion request rejected");
            return Err(AiError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let body: ResponsesBody = resp
            .json()
            .await
            .map_err(|e| AiError::decode("completion response", e))?;
        output_text(&body).ok_or(AiError::EmptyResponse)
    }
}

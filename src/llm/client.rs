//! LLM client for API communication

use crate::repo::LlmConfig;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OLLAMA_MODEL: &str = "llama3";

/// Response from LLM
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated content
    pub content: String,
    /// Number of tokens used
    pub tokens_used: Option<usize>,
}

/// A completion service
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a completion for one prompt
    async fn complete(&self, prompt: &str) -> Result<LlmResponse>;
}

/// Wire protocol spoken by the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Ollama,
    OpenAi,
}

/// LLM client for Ollama and OpenAI-compatible endpoints
pub struct LlmClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: usize,
    temperature: f32,
    protocol: Protocol,
    client: reqwest::Client,
}

impl LlmClient {
    /// Client for the configured endpoint, `None` when no endpoint is set
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.as_deref() else {
            return Ok(None);
        };
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let protocol = if endpoint.contains("11434") || endpoint.ends_with("/api") {
            Protocol::Ollama
        } else {
            Protocol::OpenAi
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Some(Self {
            endpoint: endpoint.trim_end_matches("/api").to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            protocol,
            client,
        }))
    }

    /// Check if the LLM service answers at all
    pub async fn is_available(&self) -> bool {
        let health_path = match self.protocol {
            Protocol::Ollama => "api/tags",
            Protocol::OpenAi => "v1/models",
        };
        self.client
            .get(format!("{}/{}", self.endpoint, health_path))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    /// POST a JSON body and decode the JSON reply
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("{} answered {}: {}", url, status, detail.trim());
        }

        response
            .json()
            .await
            .with_context(|| format!("Unexpected reply shape from {}", url))
    }
}

#[async_trait::async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse> {
        match self.protocol {
            Protocol::Ollama => {
                let body = GenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                    format: "json",
                    options: GenerateOptions {
                        temperature: self.temperature,
                        num_predict: self.max_tokens,
                    },
                };
                let reply: GenerateReply = self.post_json("api/generate", &body).await?;
                Ok(LlmResponse {
                    content: reply.response,
                    tokens_used: reply.eval_count,
                })
            }
            Protocol::OpenAi => {
                let body = ChatRequest {
                    model: &self.model,
                    messages: [ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                };
                let reply: ChatReply = self.post_json("v1/chat/completions", &body).await?;
                let content = reply
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .context("Completion reply has no choices")?;
                Ok(LlmResponse {
                    content,
                    tokens_used: reply.usage.map(|u| u.total_tokens),
                })
            }
        }
    }
}

// Ollama `/api/generate`

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
    eval_count: Option<usize>,
}

// OpenAI-compatible `/v1/chat/completions`

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: usize,
}

/// Mock LLM backend for testing
#[derive(Default)]
pub struct MockLlmClient {
    responses: Vec<(String, String)>,
    unavailable: bool,
}

impl MockLlmClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every request fails
    pub fn unavailable() -> Self {
        Self {
            responses: Vec::new(),
            unavailable: true,
        }
    }

    /// Answer prompts containing `prompt_contains` with `response`
    pub fn add_response(&mut self, prompt_contains: &str, response: &str) {
        self.responses
            .push((prompt_contains.to_string(), response.to_string()));
    }
}

#[async_trait::async_trait]
impl LlmBackend for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse> {
        if self.unavailable {
            anyhow::bail!("connection refused");
        }

        for (key, response) in &self.responses {
            if prompt.contains(key.as_str()) {
                return Ok(LlmResponse {
                    content: response.clone(),
                    tokens_used: Some(100),
                });
            }
        }

        Ok(LlmResponse {
            content: r#"{"isDrift": true, "explanation": "Mock analysis", "suggestedContent": null, "confidence": 0.5}"#.to_string(),
            tokens_used: Some(50),
        })
    }
}

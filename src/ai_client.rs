// src/ai_client.rs
//! Chat-model client: provider abstraction over one OpenAI-compatible endpoint
//! with two call shapes — free-form generation and structured classification
//! (function calling). Components receive an `Arc<dyn ChatClient>`; there is
//! no global client state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CuratorConfig;

/// Free-form generation: system instruction plus one or more user turns.
/// Extra user turns are how the review loop injects reviewer feedback without
/// re-sending conversation history.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub system: Option<&'a str>,
    pub user_turns: Vec<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Structured classification: the model is forced to answer through one
/// function-call tool whose parameters are a fixed JSON schema.
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub prompt: String,
    pub tool_name: &'a str,
    pub tool_description: &'a str,
    pub parameters: Value,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the assistant's text content.
    async fn generate(&self, req: GenerateRequest<'_>) -> Result<String>;
    /// Returns the parsed arguments of the forced tool call.
    async fn classify(&self, req: ClassifyRequest<'_>) -> Result<Value>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynChatClient = Arc<dyn ChatClient>;

/// Factory: build a client from config and environment.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Otherwise builds the OpenRouter provider (key from `OPENROUTER_API_KEY`).
pub fn build_client_from_config(config: &CuratorConfig) -> DynChatClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockChatClient::default());
    }
    Arc::new(OpenRouterProvider::from_config(config))
}

// ------------------------------------------------------------
// OpenRouter (OpenAI-compatible chat completions)
// ------------------------------------------------------------

pub struct OpenRouterProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("digest-curator/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(config: &CuratorConfig) -> Self {
        Self::new(config.ai.model.clone(), config.ai.base_url.clone())
    }

    async fn post_completion(&self, req: &WireRequest<'_>) -> Result<WireResponse> {
        if self.api_key.is_empty() {
            bail!("OPENROUTER_API_KEY is not set");
        }
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .context("chat completion request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {body}");
        }
        resp.json::<WireResponse>()
            .await
            .context("malformed chat completion response")
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    function: WireToolFunction,
}

#[derive(Deserialize)]
struct WireToolFunction {
    arguments: String,
}

#[async_trait]
impl ChatClient for OpenRouterProvider {
    async fn generate(&self, req: GenerateRequest<'_>) -> Result<String> {
        let mut messages = Vec::with_capacity(req.user_turns.len() + 1);
        if let Some(system) = req.system {
            messages.push(WireMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        for turn in req.user_turns {
            messages.push(WireMessage {
                role: "user",
                content: turn,
            });
        }
        let wire = WireRequest {
            model: &self.model,
            messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            tools: None,
            tool_choice: None,
        };
        let body = self.post_completion(&wire).await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            bail!("chat completion returned no content");
        }
        Ok(content)
    }

    async fn classify(&self, req: ClassifyRequest<'_>) -> Result<Value> {
        let tool = serde_json::json!([{
            "type": "function",
            "function": {
                "name": req.tool_name,
                "description": req.tool_description,
                "parameters": req.parameters,
            }
        }]);
        let choice = serde_json::json!({
            "type": "function",
            "function": { "name": req.tool_name }
        });
        let wire = WireRequest {
            model: &self.model,
            messages: vec![WireMessage {
                role: "user",
                content: req.prompt,
            }],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            tools: Some(tool),
            tool_choice: Some(choice),
        };
        let body = self.post_completion(&wire).await?;
        let arguments = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.tool_calls)
            .and_then(|calls| calls.into_iter().next())
            .map(|call| call.function.arguments)
            .context("classification response carried no tool call")?;
        serde_json::from_str(&arguments).context("tool call arguments are not valid JSON")
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }
}

// ------------------------------------------------------------
// Mock client for local runs and tests
// ------------------------------------------------------------

/// Deterministic client: fixed generation text and a benign classification.
pub struct MockChatClient {
    pub generate_response: String,
    pub classify_response: Value,
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self {
            generate_response: "[]".to_string(),
            classify_response: crate::curate::moderate::benign_categories_value(),
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn generate(&self, _req: GenerateRequest<'_>) -> Result<String> {
        Ok(self.generate_response.clone())
    }

    async fn classify(&self, _req: ClassifyRequest<'_>) -> Result<Value> {
        Ok(self.classify_response.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

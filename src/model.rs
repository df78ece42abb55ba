//! Chat client for a hosted vision-language model.
//!
//! Speaks the OpenAI-compatible chat-completions format, which the Hugging
//! Face inference router serves for the default model. Screenshots ride
//! along as base64 data-URL image blocks.

use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::DynamicImage;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use crate::{Error, Result};

/// Hosted vision model the agent talks to by default.
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2-VL-72B-Instruct";
pub const DEFAULT_API_BASE: &str = "https://router.huggingface.co/v1";

const MAX_RETRIES: u64 = 10;
const MAX_TOKENS: u32 = 2048;

/// What the model produced for one step: optional free text and, usually,
/// one tool call.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub text: Option<String>,
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Thin reqwest client for the chat endpoint.
pub struct ChatModel {
    http: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ChatModel {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a client from `HF_TOKEN` (or `WEBPILOT_API_KEY`) and an
    /// optional `WEBPILOT_API_BASE` override.
    pub fn from_env(model: &str) -> Result<Self> {
        let api_key = std::env::var("HF_TOKEN")
            .or_else(|_| std::env::var("WEBPILOT_API_KEY"))
            .map_err(|_| Error::Model("set HF_TOKEN or WEBPILOT_API_KEY".into()))?;
        let api_base =
            std::env::var("WEBPILOT_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into());
        Ok(Self::new(api_base, api_key, model))
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }

    /// One chat turn: send the conversation plus tool schemas, return the
    /// model's text and first tool call.
    pub async fn chat(&self, messages: &[Value], tools: &Value) -> Result<ModelOutput> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
            "tools": tools,
            "tool_choice": "auto",
        });
        let resp = self.call_with_retry(&body).await?;
        parse_output(&resp)
    }

    async fn call_with_retry(&self, body: &Value) -> Result<Value> {
        for attempt in 0..MAX_RETRIES {
            let resp = self
                .http
                .post(format!("{}/chat/completions", self.api_base))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await?;

            let status = resp.status();
            let json: Value = resp.json().await?;

            if status == 429 || json["error"]["code"] == "rate_limit_exceeded" {
                let wait = (attempt + 1) * 5;
                warn!("rate limited, waiting {wait}s...");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if let Some(err) = json.get("error") {
                return Err(Error::Model(err.to_string()));
            }

            return Ok(json);
        }
        Err(Error::Model(format!(
            "rate limited after {MAX_RETRIES} retries"
        )))
    }
}

/// Pull text and the first tool call out of a chat-completions response.
pub fn parse_output(resp: &Value) -> Result<ModelOutput> {
    let message = &resp["choices"][0]["message"];
    if message.is_null() {
        return Err(Error::Model(format!("no choices in response: {resp}")));
    }

    let text = message["content"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(String::from);

    let tool_call = message["tool_calls"]
        .as_array()
        .and_then(|calls| calls.first())
        .map(|tc| {
            // arguments arrive as a JSON-encoded string
            let arguments = tc["function"]["arguments"]
                .as_str()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_else(|| json!({}));
            ToolCall {
                name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                arguments,
            }
        });

    Ok(ModelOutput { text, tool_call })
}

/// Encode a captured screenshot as a data-URL image content block.
pub fn image_block(image: &DynamicImage) -> Result<Value> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(json!({
        "type": "image_url",
        "image_url": { "url": format!("data:image/png;base64,{}", BASE64.encode(&png)) }
    }))
}

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::InferenceError;
use crate::types::{ContentBlock, ModelRequest, ModelResponse, StopReason, Turn, Usage};

/// Pure LLM API call. No state, no history, no termination policy.
/// Request in, response out.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, InferenceError>;
}

/// Blanket impl so `Box<dyn ModelProvider>` can be passed directly to
/// `Orchestrator::new()`.
#[async_trait]
impl ModelProvider for Box<dyn ModelProvider> {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, InferenceError> {
        (**self).invoke(request).await
    }
}

/// Claude API client via Anthropic's messages endpoint.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Serialize the typed transcript into Anthropic wire messages.
///
/// Assistant turns become `text` + `tool_use` blocks; tool results go
/// back as a `user` message holding `tool_result` blocks.
pub(crate) fn wire_messages(transcript: &[Turn]) -> Vec<Value> {
    transcript
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => json!({ "role": "user", "content": text }),
            Turn::Assistant { text, tool_calls } => {
                let mut blocks = Vec::new();
                if let Some(text) = text {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
                for call in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                json!({ "role": "assistant", "content": blocks })
            }
            Turn::ToolResults { results } => {
                let blocks: Vec<Value> = results
                    .iter()
                    .map(|outcome| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": outcome.tool_call_id,
                            "content": outcome.content,
                        })
                    })
                    .collect();
                json!({ "role": "user", "content": blocks })
            }
        })
        .collect()
}

pub(crate) fn parse_response(body: &str) -> Result<ModelResponse, InferenceError> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| InferenceError::Parse(e.to_string()))?;

    let stop_reason = match parsed["stop_reason"].as_str().unwrap_or("unknown") {
        "end_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        other => {
            return Err(InferenceError::Parse(format!(
                "unknown stop_reason: {other}"
            )))
        }
    };

    let raw = parsed["content"].as_array().cloned().unwrap_or_default();
    let content = raw
        .iter()
        .filter_map(|block| match block["type"].as_str()? {
            "text" => Some(ContentBlock::Text(
                block["text"].as_str().unwrap_or("").to_string(),
            )),
            "tool_use" => Some(ContentBlock::ToolUse {
                id: block["id"].as_str()?.to_string(),
                name: block["name"].as_str()?.to_string(),
                input: block["input"].clone(),
            }),
            _ => None,
        })
        .collect();

    let usage = Usage {
        input_tokens: parsed["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: parsed["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(ModelResponse {
        stop_reason,
        content,
        usage,
    })
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, InferenceError> {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": wire_messages(&request.transcript),
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools);
            body["tool_choice"] = json!({ "type": "auto" });
        }

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        if status != 200 {
            return Err(InferenceError::ApiError { status, body: text });
        }

        parse_response(&text)
    }
}

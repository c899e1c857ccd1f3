use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in the transcript sent to the model. A transcript always
/// begins with exactly one `User` turn.
#[derive(Debug, Clone)]
pub enum Turn {
    User {
        text: String,
    },
    /// The model's turn: answer text, requested tool calls, or both.
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Outcomes for the tool calls of the immediately preceding
    /// assistant turn, keyed by call id. Failed outcomes are omitted.
    ToolResults {
        results: Vec<ToolOutcome>,
    },
}

/// A tool invocation requested by the model. Copied into the transcript
/// verbatim; the orchestrator never rewrites it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The result of dispatching one `ToolCall` through the registry.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub content: String,
    pub failed: bool,
}

/// Attribution surfaced to the end user alongside the final answer,
/// e.g. label "Course X - Lesson 2" plus a deep link when one exists.
/// Sources live outside the transcript; each dispatch batch replaces
/// the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub label: String,
    pub link: Option<String>,
}

/// Fully-formed request — the provider just sends it.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: String,
    pub tools: Vec<Value>,
    pub transcript: Vec<Turn>,
}

/// What came back from the model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

impl ModelResponse {
    /// The first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// All requested tool calls, in response order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn used_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// A content block in the model's response.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    ToolUse { id: String, name: String, input: Value },
}

/// Token usage for a single inference call.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

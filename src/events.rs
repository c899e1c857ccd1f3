use serde_json::Value;

/// Events emitted during a run, for UI streaming.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    RoundStart { round: usize },
    Text { content: String },
    ToolCall { name: String, input: Value },
    ToolResult { name: String, output: String, failed: bool },
    Finished { rounds: usize },
}

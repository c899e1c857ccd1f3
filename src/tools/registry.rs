use serde_json::Value;
use tracing::warn;

use super::handler::{ToolDef, ToolHandler};
use crate::types::{SourceRecord, ToolCall, ToolOutcome};

/// Catalog of available tools. Stores definitions in registration order,
/// provides schemas for the model, dispatches calls by name, and holds
/// the per-batch source side channel.
///
/// A registry's source slot belongs to one in-flight query at a time.
/// `Assistant::query` takes `&mut self` for exactly this reason: run
/// concurrent queries against separate assistants, not a shared one.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. The schema is the complete JSON tool definition
    /// (name, description, input_schema) sent to the LLM.
    ///
    /// Re-registering a name replaces the earlier entry (last write wins,
    /// landing at the back of the registration order). Callers must not
    /// rely on duplicate registration.
    pub fn add(
        mut self,
        name: impl Into<String>,
        schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        let name = name.into();
        self.tools.retain(|t| t.name != name);
        self.tools.push(ToolDef {
            name,
            schema,
            handler: Box::new(handler),
        });
        self
    }

    /// All tool schemas for the LLM API request, in registration order.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.schema.clone()).collect()
    }

    /// Schema for a specific tool by name.
    pub fn schema(&self, name: &str) -> Option<&Value> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.schema)
    }

    /// Dispatch one call. Unknown names and handler errors come back as
    /// failed outcomes so one bad call never aborts the whole round.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|t| t.name == call.name) else {
            warn!(tool = %call.name, id = %call.id, "unknown tool requested");
            return ToolOutcome {
                tool_call_id: call.id.clone(),
                content: format!("unknown tool: {}", call.name),
                failed: true,
            };
        };

        match tool.handler.call(&call.arguments).await {
            Ok(content) => ToolOutcome {
                tool_call_id: call.id.clone(),
                content,
                failed: false,
            },
            Err(message) => {
                warn!(tool = %call.name, id = %call.id, error = %message, "tool call failed");
                ToolOutcome {
                    tool_call_id: call.id.clone(),
                    content: message,
                    failed: true,
                }
            }
        }
    }

    /// Provenance from the most recent dispatch batch. At most one
    /// retrieval tool emits sources per round; the first tool holding a
    /// non-empty batch wins.
    pub fn last_sources(&self) -> Vec<SourceRecord> {
        self.tools
            .iter()
            .map(|t| t.handler.last_sources())
            .find(|sources| !sources.is_empty())
            .unwrap_or_default()
    }

    /// Clear every tool's source slot. Called by the assistant after
    /// reading sources for a query, never automatically.
    pub fn reset_sources(&self) {
        for tool in &self.tools {
            tool.handler.reset_sources();
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use async_trait::async_trait;
use serde_json::Value;

use crate::types::SourceRecord;

/// A tool's execution handler. Consumers implement this for each tool.
///
/// `Err` means a failed outcome, not a crash: the registry wraps it and
/// the round continues. Handlers must validate their own arguments and
/// reject malformed input through `Err` rather than panicking.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: &Value) -> Result<String, String>;

    /// Sources produced by the most recent `call`. Tools that surface
    /// provenance override this; everything else keeps the empty default.
    fn last_sources(&self) -> Vec<SourceRecord> {
        Vec::new()
    }

    /// Drop the current source batch.
    fn reset_sources(&self) {}
}

/// A tool definition: schema for the LLM + handler for execution.
pub struct ToolDef {
    pub name: String,
    pub schema: Value,
    pub(crate) handler: Box<dyn ToolHandler>,
}

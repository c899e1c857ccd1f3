pub mod error;
pub mod events;
pub mod prompt;
pub mod provider;
pub mod retrieval;
pub mod session;
pub mod tools;
pub mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use error::{AgentError, InferenceError};
pub use events::AgentEvent;
pub use provider::{AnthropicProvider, ModelProvider};
pub use retrieval::{
    ChunkMetadata, CourseOutline, InMemoryBackend, LessonEntry, RetrievalBackend, SearchMatch,
    SearchResults,
};
pub use session::{ConversationStore, Exchange, FileStore, InMemoryStore};
pub use tools::{CourseOutlineTool, CourseSearchTool, ToolDef, ToolHandler, ToolRegistry};
pub use types::{
    ContentBlock, ModelRequest, ModelResponse, SourceRecord, StopReason, ToolCall, ToolOutcome,
    Turn, Usage,
};

/// Upper bound on tool rounds before a forced text-only synthesis.
/// A design constant of the protocol, not a deployment knob.
const MAX_ROUNDS: usize = 2;

/// Returned when a round produces no usable tool output and the model
/// gave no text of its own.
const FALLBACK_ANSWER: &str =
    "I apologize, but I encountered an error while processing your request.";

/// Knobs for one assistant instance.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// How many prior exchanges to feed back as conversation history.
    pub max_history: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 800,
            temperature: 0.0,
            max_history: 2,
        }
    }
}

/// Drives the bounded round-trip protocol between the model and the
/// tool registry for the duration of one query.
///
/// Each round is one model invocation followed by one dispatch batch.
/// Termination: the model answers in text, a round yields no usable tool
/// output, or the round budget runs out and a final call without tool
/// schemas forces a synthesis. At most `MAX_ROUNDS + 1` model calls.
pub struct Orchestrator {
    provider: Box<dyn ModelProvider>,
    config: AssistantConfig,
}

impl Orchestrator {
    pub fn new(provider: impl ModelProvider + 'static, config: AssistantConfig) -> Self {
        Self {
            provider: Box::new(provider),
            config,
        }
    }

    /// Answer one query. With no registry this is a single model call
    /// without tools; otherwise the full protocol runs.
    pub async fn run(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolRegistry>,
    ) -> Result<String, AgentError> {
        self.run_loop(query, history, tools, None, None).await
    }

    /// Same as `run`, aborting between rounds (and mid-call) once the
    /// token is cancelled.
    pub async fn run_with_cancel(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolRegistry>,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        self.run_loop(query, history, tools, Some(cancel), None)
            .await
    }

    /// Same as `run`, emitting progress events for UI streaming.
    pub async fn run_streaming(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolRegistry>,
        tx: tokio::sync::mpsc::Sender<AgentEvent>,
    ) -> Result<String, AgentError> {
        self.run_loop(query, history, tools, None, Some(tx)).await
    }

    async fn run_loop(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolRegistry>,
        cancel: Option<CancellationToken>,
        tx: Option<tokio::sync::mpsc::Sender<AgentEvent>>,
    ) -> Result<String, AgentError> {
        let system = prompt::system_content(history);
        let mut transcript = vec![Turn::User {
            text: query.to_string(),
        }];
        let mut usage = Usage::default();

        let Some(registry) = tools else {
            let response = self
                .invoke(&transcript, &system, Vec::new(), cancel.as_ref())
                .await?;
            let answer = response.text().unwrap_or_default().to_string();
            self.finish(&tx, 0, Some(&answer)).await;
            return Ok(answer);
        };

        let mut round = 0;
        while round < MAX_ROUNDS {
            if let Some(ref cancel) = cancel {
                if cancel.is_cancelled() {
                    info!(round, "orchestration cancelled");
                    return Err(AgentError::Cancelled);
                }
            }
            if let Some(ref tx) = tx {
                let _ = tx.send(AgentEvent::RoundStart { round }).await;
            }

            let response = self
                .invoke(&transcript, &system, registry.schemas(), cancel.as_ref())
                .await?;
            usage.accumulate(&response.usage);

            if !response.used_tools() {
                info!(rounds = round, "model answered without tools");
                let answer = response.text().unwrap_or_default().to_string();
                self.finish(&tx, round, Some(&answer)).await;
                return Ok(answer);
            }

            let calls = response.tool_calls();
            let own_text = response.text().map(str::to_string);
            transcript.push(Turn::Assistant {
                text: own_text.clone(),
                tool_calls: calls.clone(),
            });

            // Dispatch in call order. Failed outcomes are dropped from
            // the transcript, matching the model-facing contract that
            // only produced results are reported back.
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in &calls {
                if let Some(ref tx) = tx {
                    let _ = tx
                        .send(AgentEvent::ToolCall {
                            name: call.name.clone(),
                            input: call.arguments.clone(),
                        })
                        .await;
                }
                let outcome = registry.dispatch(call).await;
                if let Some(ref tx) = tx {
                    let _ = tx
                        .send(AgentEvent::ToolResult {
                            name: call.name.clone(),
                            output: outcome.content.clone(),
                            failed: outcome.failed,
                        })
                        .await;
                }
                if outcome.failed {
                    warn!(tool = %call.name, id = %call.id, "dropping failed tool outcome");
                } else {
                    outcomes.push(outcome);
                }
            }

            // A round with no usable tool output cannot be continued:
            // fall back to the model's own text from this response.
            if outcomes.is_empty() {
                warn!(round, "every tool call in the round failed");
                let answer = own_text.unwrap_or_else(|| FALLBACK_ANSWER.to_string());
                self.finish(&tx, round + 1, Some(&answer)).await;
                return Ok(answer);
            }

            transcript.push(Turn::ToolResults { results: outcomes });
            round += 1;
            info!(round, "tool round complete");
        }

        // Round budget exhausted: one last call without tool schemas so
        // the model has to synthesize from what it gathered.
        let response = self
            .invoke(&transcript, &system, Vec::new(), cancel.as_ref())
            .await?;
        usage.accumulate(&response.usage);
        info!(
            rounds = MAX_ROUNDS,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "forced synthesis complete"
        );
        let answer = response.text().unwrap_or_default().to_string();
        self.finish(&tx, MAX_ROUNDS, Some(&answer)).await;
        Ok(answer)
    }

    async fn invoke(
        &self,
        transcript: &[Turn],
        system: &str,
        tools: Vec<serde_json::Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ModelResponse, AgentError> {
        let request = ModelRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system.to_string(),
            tools,
            transcript: transcript.to_vec(),
        };

        match cancel {
            Some(cancel) => tokio::select! {
                result = self.provider.invoke(request) => Ok(result?),
                _ = cancel.cancelled() => {
                    info!("orchestration cancelled during inference");
                    Err(AgentError::Cancelled)
                }
            },
            None => Ok(self.provider.invoke(request).await?),
        }
    }

    async fn finish(
        &self,
        tx: &Option<tokio::sync::mpsc::Sender<AgentEvent>>,
        rounds: usize,
        text: Option<&str>,
    ) {
        if let Some(tx) = tx {
            if let Some(text) = text {
                let _ = tx
                    .send(AgentEvent::Text {
                        content: text.to_string(),
                    })
                    .await;
            }
            let _ = tx.send(AgentEvent::Finished { rounds }).await;
        }
    }
}

/// The reply to one query: the final answer plus the provenance of the
/// last retrieval that fed it.
#[derive(Debug)]
pub struct QueryReply {
    pub answer: String,
    pub sources: Vec<SourceRecord>,
}

/// The caller-facing assembly: orchestrator + retrieval tools + session
/// history. Wire up a provider and a backend, and go.
pub struct Assistant {
    orchestrator: Orchestrator,
    registry: ToolRegistry,
    sessions: Box<dyn ConversationStore>,
    max_history: usize,
}

impl Assistant {
    pub fn new(
        provider: impl ModelProvider + 'static,
        backend: Arc<dyn RetrievalBackend>,
        config: AssistantConfig,
    ) -> Self {
        let registry = ToolRegistry::new()
            .add(
                "search_course_content",
                CourseSearchTool::definition(),
                CourseSearchTool::new(backend.clone()),
            )
            .add(
                "get_course_outline",
                CourseOutlineTool::definition(),
                CourseOutlineTool::new(backend),
            );
        Self {
            max_history: config.max_history,
            orchestrator: Orchestrator::new(provider, config),
            registry,
            sessions: Box::new(InMemoryStore::new()),
        }
    }

    pub fn with_sessions(mut self, store: impl ConversationStore + 'static) -> Self {
        self.sessions = Box::new(store);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// One full query: history in, orchestrated answer + sources out.
    ///
    /// Takes `&mut self` so two in-flight queries can never share the
    /// registry's source slot; run concurrent queries on separate
    /// assistants.
    pub async fn query(
        &mut self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<QueryReply, AgentError> {
        // A failed run can leave a dispatched batch behind; clear it so
        // this reply never surfaces a previous query's provenance.
        self.registry.reset_sources();

        let prompt_text = format!("Answer this question about course materials: {query}");

        let history = match session_id {
            Some(sid) => {
                let recent = self.sessions.recent(sid, self.max_history).await?;
                if recent.is_empty() {
                    None
                } else {
                    Some(session::format_history(&recent))
                }
            }
            None => None,
        };

        let answer = self
            .orchestrator
            .run(&prompt_text, history.as_deref(), Some(&self.registry))
            .await?;

        let sources = self.registry.last_sources();
        self.registry.reset_sources();

        if let Some(sid) = session_id {
            self.sessions
                .append(sid, Exchange::now(query, answer.clone()))
                .await?;
        }

        Ok(QueryReply { answer, sources })
    }
}

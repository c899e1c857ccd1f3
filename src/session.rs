use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AgentError;

/// One user/assistant exchange within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl Exchange {
    pub fn now(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            at: chrono::Utc::now(),
        }
    }
}

/// Persists conversation history across queries in a session.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, session_id: &str, exchange: Exchange) -> Result<(), AgentError>;

    /// The most recent `limit` exchanges, oldest first. Unknown sessions
    /// are empty, not errors.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Exchange>, AgentError>;
}

/// Render exchanges the way the model sees prior conversation.
pub fn format_history(exchanges: &[Exchange]) -> String {
    exchanges
        .iter()
        .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
        .collect::<Vec<_>>()
        .join("\n")
}

// --- InMemoryStore ---

/// Session history in a process-local map. The default store.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: Mutex<HashMap<String, Vec<Exchange>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn append(&self, session_id: &str, exchange: Exchange) -> Result<(), AgentError> {
        self.sessions
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(exchange);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Exchange>, AgentError> {
        let sessions = self.sessions.lock().await;
        let Some(exchanges) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let skip = exchanges.len().saturating_sub(limit);
        Ok(exchanges[skip..].to_vec())
    }
}

// --- FileStore ---

/// Saves each session's history to disk as JSON.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Exchange>, AgentError> {
        match tokio::fs::read_to_string(self.path(session_id)).await {
            Ok(json) => {
                serde_json::from_str(&json).map_err(|e| AgentError::Session(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AgentError::Session(e.to_string())),
        }
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    async fn append(&self, session_id: &str, exchange: Exchange) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AgentError::Session(e.to_string()))?;
        let mut exchanges = self.load(session_id).await?;
        exchanges.push(exchange);
        let json = serde_json::to_string_pretty(&exchanges)
            .map_err(|e| AgentError::Session(e.to_string()))?;
        tokio::fs::write(self.path(session_id), json)
            .await
            .map_err(|e| AgentError::Session(e.to_string()))?;
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Exchange>, AgentError> {
        let exchanges = self.load(session_id).await?;
        let skip = exchanges.len().saturating_sub(limit);
        Ok(exchanges[skip..].to_vec())
    }
}

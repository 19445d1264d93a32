// src/llm/mod.rs
//! Boundary to the external LLM and web-search services.
//!
//! Adapters classify failures into `LlmError` where the raw HTTP status and
//! body are visible; the collection pipeline only ever matches on variants.

pub mod gemini;
pub mod mock;
pub mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Rate limit / quota exhaustion; worth waiting out.
    #[error("quota exceeded: {0}")]
    Quota(String),
    /// The agent asked for more tool steps than allowed.
    #[error("recursion limit of {0} tool steps exceeded")]
    RecursionLimit(usize),
    #[error("{0}")]
    Other(String),
}

/// One fragment of a structured message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub text: Option<String>,
}

/// Message bodies come back either as a single string or as fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Fragments(Vec<Fragment>),
}

impl MessageContent {
    /// Collapse either shape into one text blob.
    pub fn into_text(self) -> String {
        match self {
            MessageContent::Text(s) => s,
            MessageContent::Fragments(parts) => parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Transcript of one agent session; the last message is the answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub messages: Vec<AgentMessage>,
}

impl AgentResponse {
    pub fn final_text(self) -> Option<String> {
        self.messages.into_iter().last().map(|m| m.content.into_text())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Plain text-in/text-out completion.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
    fn name(&self) -> &str;
}

/// Tool-augmented session, capped at `recursion_limit` tool steps.
#[async_trait]
pub trait SearchAgent: Send + Sync {
    async fn run(&self, prompt: &str, recursion_limit: usize) -> Result<AgentResponse, LlmError>;
    fn name(&self) -> &str;
}

/// Web search as seen by the agent's tool loop.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LlmError>;
    fn name(&self) -> &'static str;
}

/// Map an HTTP failure to the boundary taxonomy. Quota signals come either
/// as status 429 or as a RESOURCE_EXHAUSTED / quota message in the body.
pub(crate) fn classify_http_failure(status: u16, body: &str) -> LlmError {
    let snippet: String = body.chars().take(512).collect();
    let lowered = body.to_ascii_lowercase();
    if status == 429
        || body.contains("RESOURCE_EXHAUSTED")
        || body.contains("ResourceExhausted")
        || lowered.contains("quota exceeded")
        || lowered.contains("exceeded your current quota")
    {
        LlmError::Quota(format!("http {status}: {snippet}"))
    } else {
        LlmError::Other(format!("http {status}: {snippet}"))
    }
}

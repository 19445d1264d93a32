// src/llm/mock.rs
//! Scripted collaborators for tests and dry runs. Each call pops the next
//! scripted outcome; an exhausted script answers with `LlmError::Other`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{
    AgentMessage, AgentResponse, CompletionModel, LlmError, MessageContent, SearchAgent,
};

pub struct ScriptedAgent {
    script: Mutex<VecDeque<Result<AgentResponse, LlmError>>>,
    calls: Mutex<Vec<usize>>,
}

impl ScriptedAgent {
    pub fn new(script: Vec<Result<AgentResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand: every entry answers with a final text message.
    pub fn from_texts(texts: Vec<Result<String, LlmError>>) -> Self {
        Self::new(
            texts
                .into_iter()
                .map(|r| r.map(|t| Self::answer(MessageContent::Text(t))))
                .collect(),
        )
    }

    pub fn answer(content: MessageContent) -> AgentResponse {
        AgentResponse {
            messages: vec![AgentMessage {
                role: "assistant".to_string(),
                content,
            }],
        }
    }

    /// Recursion limits passed on each call, in order.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().expect("agent mutex poisoned").clone()
    }
}

#[async_trait]
impl SearchAgent for ScriptedAgent {
    async fn run(&self, _prompt: &str, recursion_limit: usize) -> Result<AgentResponse, LlmError> {
        self.calls
            .lock()
            .expect("agent mutex poisoned")
            .push(recursion_limit);
        self.script
            .lock()
            .expect("agent mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Other("agent script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted-agent"
    }
}

pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("completion mutex poisoned").clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .expect("completion mutex poisoned")
            .push(prompt.to_string());
        self.script
            .lock()
            .expect("completion mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Other("completion script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted-completion"
    }
}

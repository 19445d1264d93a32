// src/llm/gemini.rs
//! Gemini `generateContent` adapter: a plain completion model plus a
//! tool-calling agent loop that exposes one `web_search` function.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    classify_http_failure, AgentMessage, AgentResponse, CompletionModel, Fragment, LlmError,
    MessageContent, SearchAgent, WebSearch,
};
use crate::config::research::{LlmSection, ModelSection};

const SEARCH_TOOL_NAME: &str = "web_search";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Value>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

/// Thin HTTP client bound to one model.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, llm: &LlmSection, model: &ModelSection) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent("skill-trend-collector/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(llm.timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::Other(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            api_base: llm.api_base.trim_end_matches('/').to_string(),
            model: model.model.clone(),
            temperature: model.temperature,
        })
    }

    async fn generate(&self, contents: &[Value], tools: Option<Value>) -> Result<Candidate, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": self.temperature },
        });
        if let Some(t) = tools {
            body["tools"] = t;
        }

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Other(format!("gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_failure(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Other(format!("gemini response decode: {e}")))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Other("gemini returned no candidates".to_string()))
    }
}

fn user_text(text: &str) -> Value {
    json!({ "role": "user", "parts": [{ "text": text }] })
}

fn parts_of(content: &Value) -> &[Value] {
    content
        .get("parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text_fragments(content: &Value) -> Vec<Fragment> {
    parts_of(content)
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .map(|t| Fragment {
            text: Some(t.to_string()),
        })
        .collect()
}

fn as_message_content(mut fragments: Vec<Fragment>) -> MessageContent {
    if fragments.len() == 1 {
        MessageContent::Text(fragments.remove(0).text.unwrap_or_default())
    } else {
        MessageContent::Fragments(fragments)
    }
}

#[async_trait]
impl CompletionModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let candidate = self.generate(&[user_text(prompt)], None).await?;
        let content = candidate.content.unwrap_or(Value::Null);
        let text = as_message_content(text_fragments(&content)).into_text();
        if text.is_empty() {
            debug!(finish_reason = ?candidate.finish_reason, "gemini completion returned no text");
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// ReAct-style loop: the model either answers or calls `web_search`; each
/// round with tool calls is one step against the recursion limit.
pub struct GeminiAgent {
    client: GeminiClient,
    search: Arc<dyn WebSearch>,
}

impl GeminiAgent {
    pub fn new(client: GeminiClient, search: Arc<dyn WebSearch>) -> Self {
        Self { client, search }
    }

    fn tool_declarations() -> Value {
        json!([{
            "functionDeclarations": [{
                "name": SEARCH_TOOL_NAME,
                "description": "Search the web for recent news articles. Returns title, url and snippet for each hit.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search query" }
                    },
                    "required": ["query"]
                }
            }]
        }])
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<Value, LlmError> {
        if name != SEARCH_TOOL_NAME {
            return Ok(json!({ "error": format!("unknown tool: {name}") }));
        }
        let query = args.get("query").and_then(Value::as_str).unwrap_or("").trim();
        if query.is_empty() {
            return Ok(json!({ "error": "empty query" }));
        }
        info!(tool = self.search.name(), %query, "agent search");
        match self.search.search(query).await {
            Ok(hits) => Ok(json!({ "results": hits })),
            // quota on the search side ends the session like a model quota
            Err(e @ LlmError::Quota(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, %query, "search tool failed, reporting to agent");
                Ok(json!({ "error": e.to_string() }))
            }
        }
    }
}

#[async_trait]
impl SearchAgent for GeminiAgent {
    async fn run(&self, prompt: &str, recursion_limit: usize) -> Result<AgentResponse, LlmError> {
        let mut contents = vec![user_text(prompt)];
        let mut transcript = AgentResponse {
            messages: vec![AgentMessage {
                role: "user".to_string(),
                content: MessageContent::Text(prompt.to_string()),
            }],
        };
        let mut steps = 0usize;

        loop {
            let candidate = self
                .client
                .generate(&contents, Some(Self::tool_declarations()))
                .await?;
            let content = candidate
                .content
                .ok_or_else(|| LlmError::Other("gemini candidate without content".to_string()))?;

            let calls: Vec<(String, Value)> = parts_of(&content)
                .iter()
                .filter_map(|p| p.get("functionCall"))
                .map(|fc| {
                    (
                        fc.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                        fc.get("args").cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();

            transcript.messages.push(AgentMessage {
                role: "assistant".to_string(),
                content: as_message_content(text_fragments(&content)),
            });

            if calls.is_empty() {
                return Ok(transcript);
            }

            steps += 1;
            if steps > recursion_limit {
                return Err(LlmError::RecursionLimit(recursion_limit));
            }

            contents.push(content);
            let mut responses = Vec::with_capacity(calls.len());
            for (name, args) in calls {
                let result = self.call_tool(&name, &args).await?;
                transcript.messages.push(AgentMessage {
                    role: "tool".to_string(),
                    content: MessageContent::Text(result.to_string()),
                });
                responses.push(json!({
                    "functionResponse": { "name": name, "response": result }
                }));
            }
            contents.push(json!({ "role": "user", "parts": responses }));
        }
    }

    fn name(&self) -> &str {
        self.client.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_text_part_is_plain_text() {
        let content = json!({ "role": "model", "parts": [{ "text": "only" }] });
        assert_eq!(
            as_message_content(text_fragments(&content)),
            MessageContent::Text("only".to_string())
        );
    }

    #[test]
    fn function_call_parts_carry_no_text() {
        let content = json!({
            "role": "model",
            "parts": [
                { "text": "searching" },
                { "functionCall": { "name": "web_search", "args": { "query": "x" } } }
            ]
        });
        assert_eq!(text_fragments(&content).len(), 1);
        assert_eq!(parts_of(&content).len(), 2);
    }
}

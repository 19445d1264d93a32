// src/llm/tavily.rs
//! Tavily search API as the agent's `web_search` tool.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{classify_http_failure, LlmError, SearchHit, WebSearch};
use crate::config::research::TavilySection;

/// Snippets are cut to this many characters before reaching the model.
const SNIPPET_CAP: usize = 1500;

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    max_results: u32,
    search_depth: String,
    include_raw_content: bool,
    start_date: Option<NaiveDate>,
}

impl TavilySearch {
    pub fn new(api_key: String, cfg: &TavilySection) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent("skill-trend-collector/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::Other(format!("building http client: {e}")))?;
        let depth = if cfg.search_depth.trim().eq_ignore_ascii_case("advanced") {
            "advanced"
        } else {
            "basic"
        };
        Ok(Self {
            http,
            api_key,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            max_results: cfg.max_results.clamp(1, 20),
            search_depth: depth.to_string(),
            include_raw_content: cfg.include_raw_content,
            start_date: None,
        })
    }

    /// Restrict results to articles published on or after `start`.
    pub fn with_start_date(mut self, start: NaiveDate) -> Self {
        self.start_date = Some(start);
        self
    }
}

/// Decode entities and collapse whitespace in a snippet.
pub fn clean_snippet(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > SNIPPET_CAP {
        collapsed.chars().take(SNIPPET_CAP).collect()
    } else {
        collapsed
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LlmError> {
        let mut body = json!({
            "query": query,
            "search_depth": self.search_depth,
            "max_results": self.max_results,
            "include_raw_content": self.include_raw_content,
            "topic": "news",
        });
        if let Some(start) = self.start_date {
            body["start_date"] = json!(start.format("%Y-%m-%d").to_string());
        }

        let resp = self
            .http
            .post(format!("{}/search", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Other(format!("tavily request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_failure(status.as_u16(), &text));
        }

        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Other(format!("tavily response decode: {e}")))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| !r.url.trim().is_empty())
            .map(|r| {
                let body = match r.raw_content {
                    Some(raw) if self.include_raw_content && !raw.trim().is_empty() => raw,
                    _ => r.content,
                };
                SearchHit {
                    title: clean_snippet(&r.title),
                    url: r.url,
                    snippet: clean_snippet(&body),
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippets_are_decoded_and_capped() {
        assert_eq!(
            clean_snippet("Skills&nbsp;matrix  &amp;\n training"),
            "Skills matrix & training"
        );
        assert_eq!(clean_snippet(&"x".repeat(4000)).len(), SNIPPET_CAP);
    }
}

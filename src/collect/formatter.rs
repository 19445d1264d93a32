// src/collect/formatter.rs
//! Phase 2: turn agent prose into `ArticleRecord`s through a second,
//! non-agentic completion call.

use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::collect::prompt::formatting_prompt;
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use crate::llm::{CompletionModel, LlmError};
use crate::record::ArticleRecord;
use crate::retry::Sleeper;

#[derive(Debug, Clone)]
pub struct FormatterSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub preview_length: usize,
}

impl FormatterSettings {
    pub fn from_config(cfg: &ResearchConfig) -> Self {
        Self {
            max_attempts: cfg.formatter.max_retries.max(1),
            retry_delay: cfg.formatter_retry_delay(),
            preview_length: cfg.formatter.preview_length,
        }
    }
}

/// Remove one leading/trailing markdown fence the model may add anyway.
pub fn strip_code_fences(s: &str) -> &str {
    let mut out = s.trim();
    if let Some(rest) = out.strip_prefix("```") {
        out = rest;
        if out.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            out = &out[4..];
        }
    }
    if let Some(rest) = out.strip_suffix("```") {
        out = rest;
    }
    out.trim()
}

/// Parse a JSON array of records. Elements that do not fit the schema are
/// dropped with a warning; the call fails only if nothing usable remains.
pub fn parse_records(text: &str) -> std::result::Result<Vec<ArticleRecord>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("malformed JSON: {e}"))?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(format!(
                "expected a JSON array, got {}",
                json_type_name(&other)
            ))
        }
    };
    if items.is_empty() {
        return Err("JSON array is empty".to_string());
    }

    let total = items.len();
    let mut records = Vec::with_capacity(total);
    for (idx, item) in items.into_iter().enumerate() {
        match ArticleRecord::deserialize(&item) {
            Ok(r) => records.push(r),
            Err(e) => {
                counter!("research_records_dropped_total", "reason" => "schema").increment(1);
                warn!(index = idx, error = %e, "dropping element that does not match the article schema");
            }
        }
    }
    if records.is_empty() {
        return Err(format!("none of {total} element(s) matched the article schema"));
    }
    Ok(records)
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct JsonFormatter<'a> {
    model: &'a dyn CompletionModel,
    sleeper: &'a dyn Sleeper,
    settings: FormatterSettings,
}

impl<'a> JsonFormatter<'a> {
    pub fn new(model: &'a dyn CompletionModel, sleeper: &'a dyn Sleeper, settings: FormatterSettings) -> Self {
        Self {
            model,
            sleeper,
            settings,
        }
    }

    pub async fn format(&self, raw_text: &str) -> Result<Vec<ArticleRecord>> {
        let s = &self.settings;
        let max = s.max_attempts.max(1);
        let prompt = formatting_prompt(raw_text);
        let mut last_failure: Option<ResearchError> = None;

        for attempt in 1..=max {
            if attempt > 1 {
                warn!(
                    wait_secs = s.retry_delay.as_secs_f64(),
                    attempt,
                    max_attempts = max,
                    "waiting before next formatting attempt"
                );
                self.sleeper.sleep(s.retry_delay).await;
            }

            info!(attempt, max_attempts = max, model = self.model.name(), "converting agent output to JSON");
            counter!("research_format_attempts_total").increment(1);

            let output = match self.model.complete(&prompt).await {
                Ok(text) => text,
                Err(LlmError::Quota(message)) => {
                    counter!("research_quota_hits_total").increment(1);
                    warn!(attempt, %message, "quota exceeded during formatting");
                    last_failure = Some(ResearchError::QuotaExceeded {
                        attempts: attempt,
                        message,
                    });
                    continue;
                }
                Err(e) => {
                    error!(attempt, error = ?e, "formatting call failed");
                    last_failure = Some(ResearchError::Transient {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let cleaned = strip_code_fences(&output);
            match parse_records(cleaned) {
                Ok(records) => {
                    info!(records = records.len(), attempt, "JSON conversion succeeded");
                    return Ok(records);
                }
                Err(reason) => {
                    let preview: String = cleaned.chars().take(s.preview_length).collect();
                    warn!(attempt, %reason, %preview, "formatter output rejected");
                    last_failure = Some(ResearchError::Format {
                        attempts: attempt,
                        reason,
                        preview,
                    });
                }
            }
        }

        let err = last_failure.unwrap_or_else(|| ResearchError::Format {
            attempts: max,
            reason: "no attempt was made".to_string(),
            preview: String::new(),
        });
        error!(error = %err, "JSON formatting exhausted its attempts");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```JSON [1]```"), "[1]");
        assert_eq!(strip_code_fences("```\n[]\n```  "), "[]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }

    #[test]
    fn non_list_and_empty_are_failures() {
        assert!(parse_records(r#"{"title": "x"}"#)
            .unwrap_err()
            .contains("got object"));
        assert_eq!(parse_records("[]").unwrap_err(), "JSON array is empty");
        assert!(parse_records("[{").unwrap_err().starts_with("malformed JSON"));
    }

    #[test]
    fn bad_elements_are_dropped_individually() {
        let text = r#"[
            {"title": "ok", "published_date": "2024-06-05", "confidence_score": 0.7},
            "not an object",
            {"title": "bad score", "confidence_score": "very"}
        ]"#;
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "ok");
    }

    #[test]
    fn all_bad_elements_fail_the_attempt() {
        let err = parse_records(r#"[1, 2]"#).unwrap_err();
        assert!(err.contains("none of 2"));
    }
}

// src/collect/invoker.rs
//! Phase 1 driver: runs the search agent until its output looks itemized.

use metrics::counter;
use tracing::{error, info, warn};

use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use crate::llm::{LlmError, SearchAgent};
use crate::retry::{Backoff, Sleeper};

#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub max_attempts: u32,
    pub recursion_limit: usize,
    /// Output must be strictly longer than this (chars).
    pub min_chars: usize,
    /// Last-attempt fallback: partial output strictly longer than this is kept.
    pub partial_min_chars: usize,
    pub markers: Vec<String>,
    pub backoff: Backoff,
    pub debug_preview: Option<usize>,
}

impl InvokerSettings {
    pub fn from_config(cfg: &ResearchConfig) -> Self {
        Self {
            max_attempts: cfg.agent.max_retries.max(1),
            recursion_limit: cfg.agent.recursion_limit,
            min_chars: cfg.agent.min_chars,
            partial_min_chars: cfg.agent.partial_min_chars,
            markers: cfg.agent.markers.clone(),
            backoff: Backoff::new(cfg.initial_delay(), cfg.min_delay()),
            debug_preview: cfg.debug.enabled.then_some(cfg.debug.preview_length),
        }
    }
}

/// Outcome of the structural check on one agent answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sufficiency {
    pub chars: usize,
    pub long_enough: bool,
    pub has_markers: bool,
}

impl Sufficiency {
    pub fn assess(text: &str, min_chars: usize, markers: &[String]) -> Self {
        let chars = text.chars().count();
        Self {
            chars,
            long_enough: chars > min_chars,
            has_markers: markers.iter().any(|m| text.contains(m.as_str())),
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.long_enough && self.has_markers
    }
}

pub struct AgentInvoker<'a> {
    agent: &'a dyn SearchAgent,
    sleeper: &'a dyn Sleeper,
    settings: InvokerSettings,
}

impl<'a> AgentInvoker<'a> {
    pub fn new(agent: &'a dyn SearchAgent, sleeper: &'a dyn Sleeper, settings: InvokerSettings) -> Self {
        Self {
            agent,
            sleeper,
            settings,
        }
    }

    /// Run the agent up to `max_attempts` times. Every retry waits
    /// `backoff.delay_after(n)` where `n` is the attempt that just failed.
    pub async fn invoke(&self, prompt: &str) -> Result<String> {
        let s = &self.settings;
        let max = s.max_attempts.max(1);

        for attempt in 1..=max {
            if attempt > 1 {
                let wait = s.backoff.delay_after(attempt - 1);
                warn!(
                    wait_secs = wait.as_secs_f64(),
                    attempt,
                    max_attempts = max,
                    "waiting before next agent attempt"
                );
                self.sleeper.sleep(wait).await;
            }

            info!(attempt, max_attempts = max, agent = self.agent.name(), "running search agent");
            counter!("research_agent_attempts_total").increment(1);

            let text = match self.agent.run(prompt, s.recursion_limit).await {
                Ok(resp) => resp.final_text().unwrap_or_default(),
                Err(LlmError::Quota(message)) => {
                    counter!("research_quota_hits_total").increment(1);
                    if attempt == max {
                        error!(attempt, %message, "quota still exhausted on final attempt");
                        return Err(ResearchError::QuotaExceeded {
                            attempts: max,
                            message,
                        });
                    }
                    warn!(attempt, %message, "quota exceeded, backing off");
                    continue;
                }
                Err(e) => {
                    error!(attempt, error = ?e, "agent call failed");
                    if attempt == max {
                        return Err(ResearchError::Transient {
                            attempts: max,
                            message: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            if let Some(n) = s.debug_preview {
                let preview: String = text.chars().take(n).collect();
                info!(chars = text.chars().count(), attempt, %preview, "agent output preview");
            }

            let verdict = Sufficiency::assess(&text, s.min_chars, &s.markers);
            if verdict.is_sufficient() {
                info!(chars = verdict.chars, attempt, "agent output accepted");
                return Ok(text);
            }

            warn!(
                attempt,
                chars = verdict.chars,
                min_chars = s.min_chars,
                long_enough = verdict.long_enough,
                has_markers = verdict.has_markers,
                "agent output insufficient"
            );

            if attempt == max {
                if verdict.chars > s.partial_min_chars {
                    warn!(chars = verdict.chars, "using partial agent output");
                    return Ok(text);
                }
                return Err(ResearchError::InsufficientOutput {
                    attempts: max,
                    chars: verdict.chars,
                });
            }
        }

        // max >= 1, so the loop always returns
        Err(ResearchError::InsufficientOutput {
            attempts: max,
            chars: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["Article".to_string(), "タイトル".to_string()]
    }

    #[test]
    fn needs_both_length_and_markers() {
        let long_plain = "x".repeat(900);
        let v = Sufficiency::assess(&long_plain, 800, &markers());
        assert!(v.long_enough && !v.has_markers && !v.is_sufficient());

        let short_marked = "Article 1";
        assert!(!Sufficiency::assess(short_marked, 800, &markers()).is_sufficient());

        let good = format!("タイトル: {}", "あ".repeat(800));
        assert!(Sufficiency::assess(&good, 800, &markers()).is_sufficient());
    }

    #[test]
    fn length_is_counted_in_chars_not_bytes() {
        let jp = "記".repeat(300);
        let v = Sufficiency::assess(&jp, 800, &markers());
        assert_eq!(v.chars, 300);
        assert!(!v.long_enough);
    }
}

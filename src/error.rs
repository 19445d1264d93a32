// src/error.rs
//! Failure taxonomy of a collection run.
//!
//! Retryable kinds are absorbed by the component that owns them; a variant
//! only reaches the binary once its attempt budget is exhausted.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(String),

    #[error("API quota exceeded after {attempts} attempt(s): {message}")]
    QuotaExceeded { attempts: u32, message: String },

    #[error("agent output insufficient after {attempts} attempt(s) ({chars} chars)")]
    InsufficientOutput { attempts: u32, chars: usize },

    #[error("JSON formatting failed after {attempts} attempt(s): {reason}; output preview: {preview}")]
    Format {
        attempts: u32,
        reason: String,
        preview: String,
    },

    #[error("no records left after filtering {candidates} candidate(s) to {start}..={end}")]
    EmptyAfterFilter {
        candidates: usize,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("LLM call failed after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    #[error("research data not found at {}", .0.display())]
    MissingResearchData(std::path::PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("persisting snapshot failed: {0}")]
    Persist(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResearchError {
    /// Operator-facing hint printed next to the fatal summary.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredentials(_) => {
                Some("set GOOGLE_API_KEY and TAVILY_API_KEY in the environment or .env")
            }
            Self::QuotaExceeded { .. } => Some(
                "wait for the quota window to reset and re-run, or move to a paid API tier",
            ),
            Self::MissingResearchData(_) => {
                Some("run skill-trend-collector first so the research data file exists")
            }
            Self::EmptyAfterFilter { .. } => {
                Some("no article inside the date window was found; try a wider search.days_back")
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResearchError>;

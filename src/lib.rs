// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod cli;
pub mod collect;
pub mod config;
pub mod dates;
pub mod error;
pub mod llm;
pub mod logging;
pub mod record;
pub mod report;
pub mod retry;
pub mod storage;
pub mod trends;

// ---- Re-exports for stable public API ----
pub use crate::collect::{Pipeline, ResearchWindow, RunOutcome};
pub use crate::config::{Credentials, ResearchConfig};
pub use crate::dates::DateNormalizer;
pub use crate::error::{ResearchError, Result};
pub use crate::record::{ArticleRecord, WeeklySnapshot};

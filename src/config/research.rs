// src/config/research.rs
//! Run configuration, loaded once from TOML and passed by reference.
//!
//! Every key is optional. Lookup order for the file:
//! 1) explicit path (CLI `--config`)
//! 2) $RESEARCH_CONFIG_PATH (must exist when set)
//! 3) config/research.toml
//! 4) built-in defaults

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ResearchError;

pub const DEFAULT_CONFIG_PATH: &str = "config/research.toml";
pub const ENV_CONFIG_PATH: &str = "RESEARCH_CONFIG_PATH";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_TAVILY_API_KEY: &str = "TAVILY_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub search: SearchSection,
    pub agent: AgentSection,
    pub formatter: FormatterSection,
    pub llm: LlmSection,
    pub tavily: TavilySection,
    pub data: DataSection,
    pub debug: DebugSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub days_back: u32,
    pub min_articles: u32,
    pub max_articles: u32,
    pub keywords: Vec<String>,
    pub summary_language: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            days_back: 7,
            min_articles: 3,
            max_articles: 5,
            keywords: vec![
                "skills management latest trends".to_string(),
                "talent management workforce news".to_string(),
            ],
            summary_language: "Japanese".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_retries: u32,
    /// Seconds; doubled per failed attempt.
    pub initial_delay: u64,
    /// Seconds; lower bound of every backoff wait.
    pub min_delay: u64,
    pub recursion_limit: usize,
    pub min_chars: usize,
    pub partial_min_chars: usize,
    pub markers: Vec<String>,
    /// Full search restarts allowed when the window filter empties a batch.
    pub pipeline_attempts: u32,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: 60,
            min_delay: 60,
            recursion_limit: 30,
            min_chars: 800,
            partial_min_chars: 200,
            markers: ["Article", "Title", "記事", "タイトル"]
                .map(String::from)
                .to_vec(),
            pipeline_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatterSection {
    pub max_retries: u32,
    /// Seconds between formatting attempts.
    pub retry_delay: u64,
    /// Seconds between the agent phase and the first formatting call.
    pub phase_gap: u64,
    pub preview_length: usize,
}

impl Default for FormatterSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: 60,
            phase_gap: 60,
            preview_length: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub api_base: String,
    pub timeout_secs: u64,
    pub searcher: ModelSection,
    pub formatter: ModelSection,
    /// Writes the weekly analysis report.
    pub analyst: ModelSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 120,
            searcher: ModelSection::default(),
            formatter: ModelSection::default(),
            analyst: ModelSection {
                temperature: 0.1,
                ..ModelSection::default()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub model: String,
    pub temperature: f32,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TavilySection {
    pub api_base: String,
    pub max_results: u32,
    pub search_depth: String,
    pub include_raw_content: bool,
}

impl Default for TavilySection {
    fn default() -> Self {
        Self {
            api_base: "https://api.tavily.com".to_string(),
            max_results: 5,
            search_depth: "advanced".to_string(),
            include_raw_content: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub research_data_path: PathBuf,
    pub weekly_data_dir: PathBuf,
    pub trends_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            research_data_path: PathBuf::from("reports/research_data.json"),
            weekly_data_dir: PathBuf::from("reports/weekly_data"),
            trends_dir: PathBuf::from("reports/trends"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    pub enabled: bool,
    pub preview_length: usize,
}

impl Default for DebugSection {
    fn default() -> Self {
        Self {
            enabled: false,
            preview_length: 500,
        }
    }
}

impl ResearchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ResearchConfig = toml::from_str(s).context("parsing research config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading research config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file per the lookup order in the module docs.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            info!(path = %default_path.display(), "loading research config");
            return Self::load_from(&default_path);
        }
        warn!("no research config found, using built-in defaults");
        Ok(Self::default())
    }

    /// Repair values that would make the retry loops degenerate.
    fn sanitize(&mut self) {
        self.agent.max_retries = self.agent.max_retries.max(1);
        self.agent.pipeline_attempts = self.agent.pipeline_attempts.max(1);
        self.formatter.max_retries = self.formatter.max_retries.max(1);
        if self.search.min_articles > self.search.max_articles {
            std::mem::swap(&mut self.search.min_articles, &mut self.search.max_articles);
        }
        if self.agent.partial_min_chars > self.agent.min_chars {
            self.agent.partial_min_chars = self.agent.min_chars;
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.agent.initial_delay)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.agent.min_delay)
    }

    pub fn formatter_retry_delay(&self) -> Duration {
        Duration::from_secs(self.formatter.retry_delay)
    }

    pub fn phase_gap(&self) -> Duration {
        Duration::from_secs(self.formatter.phase_gap)
    }
}

/// API keys read from the environment. Never logged.
#[derive(Clone)]
pub struct Credentials {
    pub google_api_key: String,
    pub tavily_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &"<redacted>")
            .field("tavily_api_key", &"<redacted>")
            .finish()
    }
}

/// A non-blank environment variable, or `MissingCredentials` naming it.
pub fn require_env(name: &str) -> Result<String, ResearchError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ResearchError::MissingCredentials(name.to_string()))
}

impl Credentials {
    pub fn from_env() -> Result<Self, ResearchError> {
        Ok(Self {
            google_api_key: require_env(ENV_GOOGLE_API_KEY)?,
            tavily_api_key: require_env(ENV_TAVILY_API_KEY)?,
        })
    }
}

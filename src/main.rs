//! Weekly skill-management news collector: binary entrypoint.
//! Runs one collection pass and exits non-zero on a fatal error.

use chrono::{Datelike, Local};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use skill_trend_collector::cli::{parse_target_year, Cli};
use skill_trend_collector::collect::{Pipeline, ResearchWindow};
use skill_trend_collector::config::{Credentials, ResearchConfig};
use skill_trend_collector::error::{ResearchError, Result};
use skill_trend_collector::llm::gemini::{GeminiAgent, GeminiClient};
use skill_trend_collector::llm::tavily::TavilySearch;
use skill_trend_collector::llm::{LlmError, WebSearch};
use skill_trend_collector::logging::init_tracing;
use skill_trend_collector::retry::TokioSleeper;

fn client_error(e: LlmError) -> ResearchError {
    ResearchError::Config(format!("building HTTP client: {e}"))
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = ResearchConfig::load(cli.config.as_deref())
        .map_err(|e| ResearchError::Config(format!("{e:#}")))?;
    let creds = Credentials::from_env()?;

    let today = Local::now().date_naive();
    let target_year = parse_target_year(cli.year.as_deref(), today.year());
    let window = ResearchWindow::ending_on(today, cfg.search.days_back);

    let search: Arc<dyn WebSearch> = Arc::new(
        TavilySearch::new(creds.tavily_api_key.clone(), &cfg.tavily)
            .map_err(client_error)?
            .with_start_date(window.start),
    );
    let searcher = GeminiClient::new(creds.google_api_key.clone(), &cfg.llm, &cfg.llm.searcher)
        .map_err(client_error)?;
    let agent = GeminiAgent::new(searcher, search);
    let formatter = GeminiClient::new(creds.google_api_key.clone(), &cfg.llm, &cfg.llm.formatter)
        .map_err(client_error)?;
    let sleeper = TokioSleeper;

    let outcome = Pipeline::new(&cfg, &agent, &formatter, &sleeper)
        .run(today, target_year)
        .await?;

    info!(
        articles = outcome.records.len(),
        search_passes = outcome.search_passes,
        research_data = %outcome.paths.research_data.display(),
        snapshot = %outcome.paths.snapshot.display(),
        "weekly collection finished"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "collection failed");
            eprintln!("error: {e}");
            if let Some(hint) = e.guidance() {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

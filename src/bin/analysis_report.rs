//! Turns the latest research data into the weekly Markdown report.

use chrono::{Datelike, Local};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use skill_trend_collector::cli::parse_target_year;
use skill_trend_collector::config::research::{require_env, ENV_GOOGLE_API_KEY};
use skill_trend_collector::config::ResearchConfig;
use skill_trend_collector::error::{ResearchError, Result};
use skill_trend_collector::llm::gemini::GeminiClient;
use skill_trend_collector::logging::init_tracing;
use skill_trend_collector::report::{load_research_data, ReportWriter};

#[derive(Debug, Parser)]
#[command(name = "analysis_report", about = "Write the weekly analysis report")]
struct Args {
    /// Report year (defaults to the current year)
    year: Option<String>,

    /// Path to the research TOML config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn run(args: Args) -> Result<()> {
    let cfg = ResearchConfig::load(args.config.as_deref())
        .map_err(|e| ResearchError::Config(format!("{e:#}")))?;
    let api_key = require_env(ENV_GOOGLE_API_KEY)?;

    let now = Local::now().naive_local();
    let year = parse_target_year(args.year.as_deref(), now.year());
    let records = load_research_data(&cfg.data.research_data_path)?;
    info!(records = records.len(), "research data loaded");

    let model = GeminiClient::new(api_key, &cfg.llm, &cfg.llm.analyst)
        .map_err(|e| ResearchError::Config(format!("building HTTP client: {e}")))?;
    ReportWriter::new(&model, &cfg).write(&records, year, now).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "report generation failed");
            eprintln!("error: {e}");
            if let Some(hint) = e.guidance() {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

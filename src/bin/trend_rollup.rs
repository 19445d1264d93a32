//! Rebuilds the dashboard trend files from every stored weekly snapshot.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use skill_trend_collector::config::ResearchConfig;
use skill_trend_collector::logging::init_tracing;
use skill_trend_collector::storage::load_snapshots;
use skill_trend_collector::trends::write_trends;

#[derive(Debug, Parser)]
#[command(name = "trend_rollup", about = "Aggregate weekly snapshots into trend series")]
struct Args {
    /// Path to the research TOML config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let cfg = match ResearchConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %format!("{e:#}"), "config load failed");
            return ExitCode::FAILURE;
        }
    };

    let snapshots = load_snapshots(&cfg.data.weekly_data_dir);
    if snapshots.is_empty() {
        warn!(dir = %cfg.data.weekly_data_dir.display(), "no weekly snapshots found; nothing to roll up");
        return ExitCode::SUCCESS;
    }

    match write_trends(&cfg.data.trends_dir, &snapshots) {
        Ok(report) => {
            info!(
                weeks = report.summary.len(),
                articles = report.total_articles(),
                "trend roll-up finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "writing trend files failed");
            ExitCode::FAILURE
        }
    }
}

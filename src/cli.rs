// src/cli.rs
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

/// Weekly web research on corporate skill-management news.
#[derive(Debug, Parser)]
#[command(name = "skill-trend-collector", version, about)]
pub struct Cli {
    /// Target year for the search prompt (defaults to the current year)
    pub year: Option<String>,

    /// Path to the research TOML config
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// A missing argument means `default`; a non-numeric one is logged and
/// ignored.
pub fn parse_target_year(arg: Option<&str>, default: i32) -> i32 {
    match arg.map(str::trim) {
        None | Some("") => default,
        Some(raw) => match raw.parse::<i32>() {
            Ok(y) if (1000..=9999).contains(&y) => y,
            _ => {
                warn!(arg = raw, fallback = default, "invalid year argument; using current year");
                default
            }
        },
    }
}

// src/collect/mod.rs
//! Weekly collection run: search agent → JSON formatter → date window →
//! snapshot on disk.
//!
//! Search and formatting retry inside their own budgets. A batch emptied by
//! the window filter restarts the run from search, bounded by
//! `agent.pipeline_attempts`.

pub mod formatter;
pub mod invoker;
pub mod prompt;
pub mod window;

use chrono::{Days, Local, NaiveDate};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::ResearchConfig;
use crate::dates::DateNormalizer;
use crate::error::{ResearchError, Result};
use crate::llm::{CompletionModel, SearchAgent};
use crate::record::{ArticleRecord, WeeklySnapshot};
use crate::retry::{Backoff, Sleeper};
use crate::storage::{persist_snapshot, PersistedPaths};

pub use formatter::{FormatterSettings, JsonFormatter};
pub use invoker::{AgentInvoker, InvokerSettings, Sufficiency};
pub use window::WindowFilter;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("research_agent_attempts_total", "Search agent sessions started.");
        describe_counter!(
            "research_quota_hits_total",
            "LLM or search calls rejected for quota."
        );
        describe_counter!(
            "research_format_attempts_total",
            "JSON formatting calls issued."
        );
        describe_counter!(
            "research_records_dropped_total",
            "Candidate records discarded, by reason."
        );
        describe_counter!(
            "research_pipeline_restarts_total",
            "Full restarts after the date window emptied a batch."
        );
        describe_counter!("research_snapshots_written_total", "Snapshots persisted.");
    });
}

/// Inclusive date range articles must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ResearchWindow {
    /// `[today - days_back, today]`; a look-back past the calendar's start
    /// clamps to the earliest representable date.
    pub fn ending_on(today: NaiveDate, days_back: u32) -> Self {
        Self {
            start: today
                .checked_sub_days(Days::new(u64::from(days_back)))
                .unwrap_or(NaiveDate::MIN),
            end: today,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Searching,
    Formatting,
    Filtering,
    Persisted,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<ArticleRecord>,
    pub paths: PersistedPaths,
    pub window: ResearchWindow,
    /// Full search passes used, including the successful one.
    pub search_passes: u32,
}

pub struct Pipeline<'a> {
    cfg: &'a ResearchConfig,
    agent: &'a dyn SearchAgent,
    formatter_model: &'a dyn CompletionModel,
    sleeper: &'a dyn Sleeper,
    normalizer: DateNormalizer,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a ResearchConfig,
        agent: &'a dyn SearchAgent,
        formatter_model: &'a dyn CompletionModel,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            cfg,
            agent,
            formatter_model,
            sleeper,
            normalizer: DateNormalizer::system(),
        }
    }

    /// Pin the clock used for relative dates (tests, replays).
    pub fn with_normalizer(mut self, normalizer: DateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub async fn run(&self, report_date: NaiveDate, target_year: i32) -> Result<RunOutcome> {
        ensure_metrics_described();

        let window = ResearchWindow::ending_on(report_date, self.cfg.search.days_back);
        let prompt = prompt::search_prompt(self.cfg, &window, target_year);
        let budget = self.cfg.agent.pipeline_attempts.max(1);

        info!(
            target_year,
            window_start = %window.start,
            window_end = %window.end,
            "starting weekly collection"
        );

        let invoker = AgentInvoker::new(
            self.agent,
            self.sleeper,
            InvokerSettings::from_config(self.cfg),
        );
        let formatter = JsonFormatter::new(
            self.formatter_model,
            self.sleeper,
            FormatterSettings::from_config(self.cfg),
        );
        let filter = WindowFilter::new(window.start, window.end, self.normalizer);
        let restart_backoff = Backoff::new(self.cfg.initial_delay(), self.cfg.min_delay());

        for pass in 1..=budget {
            log_stage(Stage::Searching, pass, budget);
            let raw = invoker.invoke(&prompt).await?;

            log_stage(Stage::Formatting, pass, budget);
            let gap = self.cfg.phase_gap();
            if !gap.is_zero() {
                info!(wait_secs = gap.as_secs(), "pausing for quota reset before formatting");
                self.sleeper.sleep(gap).await;
            }
            let candidates = formatter.format(&raw).await?;

            log_stage(Stage::Filtering, pass, budget);
            let records = match filter.apply(candidates) {
                Ok(r) => r,
                Err(e @ ResearchError::EmptyAfterFilter { .. }) if pass < budget => {
                    counter!("research_pipeline_restarts_total").increment(1);
                    let wait = restart_backoff.delay_after(pass);
                    warn!(
                        error = %e,
                        pass,
                        budget,
                        wait_secs = wait.as_secs_f64(),
                        "restarting search"
                    );
                    self.sleeper.sleep(wait).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let snapshot = WeeklySnapshot::new(
                records,
                report_date,
                (window.start, window.end),
                Some(target_year),
                Local::now().to_rfc3339(),
            );
            let paths = persist_snapshot(&self.cfg.data, &snapshot)?;
            counter!("research_snapshots_written_total").increment(1);
            log_stage(Stage::Persisted, pass, budget);

            return Ok(RunOutcome {
                records: snapshot.articles,
                paths,
                window,
                search_passes: pass,
            });
        }

        // budget >= 1 and the last pass never `continue`s
        Err(ResearchError::EmptyAfterFilter {
            candidates: 0,
            start: window.start,
            end: window.end,
        })
    }
}

fn log_stage(stage: Stage, pass: u32, budget: u32) {
    info!(stage = ?stage, pass, budget, "pipeline stage");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_spans_days_back_inclusive() {
        let w = ResearchWindow::ending_on(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), 7);
        assert_eq!(w.start, NaiveDate::from_ymd_opt(2024, 2, 24).unwrap());
        assert_eq!(w.end, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn huge_look_back_clamps_instead_of_overflowing() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let w = ResearchWindow::ending_on(today, u32::MAX);
        assert_eq!(w.start, NaiveDate::MIN);
        assert_eq!(w.end, today);
    }
}

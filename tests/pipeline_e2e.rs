// tests/pipeline_e2e.rs
// Full run against scripted agent/formatter, writing into a temp dir.

use chrono::NaiveDate;
use std::fs;
use std::time::Duration;

use skill_trend_collector::collect::{Pipeline, WindowFilter};
use skill_trend_collector::config::ResearchConfig;
use skill_trend_collector::dates::DateNormalizer;
use skill_trend_collector::error::ResearchError;
use skill_trend_collector::llm::mock::{ScriptedAgent, ScriptedCompletion};
use skill_trend_collector::record::{ArticleRecord, WeeklySnapshot};
use skill_trend_collector::retry::RecordingSleeper;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn report_date() -> NaiveDate {
    d(6, 7)
}

fn normalizer() -> DateNormalizer {
    DateNormalizer::fixed(report_date().and_hms_opt(9, 0, 0).unwrap())
}

fn test_config(dir: &std::path::Path) -> ResearchConfig {
    let mut cfg = ResearchConfig::default();
    cfg.search.days_back = 6;
    cfg.agent.initial_delay = 1;
    cfg.agent.min_delay = 0;
    cfg.formatter.retry_delay = 2;
    cfg.formatter.phase_gap = 0;
    cfg.data.research_data_path = dir.join("research_data.json");
    cfg.data.weekly_data_dir = dir.join("weekly");
    cfg.data.trends_dir = dir.join("trends");
    cfg
}

fn agent_text() -> String {
    let mut s = String::from("Article 1\nTitle: Skills-based hiring report\n");
    while s.chars().count() <= 900 {
        s.push_str("details about the article. ");
    }
    s
}

fn records_json(dates: &[&str]) -> String {
    let items: Vec<_> = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            serde_json::json!({
                "title": format!("article {i}"),
                "url": format!("https://example.com/{i}"),
                "published_date": date,
                "category": "product",
                "relevance_flag": "yes",
                "tags": ["skills"],
                "related_companies": ["Acme"],
                "confidence_score": 0.5,
            })
        })
        .collect();
    serde_json::to_string(&items).unwrap()
}

#[test]
fn window_filter_rejecting_everything_is_empty_after_filter() {
    let filter = WindowFilter::new(d(6, 1), d(6, 7), normalizer());
    let records: Vec<ArticleRecord> =
        serde_json::from_str(&records_json(&["2024-05-01", "2024-05-31", "2024-06-08", "2023-06-03", "不明"]))
            .unwrap();
    let err = filter.apply(records).unwrap_err();
    assert!(matches!(
        err,
        ResearchError::EmptyAfterFilter { candidates: 5, .. }
    ));
}

#[tokio::test]
async fn happy_path_writes_both_files() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let agent = ScriptedAgent::from_texts(vec![Ok(agent_text())]);
    let model = ScriptedCompletion::new(vec![Ok(records_json(&["2024-06-03", "3 days ago", "2024-04-01"]))]);
    let sleeper = RecordingSleeper::new();

    let outcome = Pipeline::new(&cfg, &agent, &model, &sleeper)
        .with_normalizer(normalizer())
        .run(report_date(), 2024)
        .await
        .unwrap();

    assert_eq!(outcome.search_passes, 1);
    assert_eq!(outcome.window.start, d(6, 1));
    let titles: Vec<_> = outcome.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["article 0", "article 1"]);
    assert!(sleeper.recorded().is_empty());

    let flat: Vec<ArticleRecord> =
        serde_json::from_str(&fs::read_to_string(&cfg.data.research_data_path).unwrap()).unwrap();
    assert_eq!(flat.len(), 2);

    let snap: WeeklySnapshot =
        serde_json::from_str(&fs::read_to_string(&outcome.paths.snapshot).unwrap()).unwrap();
    assert!(outcome.paths.snapshot.ends_with("weekly/2024-06-07.json"));
    assert_eq!(snap.metadata.article_count, 2);
    assert_eq!(snap.metadata.target_year, Some(2024));
    assert_eq!(snap.extracted_insights.relevance_count, 2);
}

#[tokio::test]
async fn empty_window_restarts_search_once() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let agent = ScriptedAgent::from_texts(vec![Ok(agent_text()), Ok(agent_text())]);
    let model = ScriptedCompletion::new(vec![
        Ok(records_json(&["2023-01-01"])),
        Ok(records_json(&["2024-06-06"])),
    ]);
    let sleeper = RecordingSleeper::new();

    let outcome = Pipeline::new(&cfg, &agent, &model, &sleeper)
        .with_normalizer(normalizer())
        .run(report_date(), 2024)
        .await
        .unwrap();
    assert_eq!(outcome.search_passes, 2);
    assert_eq!(agent.calls().len(), 2);
    assert_eq!(outcome.records.len(), 1);
    // one backoff wait before the second search pass
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn exhausted_restarts_write_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let agent = ScriptedAgent::from_texts(vec![Ok(agent_text()), Ok(agent_text())]);
    let model = ScriptedCompletion::new(vec![
        Ok(records_json(&["2023-01-01"])),
        Ok(records_json(&["n/a"])),
    ]);
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&cfg, &agent, &model, &sleeper)
        .with_normalizer(normalizer())
        .run(report_date(), 2024)
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::EmptyAfterFilter { .. }));
    assert!(!cfg.data.research_data_path.exists());
    assert!(!cfg.data.weekly_data_dir.exists());
}

#[tokio::test]
async fn formatter_failure_is_fatal_and_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let agent = ScriptedAgent::from_texts(vec![Ok(agent_text())]);
    let model = ScriptedCompletion::new(vec![Ok("nope".into()), Ok("nope".into()), Ok("nope".into())]);
    let sleeper = RecordingSleeper::new();

    let err = Pipeline::new(&cfg, &agent, &model, &sleeper)
        .with_normalizer(normalizer())
        .run(report_date(), 2024)
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Format { attempts: 3, .. }));
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_secs(2), Duration::from_secs(2)]
    );
    assert!(!cfg.data.research_data_path.exists());
}

#[tokio::test]
async fn phase_gap_waits_before_formatting() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = test_config(tmp.path());
    cfg.formatter.phase_gap = 60;
    let agent = ScriptedAgent::from_texts(vec![Ok(agent_text())]);
    let model = ScriptedCompletion::new(vec![Ok(records_json(&["2024-06-05"]))]);
    let sleeper = RecordingSleeper::new();

    Pipeline::new(&cfg, &agent, &model, &sleeper)
        .with_normalizer(normalizer())
        .run(report_date(), 2024)
        .await
        .unwrap();
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(60)]);
}

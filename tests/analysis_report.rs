// tests/analysis_report.rs
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;

use skill_trend_collector::config::ResearchConfig;
use skill_trend_collector::error::ResearchError;
use skill_trend_collector::llm::mock::ScriptedCompletion;
use skill_trend_collector::llm::LlmError;
use skill_trend_collector::record::ArticleRecord;
use skill_trend_collector::report::{load_research_data, ReportWriter, EMPTY_REPORT_BODY};

fn run_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 10)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn config(dir: &std::path::Path) -> ResearchConfig {
    let mut cfg = ResearchConfig::default();
    cfg.data.reports_dir = dir.join("reports");
    cfg.data.research_data_path = dir.join("research_data.json");
    cfg
}

fn records() -> Vec<ArticleRecord> {
    serde_json::from_value(serde_json::json!([
        {
            "title": "Siemens rolls out skills graph to plants",
            "url": "https://example.com/siemens",
            "published_date": "2024-06-05",
            "summary": "工場向けスキルグラフ",
            "confidence_score": 0.9
        },
        {
            "title": "Rumoured LMS merger",
            "url": "https://example.com/rumour",
            "published_date": "2024-06-06",
            "confidence_score": 0.3
        }
    ]))
    .unwrap()
}

#[tokio::test]
async fn report_embeds_records_and_writes_header() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let model = ScriptedCompletion::new(vec![Ok("## Executive Summary\nbody".into())]);

    let path = ReportWriter::new(&model, &cfg)
        .write(&records(), 2025, run_at())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(path, tmp.path().join("reports/週次レポート_2025_20240610.md"));
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("(2025年版)"));
    assert!(written.contains("**調査対象データ件数**: 2件"));
    assert!(written.contains("2024年06月10日 09:30:00"));
    assert!(written.ends_with("## Executive Summary\nbody"));

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Siemens rolls out skills graph to plants"));
    assert!(prompts[0].contains("工場向けスキルグラフ"));
    assert!(prompts[0].contains("below 0.5"));
    assert!(prompts[0].contains("Japanese"));
}

#[tokio::test]
async fn empty_data_makes_no_call_and_no_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let model = ScriptedCompletion::new(vec![]);

    let out = ReportWriter::new(&model, &cfg)
        .write(&[], 2024, run_at())
        .await
        .unwrap();
    assert!(out.is_none());
    assert!(model.prompts().is_empty());
    assert!(!cfg.data.reports_dir.exists());
}

#[tokio::test]
async fn blank_model_output_gets_placeholder_body() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let model = ScriptedCompletion::new(vec![Ok("   ".into())]);
    let path = ReportWriter::new(&model, &cfg)
        .write(&records(), 2024, run_at())
        .await
        .unwrap()
        .unwrap();
    assert!(fs::read_to_string(path).unwrap().ends_with(EMPTY_REPORT_BODY));
}

#[tokio::test]
async fn quota_is_fatal_and_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let model = ScriptedCompletion::new(vec![Err(LlmError::Quota("429".into()))]);
    let err = ReportWriter::new(&model, &cfg)
        .write(&records(), 2024, run_at())
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::QuotaExceeded { attempts: 1, .. }));
    assert!(!cfg.data.reports_dir.exists());
}

#[test]
fn research_data_loading() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());

    match load_research_data(&cfg.data.research_data_path) {
        Err(ResearchError::MissingResearchData(p)) => assert_eq!(p, cfg.data.research_data_path),
        other => panic!("unexpected: {other:?}"),
    }

    fs::write(&cfg.data.research_data_path, "[]").unwrap();
    assert!(load_research_data(&cfg.data.research_data_path).unwrap().is_empty());

    fs::write(
        &cfg.data.research_data_path,
        serde_json::to_string(&records()).unwrap(),
    )
    .unwrap();
    assert_eq!(load_research_data(&cfg.data.research_data_path).unwrap().len(), 2);
}

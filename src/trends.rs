// src/trends.rs
//! # Trend roll-up
//! Aggregates all weekly snapshots into zero-filled time series for the
//! dashboard. Pure grouping/counting; the only I/O is `write_trends`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::record::WeeklySnapshot;
use crate::storage::write_json_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
}

/// Label → series over every report date, in output order.
pub type TrendSeries = Vec<(String, Vec<TrendPoint>)>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub report_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub article_count: usize,
    pub relevance_count: usize,
    pub avg_confidence_score: f64,
    pub top_keywords: Vec<String>,
    pub top_companies: Vec<String>,
    pub execution_time: String,
}

fn report_dates(snapshots: &[WeeklySnapshot]) -> Vec<NaiveDate> {
    snapshots
        .iter()
        .map(|s| s.metadata.report_date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Count labels per report date, then zero-fill across all dates.
/// Labels keep first-seen order.
fn series_from<F>(snapshots: &[WeeklySnapshot], mut per_week: F) -> TrendSeries
where
    F: FnMut(&WeeklySnapshot) -> Vec<(String, usize)>,
{
    let dates = report_dates(snapshots);
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, HashMap<NaiveDate, usize>> = HashMap::new();

    for snap in snapshots {
        let date = snap.metadata.report_date;
        for (label, n) in per_week(snap) {
            let by_date = counts.entry(label.clone()).or_insert_with(|| {
                order.push(label.clone());
                HashMap::new()
            });
            *by_date.entry(date).or_insert(0) += n;
        }
    }

    order
        .into_iter()
        .map(|label| {
            let by_date = counts.remove(&label).unwrap_or_default();
            let points = dates
                .iter()
                .map(|d| TrendPoint {
                    date: *d,
                    count: by_date.get(d).copied().unwrap_or(0),
                })
                .collect();
            (label, points)
        })
        .collect()
}

fn sort_by_total_desc(mut series: TrendSeries) -> TrendSeries {
    // stable: equal totals keep first-seen order
    series.sort_by_key(|(_, pts)| std::cmp::Reverse(total(pts)));
    series
}

pub fn total(points: &[TrendPoint]) -> usize {
    points.iter().map(|p| p.count).sum()
}

fn tally<'a>(values: impl Iterator<Item = &'a String>) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = Vec::new();
    for v in values {
        let key = v.trim();
        if key.is_empty() {
            continue;
        }
        match out.iter_mut().find(|(k, _)| k == key) {
            Some((_, n)) => *n += 1,
            None => out.push((key.to_string(), 1)),
        }
    }
    out
}

pub fn keyword_trends(snapshots: &[WeeklySnapshot]) -> TrendSeries {
    sort_by_total_desc(series_from(snapshots, |s| {
        tally(s.articles.iter().flat_map(|a| a.tags.iter()))
    }))
}

pub fn company_trends(snapshots: &[WeeklySnapshot]) -> TrendSeries {
    sort_by_total_desc(series_from(snapshots, |s| {
        tally(s.articles.iter().flat_map(|a| a.related_companies.iter()))
    }))
}

pub fn category_trends(snapshots: &[WeeklySnapshot]) -> TrendSeries {
    series_from(snapshots, |s| {
        s.extracted_insights
            .category_distribution
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    })
}

pub fn weekly_summary(snapshots: &[WeeklySnapshot]) -> Vec<WeekSummary> {
    let mut rows: Vec<WeekSummary> = snapshots
        .iter()
        .map(|s| {
            let m = &s.metadata;
            let ins = &s.extracted_insights;
            WeekSummary {
                report_date: m.report_date,
                start_date: m.start_date,
                end_date: m.end_date,
                article_count: m.article_count,
                relevance_count: ins.relevance_count,
                avg_confidence_score: ins.avg_confidence_score,
                top_keywords: ins.top_keywords.iter().take(5).cloned().collect(),
                top_companies: ins.top_companies.iter().take(3).cloned().collect(),
                execution_time: m.execution_time.clone(),
            }
        })
        .collect();
    rows.sort_by_key(|r| r.report_date);
    rows
}

/// Ordered JSON object (`serde_json` is built with `preserve_order`).
pub fn series_to_json(series: &TrendSeries) -> Result<Value> {
    let mut map = Map::with_capacity(series.len());
    for (label, points) in series {
        map.insert(label.clone(), serde_json::to_value(points)?);
    }
    Ok(Value::Object(map))
}

#[derive(Debug, Clone)]
pub struct TrendReport {
    pub dir: PathBuf,
    pub keywords: TrendSeries,
    pub companies: TrendSeries,
    pub categories: TrendSeries,
    pub summary: Vec<WeekSummary>,
}

impl TrendReport {
    pub fn build(dir: &Path, snapshots: &[WeeklySnapshot]) -> Self {
        Self {
            dir: dir.to_path_buf(),
            keywords: keyword_trends(snapshots),
            companies: company_trends(snapshots),
            categories: category_trends(snapshots),
            summary: weekly_summary(snapshots),
        }
    }

    pub fn total_articles(&self) -> usize {
        self.summary.iter().map(|s| s.article_count).sum()
    }
}

/// Write keywords/companies/categories/summary JSON files into `dir`.
pub fn write_trends(dir: &Path, snapshots: &[WeeklySnapshot]) -> Result<TrendReport> {
    let report = TrendReport::build(dir, snapshots);
    write_json_atomic(&dir.join("keywords.json"), &series_to_json(&report.keywords)?)?;
    write_json_atomic(&dir.join("companies.json"), &series_to_json(&report.companies)?)?;
    write_json_atomic(&dir.join("categories.json"), &series_to_json(&report.categories)?)?;
    write_json_atomic(&dir.join("summary.json"), &report.summary)?;
    info!(
        dir = %dir.display(),
        weeks = report.summary.len(),
        keywords = report.keywords.len(),
        companies = report.companies.len(),
        categories = report.categories.len(),
        "trend files written"
    );
    Ok(report)
}

// src/record.rs
//! Persisted data model: one `ArticleRecord` per article, grouped per run
//! into an immutable `WeeklySnapshot`.
//!
//! Field names are the on-disk contract for the trend roll-up and the
//! dashboard; renaming any of them is a breaking change.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Tag set the prompts ask for. Membership is not enforced.
pub const CATEGORIES: &[&str] = &[
    "feature",
    "partnership",
    "case_study",
    "integration",
    "funding",
    "acquisition",
    "pricing",
    "regulation",
    "research",
    "dev_update",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    /// Kept exactly as emitted; parsed on demand by `DateNormalizer`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub published_date: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub related_companies: Vec<String>,
    #[serde(default, alias = "summary_japanese")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub key_points: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(
        default,
        alias = "manufacturing_relevance",
        deserialize_with = "lenient_string"
    )]
    pub relevance_flag: String,
    #[serde(default)]
    pub relevance_reason: String,
    /// Expected in 0.0..=1.0; not clamped.
    #[serde(default, deserialize_with = "lenient_score")]
    pub confidence_score: f64,
}

impl ArticleRecord {
    /// Reads the yes/no marker in any of the spellings the model uses.
    pub fn is_relevant(&self) -> bool {
        matches!(
            self.relevance_flag.trim().to_lowercase().as_str(),
            "yes" | "y" | "true" | "あり" | "有"
        )
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Unknown title"
        } else {
            &self.title
        }
    }
}

// The model is asked for strings/arrays/numbers but occasionally emits the
// neighbouring JSON type. These accept the obvious alternatives.

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Bool(true) => "yes".to_string(),
        serde_json::Value::Bool(false) => "no".to_string(),
        other => other.to_string(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|it| match it {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        serde_json::Value::String(s) => s
            .split([',', '/', '、'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        other => vec![other.to_string()],
    })
}

fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    use serde::de::Error;
    let v = serde_json::Value::deserialize(d)?;
    match v {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("confidence_score out of range")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("confidence_score not numeric: {s:?}"))),
        other => Err(D::Error::custom(format!(
            "confidence_score has unexpected type: {other}"
        ))),
    }
}

/// Run metadata stored next to the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub report_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub article_count: usize,
    #[serde(default)]
    pub target_year: Option<i32>,
    /// RFC 3339 timestamp of the write.
    #[serde(default)]
    pub execution_time: String,
}

/// Aggregates precomputed at write time for the roll-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInsights {
    #[serde(default)]
    pub category_distribution: BTreeMap<String, usize>,
    #[serde(default, alias = "manufacturing_related_count")]
    pub relevance_count: usize,
    #[serde(default)]
    pub avg_confidence_score: f64,
    #[serde(default)]
    pub top_keywords: Vec<String>,
    #[serde(default)]
    pub top_companies: Vec<String>,
}

impl ExtractedInsights {
    pub fn from_records(records: &[ArticleRecord]) -> Self {
        let mut category_distribution = BTreeMap::new();
        for r in records {
            let cat = if r.category.trim().is_empty() {
                "uncategorized".to_string()
            } else {
                r.category.trim().to_string()
            };
            *category_distribution.entry(cat).or_insert(0) += 1;
        }

        let avg_confidence_score = if records.is_empty() {
            0.0
        } else {
            let sum: f64 = records.iter().map(|r| r.confidence_score).sum();
            ((sum / records.len() as f64) * 100.0).round() / 100.0
        };

        Self {
            category_distribution,
            relevance_count: records.iter().filter(|r| r.is_relevant()).count(),
            avg_confidence_score,
            top_keywords: top_n(records.iter().flat_map(|r| r.tags.iter()), 10),
            top_companies: top_n(records.iter().flat_map(|r| r.related_companies.iter()), 10),
        }
    }
}

/// Most frequent values, ties broken by first appearance.
fn top_n<'a>(items: impl Iterator<Item = &'a String>, n: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for it in items {
        let key = it.trim();
        if key.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(k, _)| k == key) {
            Some((_, c)) => *c += 1,
            None => counts.push((key.to_string(), 1)),
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(n).map(|(k, _)| k).collect()
}

/// One run's output. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    pub metadata: SnapshotMetadata,
    pub articles: Vec<ArticleRecord>,
    #[serde(default)]
    pub extracted_insights: ExtractedInsights,
}

impl WeeklySnapshot {
    pub fn new(
        articles: Vec<ArticleRecord>,
        report_date: NaiveDate,
        window: (NaiveDate, NaiveDate),
        target_year: Option<i32>,
        execution_time: String,
    ) -> Self {
        let extracted_insights = ExtractedInsights::from_records(&articles);
        Self {
            metadata: SnapshotMetadata {
                report_date,
                start_date: window.0,
                end_date: window.1,
                article_count: articles.len(),
                target_year,
                execution_time,
            },
            articles,
            extracted_insights,
        }
    }
}

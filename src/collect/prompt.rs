// src/collect/prompt.rs
//! Prompt text for the two LLM phases.

use crate::collect::ResearchWindow;
use crate::config::ResearchConfig;
use crate::record::CATEGORIES;

/// Phase 1: itemized, labelled plain text. Labels double as the markers the
/// sufficiency check looks for.
pub fn search_prompt(cfg: &ResearchConfig, window: &ResearchWindow, year: i32) -> String {
    let s = &cfg.search;
    let keywords = s
        .keywords
        .iter()
        .map(|k| format!("   - \"{k}\""))
        .collect::<Vec<_>>()
        .join("\n");
    let start = window.start.format("%Y-%m-%d");
    let days = s.days_back;
    let (min, max) = (s.min_articles, s.max_articles);
    let lang = &s.summary_language;
    let categories = CATEGORIES.join("/");

    format!(
        r#"You are a research analyst. Work efficiently.

# Task
Collect {min}-{max} articles from Europe or North America about skills management and talent management for manufacturing, published in the last {days} days (on or after {start}), and extract their key facts.

# How to search
1. Pick the 3-5 most promising queries from this list, adding time filters such as "past week" or "{year}":
{keywords}
2. Prefer articles about manufacturing (industrial, plant, factory), named vendors or products, Industry 4.0, skill-gap analysis, and concrete case studies.
3. Keep the {min}-{max} most relevant articles.
4. Use only the search result snippets; do not fetch full pages.

# Output format
Write one block per article exactly like this:

---
Article 1
Title: [title]
URL: [url]
Source: [publisher]
Published: [YYYY-MM-DD, or "unknown"]
Region: [country/region]
Category: [{categories}]
Companies: [company names, or "none"]
Summary: [2-3 sentences in {lang}]
Key points: [point 1] / [point 2] / [point 3]
Tags: [tag1, tag2, tag3]
Manufacturing relevance: [yes/no]
Relevance reason: [one sentence, or "n/a"]
Confidence: [0.0-1.0]
---

# Constraints
- Only articles published on or after {start}. Skip older pieces, including forecasts written months ago.
- Run 3-5 searches, no more.
- {min}-{max} articles are enough; keep each block short.
"#
    )
}

/// Phase 2: coerce the agent's text into a bare JSON array.
pub fn formatting_prompt(raw_text: &str) -> String {
    format!(
        r#"The text below contains article information. Convert it into a JSON array.

Input text:
{raw_text}

Output: only a JSON array of this shape (no explanation, no code fences)

[
  {{
    "title": "article title",
    "url": "URL",
    "source": "publisher",
    "published_date": "YYYY-MM-DD",
    "region": "region",
    "category": "category",
    "related_companies": ["company"],
    "summary": "summary",
    "key_points": ["point 1", "point 2", "point 3"],
    "tags": ["tag1", "tag2"],
    "relevance_flag": "yes or no",
    "relevance_reason": "reason or n/a",
    "confidence_score": 0.0
  }}
]

Important: output the JSON array only. Nothing before or after it, no markdown.
"#
    )
}

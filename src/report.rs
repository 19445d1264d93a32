// src/report.rs
//! Weekly analysis report: one completion call over the stored research
//! data, saved as Markdown under `data.reports_dir`.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use crate::llm::{CompletionModel, LlmError};
use crate::record::ArticleRecord;
use crate::storage::write_text_atomic;

/// Articles below this confidence stay out of the detailed findings.
pub const MIN_FINDING_CONFIDENCE: f64 = 0.5;

/// Body written when the model returns no text.
pub const EMPTY_REPORT_BODY: &str = "（内容なし）";

/// Records from the latest collector run. A missing file is an error; an
/// empty array is not.
pub fn load_research_data(path: &Path) -> Result<Vec<ArticleRecord>> {
    let body = match fs::read_to_string(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ResearchError::MissingResearchData(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&body)?)
}

pub fn analysis_prompt(records_json: &str, language: &str) -> String {
    format!(
        r#"You are a principal consultant advising global manufacturers on HR strategy.
Using the JSON research data below, write a structured weekly report in Markdown that
executives and HR leaders can act on immediately. Focus on business implications and
competitive advantage, not on restating the data. Write the whole report in {language}.

# Input data (JSON)
---
{records_json}
---

# Report structure

## Executive Summary
- Top 3 insights: the three most strategically important signals and what they imply.
- Trends with their short- and mid-term opportunities and risks for manufacturers.
- 1-2 immediate actions HR should evaluate or start this week.

## Detailed Findings
One entry per article, faithful and concise. Leave out every article whose
confidence_score is below {MIN_FINDING_CONFIDENCE}.

### [n]. [title]
- **URL**: [url]
- **Source**: [publisher]
- **Published**: YYYY-MM-DD
- **Region**: [country]
- **Category**: [category]
- **Companies**: [company 1], [company 2]
- **Manufacturing relevance**: yes / no
- **Confidence**: 0.0-1.0

**Strategic summary**: 3-5 sentences including the impact on the industry and competitors.

**Key takeaways**:
- [technical or functional aspect]
- [competitive or market impact]
- [applicability and open questions]

**Tags**: `tag1` `tag2` `tag3`

**Manufacturing context**: [why it matters on the shop floor or in the supply chain, if it does]

---

## Strategic Trend Analysis
1. Main themes and how they will evolve over the next year.
2. Competitive landscape: where capital and innovation concentrate.
3. Maturity (emerging / growing / mature) of the main technology tags, with a short reason.

## Recommended Actions for Manufacturing
- Priority issues (skills transfer, multi-skilling, digital OJT) and how this week's trends help, ranked.
- Three concrete next steps.

## Source Index
Every URL used, as a bullet list.
"#
    )
}

pub fn report_header(year: i32, record_count: usize, generated_at: NaiveDateTime) -> String {
    format!(
        "# 週次レポート: スキルマネジメント・タレントマネジメント動向 ({year}年版)\n\
         **主席コンサルタントによる分析**\n\
         **調査対象データ件数**: {record_count}件\n\
         **生成日時**: {}\n\n---\n\n",
        generated_at.format("%Y年%m月%d日 %H:%M:%S")
    )
}

pub fn report_path(dir: &Path, year: i32, date: NaiveDate) -> PathBuf {
    dir.join(format!("週次レポート_{year}_{}.md", date.format("%Y%m%d")))
}

pub struct ReportWriter<'a> {
    model: &'a dyn CompletionModel,
    reports_dir: PathBuf,
    language: String,
}

impl<'a> ReportWriter<'a> {
    pub fn new(model: &'a dyn CompletionModel, cfg: &ResearchConfig) -> Self {
        Self {
            model,
            reports_dir: cfg.data.reports_dir.clone(),
            language: cfg.search.summary_language.clone(),
        }
    }

    /// Generate and save the report. `Ok(None)` when there is nothing to
    /// analyse; no model call is made and no file is written then.
    pub async fn write(
        &self,
        records: &[ArticleRecord],
        year: i32,
        now: NaiveDateTime,
    ) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            warn!("research data is empty; no report generated");
            return Ok(None);
        }

        let data = serde_json::to_string_pretty(records)?;
        let prompt = analysis_prompt(&data, &self.language);
        info!(records = records.len(), model = self.model.name(), "generating analysis report");

        let body = match self.model.complete(&prompt).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPORT_BODY.to_string(),
            Ok(text) => text,
            Err(LlmError::Quota(message)) => {
                error!(%message, "quota exceeded while generating report");
                return Err(ResearchError::QuotaExceeded {
                    attempts: 1,
                    message,
                });
            }
            Err(e) => {
                error!(error = ?e, "report generation failed");
                return Err(ResearchError::Transient {
                    attempts: 1,
                    message: e.to_string(),
                });
            }
        };

        let path = report_path(&self.reports_dir, year, now.date());
        let contents = report_header(year, records.len(), now) + &body;
        write_text_atomic(&path, &contents)?;
        info!(path = %path.display(), chars = contents.chars().count(), "report saved");
        Ok(Some(path))
    }
}

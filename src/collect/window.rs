// src/collect/window.rs
//! Keeps only records whose publication date falls inside the run window.

use chrono::NaiveDate;
use metrics::counter;
use tracing::{info, warn};

use crate::dates::DateNormalizer;
use crate::error::{ResearchError, Result};
use crate::record::ArticleRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    normalizer: DateNormalizer,
}

impl WindowFilter {
    pub fn new(start: NaiveDate, end: NaiveDate, normalizer: DateNormalizer) -> Self {
        Self {
            start,
            end,
            normalizer,
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Drop unparseable and out-of-window records, each with a warning.
    /// An empty result is an error, not an empty list.
    pub fn apply(&self, records: Vec<ArticleRecord>) -> Result<Vec<ArticleRecord>> {
        let candidates = records.len();
        let mut kept = Vec::with_capacity(candidates);

        for record in records {
            let Some(date) = self.normalizer.normalize(&record.published_date) else {
                counter!("research_records_dropped_total", "reason" => "unparseable").increment(1);
                warn!(
                    title = record.display_title(),
                    published_date = %record.published_date,
                    "skipping article with unparsed date"
                );
                continue;
            };

            if !self.contains(date) {
                counter!("research_records_dropped_total", "reason" => "out_of_window").increment(1);
                warn!(
                    title = record.display_title(),
                    published_date = %record.published_date,
                    normalized = %date,
                    window_start = %self.start,
                    window_end = %self.end,
                    "skipping article outside window"
                );
                continue;
            }

            kept.push(record);
        }

        if kept.is_empty() {
            warn!(
                candidates,
                window_start = %self.start,
                window_end = %self.end,
                "no article survived the date window"
            );
            return Err(ResearchError::EmptyAfterFilter {
                candidates,
                start: self.start,
                end: self.end,
            });
        }

        if kept.len() != candidates {
            info!(kept = kept.len(), candidates, "date window filter dropped articles");
        }
        Ok(kept)
    }
}

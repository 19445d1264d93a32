// src/dates.rs
//! Publication-date normalization.
//!
//! LLM output carries dates in whatever shape the source article used. This
//! module maps such strings to a calendar date or `None` (unparseable). The
//! pipeline is an ordered fallback chain: sentinels, relative expressions,
//! Japanese dates, compact `YYYYMMDD`, a fixed list of calendar patterns,
//! ISO-8601 and finally RFC 2822. First successful parse wins.
//!
//! Known limitation: bare numeric slash/dash dates are ambiguous. `%m/%d/%Y`
//! precedes `%d/%m/%Y`, so "01/02/2024" is always January 2nd.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use time::format_description::well_known::Rfc2822;
use time::{OffsetDateTime, UtcOffset};

/// Calendar patterns tried in order after the special cases.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
];

/// ISO-8601 shapes accepted once the calendar patterns fail.
const ISO_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];
const ISO_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const ENGLISH_SENTINELS: &[&str] = &["", "n/a", "na", "unknown"];
const JAPANESE_SENTINELS: &[&str] = &["不明", "未設定", "不詳", "―"];
const YESTERDAY: &[&str] = &["yesterday", "昨日"];
const TODAY: &[&str] = &["today", "本日", "きょう", "今日"];

fn re_relative() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})\s+(day|days|hour|hours|week|weeks)\s+ago$").unwrap()
    })
}

fn re_japanese() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})年(\d{1,2})月(\d{1,2})日$").unwrap())
}

fn re_compact() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\d{8}$").unwrap())
}

fn re_ordinal() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)(st|nd|rd|th)").unwrap())
}

fn re_year_month() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})$").unwrap())
}

fn re_iso_hour_only() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}$").unwrap())
}

fn re_year() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})$").unwrap())
}

/// Source of "now" for relative expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Local wall clock, read on every call.
    System,
    /// Pinned moment, for tests and replays.
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// Pure string → date normalizer. Relative expressions resolve against the
/// clock at call time, not against when a record arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateNormalizer {
    clock: Clock,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::system()
    }
}

impl DateNormalizer {
    pub fn system() -> Self {
        Self {
            clock: Clock::System,
        }
    }

    pub fn fixed(now: NaiveDateTime) -> Self {
        Self {
            clock: Clock::Fixed(now),
        }
    }

    /// Parse `raw` into a calendar date, or `None` when nothing matches.
    pub fn normalize(&self, raw: &str) -> Option<NaiveDate> {
        let normalized = raw.trim();
        let lowered = normalized.to_lowercase();

        if ENGLISH_SENTINELS.contains(&lowered.as_str())
            || JAPANESE_SENTINELS.contains(&normalized)
            || normalized.contains('\u{FFFD}')
        {
            return None;
        }

        if let Some(caps) = re_relative().captures(&lowered) {
            let amount: i64 = caps[1].parse().ok()?;
            let now = self.clock.now();
            let unit = &caps[2];
            let back = if unit.starts_with("day") {
                Duration::days(amount)
            } else if unit.starts_with("hour") {
                Duration::hours(amount)
            } else {
                Duration::weeks(amount)
            };
            return Some((now - back).date());
        }

        if YESTERDAY.contains(&lowered.as_str()) {
            return Some((self.clock.now() - Duration::days(1)).date());
        }
        if TODAY.contains(&lowered.as_str()) {
            return Some(self.clock.now().date());
        }

        if let Some(caps) = re_japanese().captures(normalized) {
            // An impossible calendar date here is final: no other pattern
            // could match a string containing 年/月/日.
            return ymd(&caps[1], &caps[2], &caps[3]);
        }

        if re_compact().is_match(normalized) {
            if let Some(d) = ymd(&normalized[0..4], &normalized[4..6], &normalized[6..8]) {
                return Some(d);
            }
        }

        let no_suffix = re_ordinal().replace_all(normalized, "$1");

        if let Some(d) = parse_calendar(&no_suffix) {
            return Some(d);
        }

        if let Some(d) = parse_iso(normalized) {
            return Some(d);
        }

        parse_rfc2822(&no_suffix)
    }
}

/// Canonical display form; `normalize(normalize_display(d)) == d`.
pub fn normalize_display(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// chrono's `%Y` takes any digit count; only four-digit years count here,
/// so "01/02/24" stays unparseable instead of landing in year 1.
fn four_digit_year(d: NaiveDate) -> Option<NaiveDate> {
    (1000..=9999).contains(&d.year()).then_some(d)
}

fn parse_calendar(s: &str) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Some(d) = NaiveDate::parse_from_str(s, fmt).ok().and_then(four_digit_year) {
            return Some(d);
        }
    }
    // Partial dates pin to the first day of the period.
    if let Some(caps) = re_year_month().captures(s) {
        return ymd(&caps[1], &caps[2], "1");
    }
    if let Some(caps) = re_year().captures(s) {
        return ymd(&caps[1], "1", "1");
    }
    None
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    let mut candidate = match s.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => s.to_string(),
    };
    // hour-only time ("2024-06-05T10"); chrono needs minutes
    if re_iso_hour_only().is_match(&candidate) {
        candidate.push_str(":00");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&candidate) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return four_digit_year(dt.with_timezone(&Utc).date_naive());
        }
    }
    for fmt in ISO_NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return four_digit_year(dt.date());
        }
    }
    None
}

fn parse_rfc2822(s: &str) -> Option<NaiveDate> {
    let dt = OffsetDateTime::parse(s, &Rfc2822)
        .ok()?
        .to_offset(UtcOffset::UTC);
    NaiveDate::from_ymd_opt(dt.year(), u8::from(dt.month()) as u32, dt.day() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateNormalizer {
        DateNormalizer::fixed(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sentinels_are_unparseable() {
        let n = at(2024, 6, 10);
        for s in ["", "  ", "N/A", "na", "Unknown", "不明", "未設定", "不詳", "―", "2024-\u{FFFD}"] {
            assert_eq!(n.normalize(s), None, "{s:?}");
        }
    }

    #[test]
    fn relative_expressions_follow_the_clock() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("3 days ago"), Some(date(2024, 6, 7)));
        assert_eq!(n.normalize("1 day ago"), Some(date(2024, 6, 9)));
        assert_eq!(n.normalize("2 weeks ago"), Some(date(2024, 5, 27)));
        assert_eq!(n.normalize("13 hours ago"), Some(date(2024, 6, 9)));
        assert_eq!(n.normalize("5 hours ago"), Some(date(2024, 6, 10)));
        assert_eq!(n.normalize("Yesterday"), Some(date(2024, 6, 9)));
        assert_eq!(n.normalize("today"), Some(date(2024, 6, 10)));
        assert_eq!(n.normalize("昨日"), Some(date(2024, 6, 9)));
        assert_eq!(n.normalize("本日"), Some(date(2024, 6, 10)));
    }

    #[test]
    fn three_digit_relative_amounts_are_not_relative() {
        assert_eq!(at(2024, 6, 10).normalize("100 days ago"), None);
    }

    #[test]
    fn japanese_and_compact_dates() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("2024年5月20日"), Some(date(2024, 5, 20)));
        assert_eq!(n.normalize("2024年13月20日"), None);
        assert_eq!(n.normalize("20240520"), Some(date(2024, 5, 20)));
    }

    #[test]
    fn calendar_patterns_in_order() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("2024/05/20"), Some(date(2024, 5, 20)));
        assert_eq!(n.normalize("2024.05.20"), Some(date(2024, 5, 20)));
        assert_eq!(n.normalize("20 May 2024"), Some(date(2024, 5, 20)));
        assert_eq!(n.normalize("May 5th, 2024"), Some(date(2024, 5, 5)));
        assert_eq!(n.normalize("June 3rd 2024"), Some(date(2024, 6, 3)));
        assert_eq!(n.normalize("21st June 2024"), Some(date(2024, 6, 21)));
        assert_eq!(n.normalize("05-20-2024"), Some(date(2024, 5, 20)));
        // day > 12 only fits the day-first pattern
        assert_eq!(n.normalize("20/05/2024"), Some(date(2024, 5, 20)));
    }

    #[test]
    fn ambiguous_slash_dates_resolve_month_first() {
        assert_eq!(at(2024, 6, 10).normalize("01/02/2024"), Some(date(2024, 1, 2)));
    }

    #[test]
    fn partial_dates_pin_to_period_start() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("2024-05"), Some(date(2024, 5, 1)));
        assert_eq!(n.normalize("2024/5"), Some(date(2024, 5, 1)));
        assert_eq!(n.normalize("2024"), Some(date(2024, 1, 1)));
    }

    #[test]
    fn iso_with_zone_is_converted_to_utc() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("2024-05-20T10:00:00Z"), Some(date(2024, 5, 20)));
        assert_eq!(
            n.normalize("2024-05-20T01:30:00+09:00"),
            Some(date(2024, 5, 19))
        );
        assert_eq!(n.normalize("2024-05-20T23:59:59"), Some(date(2024, 5, 20)));
    }

    #[test]
    fn rfc2822_is_the_last_resort() {
        let n = at(2024, 6, 10);
        assert_eq!(
            n.normalize("Mon, 20 May 2024 23:30:00 -0500"),
            Some(date(2024, 5, 21))
        );
    }

    #[test]
    fn two_digit_years_are_unparseable() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("01/02/24"), None);
        assert_eq!(n.normalize("12/06/24"), None);
        assert_eq!(n.normalize("24-06-05"), None);
        assert_eq!(n.normalize("5 Jun 24"), None);
    }

    #[test]
    fn hour_only_iso_time_is_accepted() {
        assert_eq!(at(2024, 6, 10).normalize("2024-06-05T10"), Some(date(2024, 6, 5)));
    }

    #[test]
    fn garbage_is_unparseable() {
        let n = at(2024, 6, 10);
        assert_eq!(n.normalize("sometime last spring"), None);
        assert_eq!(n.normalize("2024-02-30"), None);
    }

    #[test]
    fn display_round_trips() {
        let n = at(2024, 6, 10);
        for d in [date(2024, 2, 29), date(1999, 12, 31), date(2030, 1, 1)] {
            assert_eq!(n.normalize(&normalize_display(d)), Some(d));
        }
    }
}

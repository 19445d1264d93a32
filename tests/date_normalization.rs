// tests/date_normalization.rs
use chrono::{NaiveDate, NaiveDateTime};
use skill_trend_collector::dates::{normalize_display, DateNormalizer};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn relative_expressions_use_the_clock() {
    let n = DateNormalizer::fixed(at(2024, 6, 10, 12));
    assert_eq!(n.normalize("3 days ago"), Some(date(2024, 6, 7)));
    assert_eq!(n.normalize("  1 Week ago "), Some(date(2024, 6, 3)));
    assert_eq!(n.normalize("yesterday"), Some(date(2024, 6, 9)));
    assert_eq!(n.normalize("本日"), Some(date(2024, 6, 10)));
    // crossing midnight
    assert_eq!(n.normalize("13 hours ago"), Some(date(2024, 6, 9)));
}

#[test]
fn common_publication_formats() {
    let n = DateNormalizer::fixed(at(2024, 6, 10, 12));
    let cases = [
        ("2024年6月5日", date(2024, 6, 5)),
        ("20240605", date(2024, 6, 5)),
        ("2024/06/05", date(2024, 6, 5)),
        ("June 5th, 2024", date(2024, 6, 5)),
        ("5 Jun 2024", date(2024, 6, 5)),
        ("06/05/2024", date(2024, 6, 5)),
        ("2024-06", date(2024, 6, 1)),
        ("2024", date(2024, 1, 1)),
        ("2024-06-05T23:30:00Z", date(2024, 6, 5)),
        ("2024-06-05T10:00:00+09:00", date(2024, 6, 5)),
        ("Wed, 05 Jun 2024 08:00:00 +0000", date(2024, 6, 5)),
    ];
    for (raw, want) in cases {
        assert_eq!(n.normalize(raw), Some(want), "input {raw:?}");
    }
}

#[test]
fn sentinels_and_garbage_are_none() {
    let n = DateNormalizer::fixed(at(2024, 6, 10, 12));
    for raw in [
        "",
        "N/A",
        "unknown",
        "不明",
        "2024年2月30日",
        "soon",
        "bad\u{FFFD}date",
        "01/02/24",
        "12/06/24",
    ] {
        assert_eq!(n.normalize(raw), None, "input {raw:?}");
    }
}

#[test]
fn display_form_round_trips() {
    let n = DateNormalizer::fixed(at(2024, 6, 10, 12));
    for d in [date(2024, 2, 29), date(1999, 12, 31), date(2024, 6, 10)] {
        assert_eq!(n.normalize(&normalize_display(d)), Some(d));
    }
}

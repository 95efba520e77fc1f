//! Date parser tests — totality and format coverage.

use chrono::{Datelike, Timelike};
use painel_core::dates::{
    month_sort_key, parse_date, parse_month_year, DEFAULT_TZ_OFFSET_MINUTES,
};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn parse(value: serde_json::Value) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    parse_date(&value, DEFAULT_TZ_OFFSET_MINUTES)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// parse_date is total: every JSON value yields Some or None, never a panic.
#[test]
fn parser_is_total_over_junk_input() {
    let junk = vec![
        json!(null),
        json!(""),
        json!("0"),
        json!("-"),
        json!("not a date"),
        json!("99/99/9999"),
        json!("2024-13-45"),
        json!(-5),
        json!(0),
        json!(0.5),
        json!(true),
        json!([1, 2, 3]),
        json!({"nested": "object"}),
        json!(f64::NAN),
    ];
    for value in junk {
        assert_eq!(parse(value.clone()), None, "expected None for {value}");
    }
}

/// ISO datetimes are panel UTC and get shifted into the -03:00 offset.
#[test]
fn iso_datetime_is_utc_shifted_into_offset() {
    let dt = parse(json!("2024-03-05 21:14:00")).expect("ISO datetime parses");
    assert_eq!(dt.hour(), 18, "21:14 UTC is 18:14 in -03:00");
    assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));

    let with_t = parse(json!("2024-03-05T21:14:00")).expect("T separator parses");
    assert_eq!(with_t, dt);
}

/// Brazilian DD/MM/YYYY strings are wall clock: no shift applied.
#[test]
fn brazilian_datetime_is_wall_clock() {
    let dt = parse(json!("05/03/2024 21:14")).expect("BR datetime parses");
    assert_eq!(dt.hour(), 21);
    assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));

    let date_only = parse(json!("05/03/2024")).expect("BR date parses");
    assert_eq!(date_only.hour(), 0);
}

/// Spreadsheet serials count days from 1899-12-30; fractions carry time.
#[test]
fn spreadsheet_serial_days_parse() {
    let dt = parse(json!(45357)).expect("whole serial parses");
    assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 6));

    let with_time = parse(json!(45357.5)).expect("fractional serial parses");
    assert_eq!(with_time.hour(), 12);
}

/// RFC 3339 strings with an explicit zone go through the fallback parse.
#[test]
fn rfc3339_fallback_parses() {
    let dt = parse(json!("2024-03-05T21:14:00Z")).expect("rfc3339 parses");
    assert_eq!(dt.hour(), 18, "Z suffix means UTC, shifted into -03:00");
}

/// Pre-1970 values are epoch placeholders, not data.
#[test]
fn pre_epoch_dates_are_rejected() {
    assert_eq!(parse(json!("01/01/1969")), None);
    assert_eq!(parse(json!(400)), None, "serial 400 lands in 1901");
}

/// Month labels sort chronologically through the month table, never
/// lexicographically.
#[test]
fn month_labels_sort_chronologically() {
    let mut labels = vec!["mar/24", "jan/24", "dez/23"];
    labels.sort_by_key(|l| month_sort_key(l));
    assert_eq!(labels, vec!["dez/23", "jan/24", "mar/24"]);
}

/// Dotted and mixed-case labels still resolve.
#[test]
fn month_label_parse_tolerates_display_variants() {
    assert_eq!(parse_month_year("mar./24"), Some((2024, 3)));
    assert_eq!(parse_month_year("Dez/23"), Some((2023, 12)));
    assert_eq!(parse_month_year("unknown"), None);
}

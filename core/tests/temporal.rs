//! Temporal aggregator tests — bucketing and deterministic argmax.

use chrono::TimeZone;
use painel_core::{
    config::EngineConfig,
    dates::offset_from_minutes,
    record::RawRecord,
    temporal::{best_shift, best_weekday, TemporalAggregator},
};
use serde_json::{json, Value};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn record(fields: Value) -> RawRecord {
    match fields {
        Value::Object(map) => RawRecord(map),
        _ => panic!("test records must be JSON objects"),
    }
}

fn now_local(config: &EngineConfig) -> chrono::DateTime<chrono::FixedOffset> {
    offset_from_minutes(config.tz_offset_minutes)
        .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Weekday, shift and month buckets all increment off one parsed date.
#[test]
fn buckets_weekday_shift_and_month() {
    let config = EngineConfig::default();
    let aggregator = TemporalAggregator::new(&config);
    let now = now_local(&config);

    // 04/03/2024 is a Monday; 21:30 wall clock is the night shift.
    let records = vec![
        record(json!({"Data": "04/03/2024 21:30"})),
        record(json!({"Data": "04/03/2024 08:00"})),
        record(json!({"data": "05/03/2024 14:00"})),
    ];

    let breakdown = aggregator.aggregate(&records, &config.aliases.event_date, &now);

    assert_eq!(breakdown.by_weekday.get("segunda-feira"), Some(&2));
    assert_eq!(breakdown.by_weekday.get("terça-feira"), Some(&1));
    assert_eq!(breakdown.by_shift.get("noite"), Some(&1));
    assert_eq!(breakdown.by_shift.get("manhã"), Some(&1));
    assert_eq!(breakdown.by_shift.get("tarde"), Some(&1));
    assert_eq!(breakdown.by_month.len(), 1);
    assert_eq!(breakdown.by_month[0].month, "mar/24");
    assert_eq!(breakdown.by_month[0].count, 3);
}

/// Records with unparsable dates skip every temporal bucket but are
/// not an error.
#[test]
fn unparsable_dates_skip_buckets() {
    let config = EngineConfig::default();
    let aggregator = TemporalAggregator::new(&config);
    let now = now_local(&config);

    let records = vec![
        record(json!({"Data": "-"})),
        record(json!({"Data": "garbage"})),
        record(json!({"other_key": "04/03/2024"})),
    ];

    let breakdown = aggregator.aggregate(&records, &config.aliases.event_date, &now);
    assert!(breakdown.by_weekday.is_empty());
    assert!(breakdown.by_shift.is_empty());
    assert!(breakdown.by_month.is_empty());
}

/// The month series is windowed: nothing from the future, nothing
/// older than the previous calendar year, chronologically ordered.
#[test]
fn month_series_is_windowed_and_sorted() {
    let config = EngineConfig::default();
    let aggregator = TemporalAggregator::new(&config);
    let now = now_local(&config); // 2024-06-15

    let records = vec![
        record(json!({"Data": "10/03/2024"})),
        record(json!({"Data": "10/12/2023"})),
        record(json!({"Data": "10/01/2024"})),
        record(json!({"Data": "10/05/2022"})), // too old
        record(json!({"Data": "10/12/2024"})), // future
    ];

    let breakdown = aggregator.aggregate(&records, &config.aliases.event_date, &now);
    let labels: Vec<&str> = breakdown.by_month.iter().map(|m| m.month.as_str()).collect();
    assert_eq!(labels, vec!["dez/23", "jan/24", "mar/24"]);
}

/// Argmax ties resolve by calendar order, not map iteration order.
#[test]
fn best_bucket_tie_break_is_calendar_order() {
    let config = EngineConfig::default();
    let aggregator = TemporalAggregator::new(&config);
    let now = now_local(&config);

    // One Sunday conversion, one Monday conversion: a tie.
    let records = vec![
        record(json!({"Data": "04/03/2024 10:00"})), // Monday
        record(json!({"Data": "03/03/2024 22:00"})), // Sunday
    ];

    let breakdown = aggregator.aggregate(&records, &config.aliases.event_date, &now);

    let (day, count) = best_weekday(&breakdown.by_weekday).expect("a best day exists");
    assert_eq!(day, "domingo", "Sunday precedes Monday in calendar order");
    assert_eq!(count, 1);

    let (shift, _) = best_shift(&breakdown.by_shift).expect("a best shift exists");
    assert_eq!(shift, "manhã", "morning precedes night in band order");
}

/// Empty bucket maps have no best bucket.
#[test]
fn empty_buckets_have_no_argmax() {
    assert_eq!(best_weekday(&Default::default()), None);
    assert_eq!(best_shift(&Default::default()), None);
}

/// The heatmap always emits the full 7×24 grid.
#[test]
fn heatmap_emits_full_grid() {
    let config = EngineConfig::default();
    let aggregator = TemporalAggregator::new(&config);

    let records = vec![record(json!({"Data": "04/03/2024 21:30"}))];
    let grid = aggregator.heatmap(&records, &config.aliases.event_date);

    assert_eq!(grid.len(), 7 * 24);
    let hit = grid
        .iter()
        .find(|c| c.weekday == "segunda-feira" && c.hour == 21)
        .expect("cell exists");
    assert_eq!(hit.count, 1);
    let total: u64 = grid.iter().map(|c| c.count).sum();
    assert_eq!(total, 1);
}

//! Total date parsing over the formats panel exports actually contain.
//!
//! The same export mixes ISO strings (`2024-03-05 21:14:00`), Brazilian
//! wall-clock strings (`05/03/2024 21:14`), and spreadsheet serial day
//! counts, sometimes in the same column. parse_date tries each in a
//! fixed order and returns None on anything it cannot read — a bad cell
//! drops one record from one bucket, it never aborts an aggregation.
//!
//! Calendar vocabulary (weekday names, shift bands, `mmm/yy` labels and
//! their chronological ordering) also lives here.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use serde_json::Value;

/// America/Sao_Paulo, the timezone the panel reports in.
pub const DEFAULT_TZ_OFFSET_MINUTES: i32 = -180;

/// Weekday names in `Date::getDay()` order (Sunday first), as the
/// dashboard displays them.
pub const WEEKDAYS: [&str; 7] = [
    "domingo",
    "segunda-feira",
    "terça-feira",
    "quarta-feira",
    "quinta-feira",
    "sexta-feira",
    "sábado",
];

/// Time-of-day bands, boundaries at local hours 0/6/12/18/24.
pub const SHIFTS: [&str; 4] = ["madrugada", "manhã", "tarde", "noite"];

/// Month abbreviations for `mmm/yy` labels. Label ordering is resolved
/// through this table, never lexicographically.
pub const MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Spreadsheet serial epoch: day 1 is 1899-12-31.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Build the fixed offset for a minute count, falling back to UTC on an
/// out-of-range value rather than failing the whole aggregation.
pub fn offset_from_minutes(tz_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(tz_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("UTC offset is always valid"))
}

/// Total parse: JSON number (spreadsheet serial), JSON string (ISO,
/// Brazilian, RFC 3339), anything else → None. Never panics.
///
/// String order matters: ISO datetimes are panel UTC timestamps and get
/// shifted into the offset; `DD/MM/YYYY` strings are already wall clock
/// and are taken as-is.
pub fn parse_date(value: &Value, tz_offset_minutes: i32) -> Option<DateTime<FixedOffset>> {
    let offset = offset_from_minutes(tz_offset_minutes);
    match value {
        Value::Number(n) => parse_serial(n.as_f64()?, offset),
        Value::String(s) => parse_date_str(s, offset),
        _ => None,
    }
}

/// Day count from the 1899-12-30 epoch, fractional days carrying the
/// time of day. Interpreted as wall clock in the target offset.
fn parse_serial(serial: f64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    let naive = epoch.checked_add_signed(Duration::seconds(seconds))?;
    guard_epoch(offset.from_local_datetime(&naive).single()?)
}

fn parse_date_str(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() || s == "0" || s == "-" {
        return None;
    }

    // 1. ISO `YYYY-MM-DD[ T]HH:MM[:SS]` — panel UTC, shifted into the offset.
    const ISO_DATETIME: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in ISO_DATETIME {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return guard_epoch(Utc.from_utc_datetime(&naive).with_timezone(&offset));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return guard_epoch(Utc.from_utc_datetime(&naive).with_timezone(&offset));
    }

    // 2. Brazilian `DD/MM/YYYY[ HH:MM[:SS]]` — already wall clock.
    const BR_DATETIME: [&str; 4] = [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
    ];
    for fmt in BR_DATETIME {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return guard_epoch(offset.from_local_datetime(&naive).single()?);
        }
    }
    for fmt in ["%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return guard_epoch(offset.from_local_datetime(&naive).single()?);
        }
    }

    // 3. Generic fallback: RFC 3339 with an explicit zone.
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return guard_epoch(dt.with_timezone(&offset));
    }

    None
}

/// Pre-1970 dates are epoch-zero placeholders in the exports, not data.
fn guard_epoch(dt: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    if dt.year() < 1970 {
        None
    } else {
        Some(dt)
    }
}

pub fn weekday_name(dt: &DateTime<FixedOffset>) -> &'static str {
    WEEKDAYS[dt.weekday().num_days_from_sunday() as usize]
}

pub fn shift_name(dt: &DateTime<FixedOffset>) -> &'static str {
    match dt.hour() {
        0..=5 => SHIFTS[0],
        6..=11 => SHIFTS[1],
        12..=17 => SHIFTS[2],
        _ => SHIFTS[3],
    }
}

/// `mmm/yy` display label, e.g. `mar/24`.
pub fn month_year_label(dt: &DateTime<FixedOffset>) -> String {
    format!("{}/{:02}", MONTHS[dt.month0() as usize], dt.year() % 100)
}

/// Parse a `mmm/yy` label back to (year, month). Tolerates the dotted
/// variant (`mar./24`) and mixed case; unknown labels → None.
pub fn parse_month_year(label: &str) -> Option<(i32, u32)> {
    let cleaned = label.to_lowercase().replace('.', "");
    let (month_str, year_str) = cleaned.split_once('/')?;
    let month = MONTHS.iter().position(|m| *m == month_str.trim())? as u32 + 1;
    let year = 2000 + year_str.trim().parse::<i32>().ok()?;
    Some((year, month))
}

/// Chronological ordering key for a `mmm/yy` label. Unknown labels sort
/// after every real month.
pub fn month_sort_key(label: &str) -> (i32, u32) {
    parse_month_year(label).unwrap_or((i32::MAX, u32::MAX))
}

/// Whole days from `from` to `to` (negative when `to` precedes `from`).
pub fn days_between(from: &DateTime<FixedOffset>, to: &DateTime<FixedOffset>) -> i64 {
    to.signed_duration_since(*from).num_days()
}

/// Fractional months between two instants, using the mean Gregorian
/// month of 30.44 days.
pub fn months_between(from: &DateTime<FixedOffset>, to: &DateTime<FixedOffset>) -> f64 {
    let days = to.signed_duration_since(*from).num_seconds() as f64 / 86_400.0;
    days / 30.44
}

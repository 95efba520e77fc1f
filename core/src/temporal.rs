//! Time bucketing: weekday, shift and month-year distributions.
//!
//! Each record lands in three independent bucket maps keyed off its
//! parsed local timestamp. Records without a parsable date simply skip
//! every temporal bucket — they still count in category totals.

use crate::{
    config::EngineConfig,
    dates::{self, SHIFTS, WEEKDAYS},
    record::RawRecord,
};
use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthCount {
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub weekday: String,
    pub hour: u32,
    pub count: u64,
}

/// Bucket maps for one record category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalBreakdown {
    pub by_weekday: BTreeMap<String, u64>,
    pub by_shift: BTreeMap<String, u64>,
    /// Chronologically sorted, windowed to the current and previous
    /// calendar year and to dates not in the future.
    pub by_month: Vec<MonthCount>,
}

pub struct TemporalAggregator<'a> {
    config: &'a EngineConfig,
}

impl<'a> TemporalAggregator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Bucket one category by weekday, shift and month.
    pub fn aggregate(
        &self,
        records: &[RawRecord],
        date_aliases: &[String],
        now_local: &DateTime<FixedOffset>,
    ) -> TemporalBreakdown {
        let mut by_weekday: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_shift: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_month: BTreeMap<String, u64> = BTreeMap::new();

        for record in records {
            let Some(dt) = self.record_date(record, date_aliases) else {
                continue;
            };

            *by_weekday
                .entry(dates::weekday_name(&dt).to_string())
                .or_insert(0) += 1;
            *by_shift
                .entry(dates::shift_name(&dt).to_string())
                .or_insert(0) += 1;

            // Month series window: nothing from the future, nothing
            // older than the previous calendar year.
            if dt <= *now_local && dt.year() >= now_local.year() - 1 {
                *by_month
                    .entry(dates::month_year_label(&dt))
                    .or_insert(0) += 1;
            }
        }

        let mut by_month: Vec<MonthCount> = by_month
            .into_iter()
            .map(|(month, count)| MonthCount { month, count })
            .collect();
        by_month.sort_by_key(|m| dates::month_sort_key(&m.month));

        TemporalBreakdown {
            by_weekday,
            by_shift,
            by_month,
        }
    }

    /// Weekday × hour grid of one category, all 7×24 cells emitted so
    /// downstream consumers never special-case holes.
    pub fn heatmap(
        &self,
        records: &[RawRecord],
        date_aliases: &[String],
    ) -> Vec<HeatmapCell> {
        let mut counts: BTreeMap<(usize, u32), u64> = BTreeMap::new();
        for record in records {
            if let Some(dt) = self.record_date(record, date_aliases) {
                let day = dt.weekday().num_days_from_sunday() as usize;
                *counts.entry((day, dt.hour())).or_insert(0) += 1;
            }
        }

        let mut grid = Vec::with_capacity(WEEKDAYS.len() * 24);
        for (day_idx, day_name) in WEEKDAYS.iter().enumerate() {
            for hour in 0..24 {
                grid.push(HeatmapCell {
                    weekday: day_name.to_string(),
                    hour,
                    count: counts.get(&(day_idx, hour)).copied().unwrap_or(0),
                });
            }
        }
        grid
    }

    fn record_date(
        &self,
        record: &RawRecord,
        date_aliases: &[String],
    ) -> Option<DateTime<FixedOffset>> {
        let value = record.resolve(date_aliases)?;
        dates::parse_date(value, self.config.tz_offset_minutes)
    }
}

/// Argmax over a weekday bucket map. Ties resolve to the earliest
/// weekday in calendar order, never to map-iteration order.
pub fn best_weekday(buckets: &BTreeMap<String, u64>) -> Option<(String, u64)> {
    best_bucket(buckets, &WEEKDAYS)
}

/// Argmax over a shift bucket map, ties resolving to the earliest band
/// of the day.
pub fn best_shift(buckets: &BTreeMap<String, u64>) -> Option<(String, u64)> {
    best_bucket(buckets, &SHIFTS)
}

fn best_bucket(buckets: &BTreeMap<String, u64>, order: &[&str]) -> Option<(String, u64)> {
    let mut best: Option<(&str, u64)> = None;
    for name in order {
        let count = buckets.get(*name).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((name, count)),
        }
    }
    best.map(|(name, count)| (name.to_string(), count))
}

//! Loyalty, churn and the retention curve.
//!
//! Loyalty counts renewal events per distinct user. The retention
//! curve is a heuristic, NOT a survival analysis: a user counts as
//! retained at month N when some renewal lands within ±1 month of the
//! N-month mark after their first purchase. The snapshot names the
//! field an estimate accordingly.

use crate::{
    config::EngineConfig,
    dates::{self, days_between, months_between},
    record::RawRecord,
    stats::{median, safe_pct},
    types::UserId,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: u64,
}

/// One point of the retention curve estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPoint {
    pub month: u32,
    /// Users whose tenure reaches this month.
    pub eligible: u64,
    /// Eligible users with a renewal near the month mark.
    pub retained: u64,
    pub rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: String,
    pub count: u64,
    pub share_of_tests_pct: f64,
}

/// Loyalty figures derived from renewal events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenewalStats {
    pub loyal_clients: u64,
    pub distinct_renewers: u64,
    pub fidelity_rate_pct: f64,
    pub distribution: Vec<DistributionBucket>,
}

pub struct RetentionAnalyzer<'a> {
    config: &'a EngineConfig,
}

impl<'a> RetentionAnalyzer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Renewal events per distinct user. BTreeMap keeps downstream
    /// iteration deterministic.
    pub fn renewal_counts(&self, renewals: &[RawRecord]) -> BTreeMap<UserId, u64> {
        let mut counts: BTreeMap<UserId, u64> = BTreeMap::new();
        for record in renewals {
            if let Some(user) = record.resolve_str(&self.config.aliases.user) {
                *counts.entry(user).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Loyal clients (>= loyalty_min_renewals renewals), distinct
    /// renewers, fidelity rate and the renewal-count distribution.
    pub fn renewal_stats(&self, counts: &BTreeMap<UserId, u64>) -> RenewalStats {
        let threshold = self.config.loyalty_min_renewals;
        let distinct_renewers = counts.len() as u64;
        let loyal_clients = counts.values().filter(|&&c| c >= threshold).count() as u64;

        let mut one = 0u64;
        let mut two_three = 0u64;
        let mut four_five = 0u64;
        let mut six_plus = 0u64;
        for &count in counts.values() {
            match count {
                1 => one += 1,
                2..=3 => two_three += 1,
                4..=5 => four_five += 1,
                _ => six_plus += 1,
            }
        }
        let bucket = |label: &str, count: u64| DistributionBucket {
            label: label.to_string(),
            count,
        };

        RenewalStats {
            loyal_clients,
            distinct_renewers,
            fidelity_rate_pct: safe_pct(loyal_clients as f64, distinct_renewers as f64),
            distribution: vec![
                bucket("1 renovação", one),
                bucket("2-3 renovações", two_three),
                bucket("4-5 renovações", four_five),
                bucket("6+ renovações", six_plus),
            ],
        }
    }

    /// Month-by-month share of converting users still renewing.
    ///
    /// For each user, tenure runs from their earliest conversion. At
    /// month N a user is eligible when tenure >= N months, retained
    /// when any renewal offset falls in the half-open window
    /// [N-1, N+1) months. Months use the 30.44-day mean.
    pub fn retention_curve(
        &self,
        conversions: &[RawRecord],
        renewals: &[RawRecord],
        now_local: &DateTime<FixedOffset>,
    ) -> Vec<RetentionPoint> {
        let first_purchase = self.first_purchase_dates(conversions);
        if first_purchase.is_empty() {
            return Vec::new();
        }

        // Renewal offsets in months from each user's first purchase.
        let mut offsets: BTreeMap<&UserId, Vec<f64>> = BTreeMap::new();
        for record in renewals {
            let Some(user) = record.resolve_str(&self.config.aliases.user) else {
                continue;
            };
            let Some((user_key, first)) = first_purchase.get_key_value(&user) else {
                continue;
            };
            let Some(renewed_at) = self.record_date(record, &self.config.aliases.event_date)
            else {
                continue;
            };
            let offset = months_between(first, &renewed_at);
            if offset >= 0.0 {
                offsets.entry(user_key).or_default().push(offset);
            }
        }

        let mut curve = Vec::new();
        for month in 1..=self.config.retention_curve_months {
            let mut eligible = 0u64;
            let mut retained = 0u64;
            for (user, first) in &first_purchase {
                if months_between(first, now_local) < f64::from(month) {
                    continue;
                }
                eligible += 1;
                let window = (f64::from(month) - 1.0, f64::from(month) + 1.0);
                let hit = offsets
                    .get(user)
                    .map(|user_offsets| {
                        user_offsets
                            .iter()
                            .any(|&o| o >= window.0 && o < window.1)
                    })
                    .unwrap_or(false);
                if hit {
                    retained += 1;
                }
            }
            curve.push(RetentionPoint {
                month,
                eligible,
                retained,
                rate_pct: safe_pct(retained as f64, eligible as f64),
            });
        }
        curve
    }

    /// Median days from a user's test registration to their
    /// conversion, over pairs landing in a sane 0..=365-day window.
    pub fn median_days_to_conversion(
        &self,
        tests: &[RawRecord],
        conversions: &[RawRecord],
    ) -> f64 {
        // Earliest test registration per user.
        let mut test_dates: BTreeMap<UserId, DateTime<FixedOffset>> = BTreeMap::new();
        for record in tests {
            let Some(user) = record.resolve_str(&self.config.aliases.user) else {
                continue;
            };
            let Some(created) = self.record_date(record, &self.config.aliases.created_at) else {
                continue;
            };
            test_dates
                .entry(user)
                .and_modify(|existing| {
                    if created < *existing {
                        *existing = created;
                    }
                })
                .or_insert(created);
        }

        let mut samples = Vec::new();
        for record in conversions {
            let Some(user) = record.resolve_str(&self.config.aliases.user) else {
                continue;
            };
            let Some(converted_at) = self.record_date(record, &self.config.aliases.event_date)
            else {
                continue;
            };
            if let Some(tested_at) = test_dates.get(&user) {
                let days = days_between(tested_at, &converted_at);
                if (0..=365).contains(&days) {
                    samples.push(days as f64);
                }
            }
        }
        median(&mut samples)
    }

    /// Measured funnel: every stage is a real count, shares are
    /// relative to tests started.
    pub fn funnel(
        &self,
        tests_total: u64,
        conversions_total: u64,
        stats: &RenewalStats,
    ) -> Vec<FunnelStage> {
        let stage = |name: &str, count: u64| FunnelStage {
            stage: name.to_string(),
            count,
            share_of_tests_pct: safe_pct(count as f64, tests_total as f64),
        };
        vec![
            stage("Testes Iniciados", tests_total),
            stage("Conversões", conversions_total),
            stage("Renovadores", stats.distinct_renewers),
            stage("Clientes Fiéis", stats.loyal_clients),
        ]
    }

    /// Earliest conversion date per user.
    fn first_purchase_dates(
        &self,
        conversions: &[RawRecord],
    ) -> BTreeMap<UserId, DateTime<FixedOffset>> {
        let mut first: BTreeMap<UserId, DateTime<FixedOffset>> = BTreeMap::new();
        for record in conversions {
            let Some(user) = record.resolve_str(&self.config.aliases.user) else {
                continue;
            };
            let Some(purchased_at) = self.record_date(record, &self.config.aliases.event_date)
            else {
                continue;
            };
            first
                .entry(user)
                .and_modify(|existing| {
                    if purchased_at < *existing {
                        *existing = purchased_at;
                    }
                })
                .or_insert(purchased_at);
        }
        first
    }

    fn record_date(
        &self,
        record: &RawRecord,
        aliases: &[String],
    ) -> Option<DateTime<FixedOffset>> {
        let value = record.resolve(aliases)?;
        dates::parse_date(value, self.config.tz_offset_minutes)
    }
}

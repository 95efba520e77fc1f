//! Revenue, unit economics and period summaries.
//!
//! Money figures never come from the raw `Custo` column directly: a
//! sale contributes its mapped plan's average price to revenue, while
//! the raw credit count feeds the cost side (credits × per-credit
//! cost). Every ratio is zero-guarded.

use crate::{
    config::EngineConfig,
    dates,
    record::RawRecord,
    stats::{safe_div, safe_pct},
};
use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate money figures for one sale category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesTotals {
    pub count: u64,
    /// Sum of mapped average plan prices.
    pub revenue: f64,
    /// Sum of raw credit costs.
    pub credits_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanBreakdown {
    pub plan: String,
    pub count: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMixEntry {
    pub plan: String,
    pub revenue: f64,
    pub share_pct: f64,
}

/// Sales activity for the current local day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub conversions: u64,
    pub renewals: u64,
    pub expired: u64,
    pub activated: u64,
    pub credits_spent: f64,
    pub revenue: f64,
    pub profit: f64,
}

/// Sales activity for the current calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub conversions: u64,
    pub renewals: u64,
    pub revenue: f64,
}

pub struct FinancialAnalyzer<'a> {
    config: &'a EngineConfig,
}

impl<'a> FinancialAnalyzer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Revenue and credit totals over one sale category. A record with
    /// a missing or unparsable cost maps through the fallback tier, so
    /// it still contributes to count and revenue.
    pub fn sales_totals(&self, records: &[RawRecord]) -> SalesTotals {
        let mut totals = SalesTotals {
            count: records.len() as u64,
            ..SalesTotals::default()
        };
        for record in records {
            let cost = record.number(&self.config.aliases.cost);
            totals.credits_spent += cost.max(0.0);
            totals.revenue += self.config.plans.map(cost).average_price;
        }
        totals
    }

    /// Sales count and revenue grouped by mapped plan, largest count
    /// first, name as the deterministic tie-break.
    pub fn plan_breakdown(&self, records: &[RawRecord]) -> Vec<PlanBreakdown> {
        let mut by_plan: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        for record in records {
            let cost = record.number(&self.config.aliases.cost);
            let plan = self.config.plans.map(cost);
            let entry = by_plan.entry(plan.name).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += plan.average_price;
        }

        let mut breakdown: Vec<PlanBreakdown> = by_plan
            .into_iter()
            .map(|(plan, (count, revenue))| PlanBreakdown {
                plan,
                count,
                revenue,
            })
            .collect();
        breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.plan.cmp(&b.plan)));
        breakdown
    }

    /// Revenue share per plan across conversions and renewals combined.
    pub fn plan_mix(
        &self,
        conversions: &[PlanBreakdown],
        renewals: &[PlanBreakdown],
    ) -> Vec<PlanMixEntry> {
        let mut revenue_by_plan: BTreeMap<String, f64> = BTreeMap::new();
        for entry in conversions.iter().chain(renewals) {
            *revenue_by_plan.entry(entry.plan.clone()).or_insert(0.0) += entry.revenue;
        }
        let total: f64 = revenue_by_plan.values().sum();

        let mut mix: Vec<PlanMixEntry> = revenue_by_plan
            .into_iter()
            .map(|(plan, revenue)| PlanMixEntry {
                plan,
                revenue,
                share_pct: safe_pct(revenue, total),
            })
            .collect();
        mix.sort_by(|a, b| {
            b.revenue
                .partial_cmp(&a.revenue)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.plan.cmp(&b.plan))
        });
        mix
    }

    /// Mean leftover credit balance after a conversion, over records
    /// that carry a positive balance.
    pub fn average_post_sale_balance(&self, conversions: &[RawRecord]) -> f64 {
        let mut total = 0.0;
        let mut counted = 0u64;
        for record in conversions {
            if let Some(balance) = record.resolve_f64(&self.config.aliases.credits_after) {
                if balance > 0.0 {
                    total += balance;
                    counted += 1;
                }
            }
        }
        safe_div(total, counted as f64)
    }

    /// Activity dated to the current local day: sales on their event
    /// date, expiries on their expiry date, activations on their
    /// creation date.
    pub fn day_summary(
        &self,
        conversions: &[RawRecord],
        renewals: &[RawRecord],
        active: &[RawRecord],
        expired: &[RawRecord],
        now_local: &DateTime<FixedOffset>,
    ) -> DaySummary {
        let today = now_local.date_naive();
        let mut summary = DaySummary::default();

        for record in conversions {
            if let Some(dt) = self.record_date(record, &self.config.aliases.event_date) {
                if dt.date_naive() == today {
                    summary.conversions += 1;
                    self.add_sale(&mut summary, record);
                }
            }
        }
        for record in renewals {
            if let Some(dt) = self.record_date(record, &self.config.aliases.event_date) {
                if dt.date_naive() == today {
                    summary.renewals += 1;
                    self.add_sale(&mut summary, record);
                }
            }
        }
        for record in expired {
            if let Some(dt) = self.record_date(record, &self.config.aliases.expires_at) {
                if dt.date_naive() == today {
                    summary.expired += 1;
                }
            }
        }
        for record in active {
            if let Some(dt) = self.record_date(record, &self.config.aliases.created_at) {
                if dt.date_naive() == today {
                    summary.activated += 1;
                }
            }
        }

        summary.profit = summary.revenue - summary.credits_spent * self.config.cost_per_credit;
        summary
    }

    /// Sales dated to the current calendar month.
    pub fn month_summary(
        &self,
        conversions: &[RawRecord],
        renewals: &[RawRecord],
        now_local: &DateTime<FixedOffset>,
    ) -> MonthSummary {
        let (year, month) = (now_local.year(), now_local.month());
        let mut summary = MonthSummary::default();

        for record in conversions {
            if let Some(dt) = self.record_date(record, &self.config.aliases.event_date) {
                if dt.year() == year && dt.month() == month {
                    summary.conversions += 1;
                    let cost = record.number(&self.config.aliases.cost);
                    summary.revenue += self.config.plans.map(cost).average_price;
                }
            }
        }
        for record in renewals {
            if let Some(dt) = self.record_date(record, &self.config.aliases.event_date) {
                if dt.year() == year && dt.month() == month {
                    summary.renewals += 1;
                    let cost = record.number(&self.config.aliases.cost);
                    summary.revenue += self.config.plans.map(cost).average_price;
                }
            }
        }
        summary
    }

    fn add_sale(&self, summary: &mut DaySummary, record: &RawRecord) {
        let cost = record.number(&self.config.aliases.cost);
        summary.credits_spent += cost.max(0.0);
        summary.revenue += self.config.plans.map(cost).average_price;
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

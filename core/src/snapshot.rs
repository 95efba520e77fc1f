//! The metrics snapshot — the engine's one output value.
//!
//! Built fresh on every aggregation run and handed to the caller,
//! never cached or mutated inside the engine. Rates are percentages
//! already scaled to [0, 100] with one decimal; currency totals are
//! plain amounts in the base currency unit.

use crate::{
    finance::{DaySummary, MonthSummary, PlanBreakdown, PlanMixEntry},
    record::RawRecord,
    retention::{DistributionBucket, FunnelStage, RetentionPoint},
    temporal::{HeatmapCell, MonthCount},
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-state record counts across the client-base categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateBreakdown {
    pub state: String,
    pub tests: u64,
    pub active: u64,
    pub expired: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateShare {
    pub state: String,
    pub total: u64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaCodeCount {
    pub area_code: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResellerCount {
    pub reseller: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionCount {
    pub connections: u64,
    pub clients: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    // ── Category totals ─────────────────────────────────────────
    pub tests: u64,
    pub conversions: u64,
    pub renewals: u64,
    pub active_clients: u64,
    pub expired_clients: u64,

    // ── Rates (percent, one decimal) ────────────────────────────
    pub conversion_rate_pct: f64,
    pub churn_rate_pct: f64,
    pub retention_rate_pct: f64,
    pub fidelity_rate_pct: f64,

    // ── Financial ───────────────────────────────────────────────
    pub revenue_total: f64,
    pub revenue_conversions: f64,
    pub revenue_renewals: f64,
    pub average_ticket: f64,
    pub average_conversion_value: f64,
    pub average_renewal_value: f64,
    /// Projection: active clients × average ticket. Not billed revenue.
    pub monthly_recurring_revenue: f64,
    pub annual_recurring_revenue: f64,
    /// Average ticket × assumed 6-month lifetime.
    pub ltv: f64,
    pub cac: f64,
    pub roas: f64,
    pub credits_spent: f64,
    pub credit_cost_total: f64,
    pub profit_total: f64,
    pub average_post_sale_balance: f64,

    // ── Plans ───────────────────────────────────────────────────
    pub conversions_by_plan: Vec<PlanBreakdown>,
    pub renewals_by_plan: Vec<PlanBreakdown>,
    pub plan_mix: Vec<PlanMixEntry>,

    // ── Temporal ────────────────────────────────────────────────
    pub best_day: String,
    pub best_day_count: u64,
    pub best_shift: String,
    pub best_shift_count: u64,
    pub tests_by_weekday: BTreeMap<String, u64>,
    pub conversions_by_weekday: BTreeMap<String, u64>,
    pub renewals_by_weekday: BTreeMap<String, u64>,
    pub tests_by_shift: BTreeMap<String, u64>,
    pub conversions_by_shift: BTreeMap<String, u64>,
    pub renewals_by_shift: BTreeMap<String, u64>,
    pub tests_by_month: Vec<MonthCount>,
    pub conversions_by_month: Vec<MonthCount>,
    pub renewals_by_month: Vec<MonthCount>,
    pub conversion_heatmap: Vec<HeatmapCell>,
    pub median_days_to_conversion: f64,

    // ── Geographic ──────────────────────────────────────────────
    pub by_state: Vec<StateBreakdown>,
    pub top_states: Vec<StateShare>,
    pub by_area_code: Vec<AreaCodeCount>,
    pub states_covered: u64,

    // ── Retention ───────────────────────────────────────────────
    pub loyal_clients: u64,
    pub distinct_renewers: u64,
    pub renewal_distribution: Vec<DistributionBucket>,
    /// Heuristic month-window approximation, not a survival analysis.
    pub retention_curve_estimate: Vec<RetentionPoint>,
    pub funnel: Vec<FunnelStage>,

    // ── Client base ─────────────────────────────────────────────
    /// First N active records by registration date, newest first.
    pub recent_clients: Vec<RawRecord>,
    pub average_connections: f64,
    pub max_connections: u64,
    pub connections: Vec<ConnectionCount>,
    pub top_resellers: Vec<ResellerCount>,

    // ── Period summaries ────────────────────────────────────────
    pub today: DaySummary,
    pub current_month: MonthSummary,

    /// Clock reading the snapshot was built against.
    pub generated_at: Option<DateTime<FixedOffset>>,
}

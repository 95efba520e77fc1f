//! The metrics engine — one aggregation pass over the panel exports.
//!
//! COMPOSITION ORDER (fixed, documented, never reordered):
//!   1. Category totals and headline rates
//!   2. Financial figures (revenue, unit economics)
//!   3. Temporal buckets (weekday / shift / month, heatmap)
//!   4. Geography (state, DDD)
//!   5. Retention (loyalty, curve estimate, funnel)
//!   6. Client-base extras (recent clients, connections, resellers)
//!   7. Period summaries (today, current month)
//!
//! RULES:
//!   - Every pass is a plain linear scan; nothing is cached between runs.
//!   - No component mutates shared state; the snapshot is assembled once
//!     and returned by value.
//!   - "Now" comes exclusively from the injected clock. Same inputs plus
//!     the same clock reading produce an identical snapshot.

use crate::{
    clock::{Clock, SystemClock},
    config::EngineConfig,
    dates,
    error::EngineResult,
    finance::FinancialAnalyzer,
    record::RawRecord,
    retention::RetentionAnalyzer,
    snapshot::{
        AreaCodeCount, ConnectionCount, MetricsSnapshot, ResellerCount, StateBreakdown,
        StateShare,
    },
    stats::{safe_div, safe_pct},
    temporal::{self, TemporalAggregator},
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed lifetime assumption behind the LTV projection.
const LTV_LIFETIME_MONTHS: f64 = 6.0;

/// The five category arrays, under the backend aggregate's fixed keys.
/// Any array may be empty, partial or truncated by an upstream cap;
/// aggregation degrades to smaller figures instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryInput {
    #[serde(rename = "testes")]
    pub tests: Vec<RawRecord>,
    #[serde(rename = "conversoes")]
    pub conversions: Vec<RawRecord>,
    #[serde(rename = "renovacoes")]
    pub renewals: Vec<RawRecord>,
    #[serde(rename = "ativos")]
    pub active: Vec<RawRecord>,
    #[serde(rename = "expirados")]
    pub expired: Vec<RawRecord>,
}

impl CategoryInput {
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
            && self.conversions.is_empty()
            && self.renewals.is_empty()
            && self.active.is_empty()
            && self.expired.is_empty()
    }
}

pub struct MetricsEngine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
}

impl MetricsEngine {
    /// Build an engine around an injected clock. Reference data is
    /// validated once here; aggregation itself never errors on data.
    pub fn new(config: EngineConfig, clock: Box<dyn Clock>) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config, clock })
    }

    pub fn with_system_clock(config: EngineConfig) -> EngineResult<Self> {
        Self::new(config, Box::new(SystemClock))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One full aggregation pass. Pure with respect to the inputs and
    /// the clock reading.
    pub fn aggregate(&self, input: &CategoryInput) -> EngineResult<MetricsSnapshot> {
        let offset = dates::offset_from_minutes(self.config.tz_offset_minutes);
        let now_local = self.clock.now_utc().with_timezone(&offset);
        let aliases = &self.config.aliases;

        let mut snapshot = MetricsSnapshot::default();

        // 1. Category totals and headline rates.
        snapshot.tests = input.tests.len() as u64;
        snapshot.conversions = input.conversions.len() as u64;
        snapshot.renewals = input.renewals.len() as u64;
        snapshot.active_clients = input.active.len() as u64;
        snapshot.expired_clients = input.expired.len() as u64;

        let client_base = snapshot.active_clients + snapshot.expired_clients;
        snapshot.conversion_rate_pct =
            safe_pct(snapshot.conversions as f64, snapshot.tests as f64);
        snapshot.churn_rate_pct =
            safe_pct(snapshot.expired_clients as f64, client_base as f64);
        snapshot.retention_rate_pct =
            safe_pct(snapshot.active_clients as f64, client_base as f64);

        // 2. Financial.
        let finance = FinancialAnalyzer::new(&self.config);
        let conversion_totals = finance.sales_totals(&input.conversions);
        let renewal_totals = finance.sales_totals(&input.renewals);

        snapshot.revenue_conversions = conversion_totals.revenue;
        snapshot.revenue_renewals = renewal_totals.revenue;
        snapshot.revenue_total = conversion_totals.revenue + renewal_totals.revenue;

        let sales_count = conversion_totals.count + renewal_totals.count;
        snapshot.average_ticket = safe_div(snapshot.revenue_total, sales_count as f64);
        snapshot.average_conversion_value =
            safe_div(conversion_totals.revenue, conversion_totals.count as f64);
        snapshot.average_renewal_value =
            safe_div(renewal_totals.revenue, renewal_totals.count as f64);

        snapshot.monthly_recurring_revenue =
            snapshot.active_clients as f64 * snapshot.average_ticket;
        snapshot.annual_recurring_revenue = snapshot.monthly_recurring_revenue * 12.0;
        snapshot.ltv = snapshot.average_ticket * LTV_LIFETIME_MONTHS;

        snapshot.credits_spent =
            conversion_totals.credits_spent + renewal_totals.credits_spent;
        snapshot.credit_cost_total = snapshot.credits_spent * self.config.cost_per_credit;
        snapshot.profit_total = snapshot.revenue_total - snapshot.credit_cost_total;

        let acquisition_cost = conversion_totals.credits_spent * self.config.cost_per_credit;
        snapshot.cac = safe_div(acquisition_cost, conversion_totals.count as f64);
        snapshot.roas = safe_div(snapshot.revenue_total, snapshot.credit_cost_total);
        snapshot.average_post_sale_balance =
            finance.average_post_sale_balance(&input.conversions);

        snapshot.conversions_by_plan = finance.plan_breakdown(&input.conversions);
        snapshot.renewals_by_plan = finance.plan_breakdown(&input.renewals);
        snapshot.plan_mix =
            finance.plan_mix(&snapshot.conversions_by_plan, &snapshot.renewals_by_plan);

        // 3. Temporal.
        let temporal_agg = TemporalAggregator::new(&self.config);
        let tests_temporal =
            temporal_agg.aggregate(&input.tests, &aliases.created_at, &now_local);
        let conversions_temporal =
            temporal_agg.aggregate(&input.conversions, &aliases.event_date, &now_local);
        let renewals_temporal =
            temporal_agg.aggregate(&input.renewals, &aliases.event_date, &now_local);

        if let Some((day, count)) = temporal::best_weekday(&conversions_temporal.by_weekday) {
            snapshot.best_day = day;
            snapshot.best_day_count = count;
        } else {
            snapshot.best_day = "N/A".to_string();
        }
        if let Some((shift, count)) = temporal::best_shift(&conversions_temporal.by_shift) {
            snapshot.best_shift = shift;
            snapshot.best_shift_count = count;
        } else {
            snapshot.best_shift = "N/A".to_string();
        }

        snapshot.conversion_heatmap =
            temporal_agg.heatmap(&input.conversions, &aliases.event_date);

        snapshot.tests_by_weekday = tests_temporal.by_weekday;
        snapshot.tests_by_shift = tests_temporal.by_shift;
        snapshot.tests_by_month = tests_temporal.by_month;
        snapshot.conversions_by_weekday = conversions_temporal.by_weekday;
        snapshot.conversions_by_shift = conversions_temporal.by_shift;
        snapshot.conversions_by_month = conversions_temporal.by_month;
        snapshot.renewals_by_weekday = renewals_temporal.by_weekday;
        snapshot.renewals_by_shift = renewals_temporal.by_shift;
        snapshot.renewals_by_month = renewals_temporal.by_month;

        // 4. Geography.
        self.aggregate_geography(input, &mut snapshot);

        // 5. Retention.
        let retention = RetentionAnalyzer::new(&self.config);
        let renewal_counts = retention.renewal_counts(&input.renewals);
        let renewal_stats = retention.renewal_stats(&renewal_counts);
        snapshot.loyal_clients = renewal_stats.loyal_clients;
        snapshot.distinct_renewers = renewal_stats.distinct_renewers;
        snapshot.fidelity_rate_pct = renewal_stats.fidelity_rate_pct;
        snapshot.retention_curve_estimate =
            retention.retention_curve(&input.conversions, &input.renewals, &now_local);
        snapshot.median_days_to_conversion =
            retention.median_days_to_conversion(&input.tests, &input.conversions);
        snapshot.funnel =
            retention.funnel(snapshot.tests, snapshot.conversions, &renewal_stats);
        snapshot.renewal_distribution = renewal_stats.distribution;

        // 6. Client-base extras.
        snapshot.recent_clients = self.recent_clients(&input.active);
        self.aggregate_connections(&input.active, &mut snapshot);
        snapshot.top_resellers = self.top_resellers(&input.tests);

        // 7. Period summaries.
        snapshot.today = finance.day_summary(
            &input.conversions,
            &input.renewals,
            &input.active,
            &input.expired,
            &now_local,
        );
        snapshot.current_month =
            finance.month_summary(&input.conversions, &input.renewals, &now_local);

        snapshot.generated_at = Some(now_local);

        log::debug!(
            "aggregated snapshot: {} tests, {} conversions, {} renewals, {} active, {} expired",
            snapshot.tests,
            snapshot.conversions,
            snapshot.renewals,
            snapshot.active_clients,
            snapshot.expired_clients,
        );

        Ok(snapshot)
    }

    /// Per-state and per-DDD counts over the client-base categories.
    /// Records with no resolvable geography stay out of these
    /// breakdowns; they are already counted in the category totals.
    fn aggregate_geography(&self, input: &CategoryInput, snapshot: &mut MetricsSnapshot) {
        #[derive(Clone, Copy)]
        enum Category {
            Test,
            Active,
            Expired,
        }

        let mut by_state: BTreeMap<String, StateBreakdown> = BTreeMap::new();
        let mut by_area_code: BTreeMap<String, u64> = BTreeMap::new();

        let passes: [(&[RawRecord], Category); 3] = [
            (&input.tests, Category::Test),
            (&input.active, Category::Active),
            (&input.expired, Category::Expired),
        ];

        for (records, category) in passes {
            for record in records {
                let (state, area_code) = self.record_geography(record);

                if let Some(state) = state {
                    let entry = by_state.entry(state.clone()).or_insert_with(|| {
                        StateBreakdown {
                            state,
                            ..StateBreakdown::default()
                        }
                    });
                    match category {
                        Category::Test => entry.tests += 1,
                        Category::Active => entry.active += 1,
                        Category::Expired => entry.expired += 1,
                    }
                }
                if let Some(code) = area_code {
                    *by_area_code.entry(code).or_insert(0) += 1;
                }
            }
        }

        let client_base = snapshot.active_clients + snapshot.expired_clients;
        let mut top_states: Vec<StateShare> = by_state
            .values()
            .map(|b| StateShare {
                state: b.state.clone(),
                total: b.active + b.expired,
                share_pct: safe_pct((b.active + b.expired) as f64, client_base as f64),
            })
            .collect();
        top_states.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.state.cmp(&b.state)));
        top_states.truncate(self.config.top_states_limit);

        let mut by_area_code: Vec<AreaCodeCount> = by_area_code
            .into_iter()
            .map(|(area_code, count)| AreaCodeCount { area_code, count })
            .collect();
        by_area_code.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.area_code.cmp(&b.area_code))
        });

        snapshot.states_covered = by_state.len() as u64;
        snapshot.by_state = by_state.into_values().collect();
        snapshot.top_states = top_states;
        snapshot.by_area_code = by_area_code;
    }

    /// Geography for one record: explicit UF/DDD columns first, then
    /// the phone number in the user column.
    fn record_geography(&self, record: &RawRecord) -> (Option<String>, Option<String>) {
        let aliases = &self.config.aliases;
        let table = &self.config.area_codes;

        let explicit_state = record
            .resolve_str(&aliases.state)
            .map(|s| s.to_uppercase());
        let explicit_code = record.resolve_str(&aliases.area_code);

        if explicit_state.is_some() || explicit_code.is_some() {
            let state = explicit_state.or_else(|| {
                explicit_code.as_deref().and_then(|code| {
                    let geo = table.from_area_code(code);
                    geo.is_valid.then_some(geo.state)
                })
            });
            return (state, explicit_code);
        }

        let Some(phone) = record.resolve_str(&aliases.user) else {
            return (None, None);
        };
        let geo = table.resolve(&phone);
        if geo.is_valid {
            (Some(geo.state), Some(geo.area_code))
        } else {
            (None, None)
        }
    }

    /// First N active records by registration date, newest first.
    /// Records without a parsable date sort last, keeping input order.
    fn recent_clients(&self, active: &[RawRecord]) -> Vec<RawRecord> {
        let mut dated: Vec<(Option<DateTime<FixedOffset>>, &RawRecord)> = active
            .iter()
            .map(|record| {
                let dt = record
                    .resolve(&self.config.aliases.created_at)
                    .and_then(|v| dates::parse_date(v, self.config.tz_offset_minutes));
                (dt, record)
            })
            .collect();

        dated.sort_by(|a, b| match (&a.0, &b.0) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        dated
            .into_iter()
            .take(self.config.recent_clients_limit)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Simultaneous-connection stats over the active base. A missing
    /// connection column means the panel default of one screen.
    fn aggregate_connections(&self, active: &[RawRecord], snapshot: &mut MetricsSnapshot) {
        let mut by_count: BTreeMap<u64, u64> = BTreeMap::new();
        let mut total = 0u64;
        let mut max = 0u64;

        for record in active {
            let connections = record
                .resolve_f64(&self.config.aliases.connections)
                .map(|v| v.max(0.0) as u64)
                .unwrap_or(1);
            *by_count.entry(connections).or_insert(0) += 1;
            total += connections;
            max = max.max(connections);
        }

        snapshot.average_connections = safe_div(total as f64, active.len() as f64);
        snapshot.max_connections = max;
        snapshot.connections = by_count
            .into_iter()
            .map(|(connections, clients)| ConnectionCount {
                connections,
                clients,
            })
            .collect();
    }

    /// Test volume per reseller, largest first. Tests without a
    /// reseller column are direct sales.
    fn top_resellers(&self, tests: &[RawRecord]) -> Vec<ResellerCount> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in tests {
            let reseller = record
                .resolve_str(&self.config.aliases.reseller)
                .unwrap_or_else(|| "Direto".to_string());
            *counts.entry(reseller).or_insert(0) += 1;
        }

        let mut top: Vec<ResellerCount> = counts
            .into_iter()
            .map(|(reseller, count)| ResellerCount { reseller, count })
            .collect();
        top.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.reseller.cmp(&b.reseller))
        });
        top.truncate(self.config.top_resellers_limit);
        top
    }
}

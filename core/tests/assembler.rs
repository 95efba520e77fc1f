//! End-to-end assembler tests — the full aggregation pass.

use chrono::{TimeZone, Utc};
use painel_core::{
    clock::FixedClock,
    config::EngineConfig,
    engine::{CategoryInput, MetricsEngine},
    record::RawRecord,
};
use serde_json::{json, Value};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn record(fields: Value) -> RawRecord {
    match fields {
        Value::Object(map) => RawRecord(map),
        _ => panic!("test records must be JSON objects"),
    }
}

fn repeat(count: usize, fields: Value) -> Vec<RawRecord> {
    (0..count).map(|_| record(fields.clone())).collect()
}

/// Engine pinned to 2024-06-15 12:00 in the -03:00 offset.
fn engine() -> MetricsEngine {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 15, 15, 0, 0).unwrap());
    MetricsEngine::new(EngineConfig::default(), Box::new(clock)).expect("valid default config")
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// 100 tests, 25 conversions, 10 renewals, 60 active, 40 expired ⇒
/// conversion 25.0, churn 40.0, retention 60.0.
#[test]
fn headline_rates_from_category_counts() {
    let input = CategoryInput {
        tests: repeat(100, json!({})),
        conversions: repeat(25, json!({})),
        renewals: repeat(10, json!({})),
        active: repeat(60, json!({})),
        expired: repeat(40, json!({})),
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");

    assert_eq!(snapshot.tests, 100);
    assert_eq!(snapshot.conversions, 25);
    assert_eq!(snapshot.renewals, 10);
    assert_eq!(snapshot.active_clients, 60);
    assert_eq!(snapshot.expired_clients, 40);
    assert_eq!(snapshot.conversion_rate_pct, 25.0);
    assert_eq!(snapshot.churn_rate_pct, 40.0);
    assert_eq!(snapshot.retention_rate_pct, 60.0);
}

/// Conversion costs [1, 1, 3] ⇒ revenue 135, average ticket 45.
#[test]
fn revenue_and_ticket_from_mapped_prices() {
    let input = CategoryInput {
        conversions: vec![
            record(json!({"Custo": 1})),
            record(json!({"Custo": 1})),
            record(json!({"Custo": 3})),
        ],
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");

    assert_eq!(snapshot.revenue_total, 135.0);
    assert_eq!(snapshot.revenue_conversions, 135.0);
    assert_eq!(snapshot.average_ticket, 45.0);
    assert_eq!(snapshot.credits_spent, 5.0);
    // Unit economics off the same figures.
    let config = EngineConfig::default();
    assert_eq!(snapshot.credit_cost_total, 5.0 * config.cost_per_credit);
    assert_eq!(snapshot.profit_total, 135.0 - 5.0 * config.cost_per_credit);
    assert_eq!(snapshot.ltv, 45.0 * 6.0);
    assert_eq!(snapshot.cac, 5.0 * config.cost_per_credit / 3.0);
}

/// MRR projects active clients at the average ticket; ARR is 12×.
#[test]
fn recurring_revenue_is_a_projection() {
    let input = CategoryInput {
        conversions: vec![record(json!({"Custo": 1})), record(json!({"Custo": 3}))],
        active: repeat(10, json!({})),
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");

    let ticket = (30.0 + 75.0) / 2.0;
    assert_eq!(snapshot.average_ticket, ticket);
    assert_eq!(snapshot.monthly_recurring_revenue, 10.0 * ticket);
    assert_eq!(snapshot.annual_recurring_revenue, 120.0 * ticket);
}

/// Empty input degrades to an all-zero snapshot; nothing divides by
/// zero, nothing errors.
#[test]
fn empty_input_degrades_gracefully() {
    let snapshot = engine()
        .aggregate(&CategoryInput::default())
        .expect("empty input aggregates");

    assert_eq!(snapshot.tests, 0);
    assert_eq!(snapshot.conversion_rate_pct, 0.0);
    assert_eq!(snapshot.churn_rate_pct, 0.0);
    assert_eq!(snapshot.average_ticket, 0.0);
    assert_eq!(snapshot.roas, 0.0);
    assert_eq!(snapshot.cac, 0.0);
    assert_eq!(snapshot.best_day, "N/A");
    assert_eq!(snapshot.best_shift, "N/A");
    assert!(snapshot.recent_clients.is_empty());
    assert!(snapshot.retention_curve_estimate.is_empty());
}

/// Records with unresolvable geography stay in category totals but out
/// of the geographic breakdowns.
#[test]
fn invalid_geography_excluded_from_breakdowns_only() {
    let input = CategoryInput {
        active: vec![
            record(json!({"Usuario": "5511987654321"})),
            record(json!({"Usuario": "11912345678"})),
            record(json!({"Usuario": "abc"})),
        ],
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");

    assert_eq!(snapshot.active_clients, 3, "totals keep all records");
    assert_eq!(snapshot.by_state.len(), 1);
    assert_eq!(snapshot.by_state[0].state, "SP");
    assert_eq!(snapshot.by_state[0].active, 2);
    assert_eq!(snapshot.states_covered, 1);
    assert_eq!(snapshot.by_area_code.len(), 1);
    assert_eq!(snapshot.by_area_code[0].area_code, "11");
    assert_eq!(snapshot.by_area_code[0].count, 2);
}

/// Explicit UF/DDD columns take priority over the phone number.
#[test]
fn explicit_geography_columns_win() {
    let input = CategoryInput {
        active: vec![record(json!({"Usuario": "5511987654321", "UF": "ba", "DDD": "71"}))],
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");
    assert_eq!(snapshot.by_state[0].state, "BA");
    assert_eq!(snapshot.by_area_code[0].area_code, "71");
}

/// Recent clients come newest-first; undated records sort last.
#[test]
fn recent_clients_sorted_by_registration() {
    let input = CategoryInput {
        active: vec![
            record(json!({"Usuario": "old", "Criado_Em": "01/01/2024"})),
            record(json!({"Usuario": "undated"})),
            record(json!({"Usuario": "new", "Criado_Em": "01/06/2024"})),
        ],
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");

    let users: Vec<&str> = snapshot
        .recent_clients
        .iter()
        .map(|r| r.0.get("Usuario").and_then(Value::as_str).unwrap_or(""))
        .collect();
    assert_eq!(users, vec!["new", "old", "undated"]);
}

/// The backend aggregate object deserializes under its fixed keys,
/// missing arrays defaulting to empty.
#[test]
fn category_input_deserializes_backend_keys() {
    let payload = json!({
        "testes": [{"Usuario": "a"}],
        "conversoes": [{"Custo": 1}],
        "ativos": [{"Usuario": "b"}]
    });
    let input: CategoryInput = serde_json::from_value(payload).expect("payload deserializes");

    assert_eq!(input.tests.len(), 1);
    assert_eq!(input.conversions.len(), 1);
    assert_eq!(input.active.len(), 1);
    assert!(input.renewals.is_empty());
    assert!(input.expired.is_empty());
}

/// Same inputs + same clock ⇒ byte-identical snapshots.
#[test]
fn snapshots_are_deterministic() {
    let input = CategoryInput {
        tests: vec![
            record(json!({"Usuario": "5511987654321", "Criado_Em": "01/03/2024 09:00"})),
            record(json!({"Usuario": "21999998888", "Criado_Em": "2024-03-02 14:30:00"})),
        ],
        conversions: vec![
            record(json!({"Usuario": "5511987654321", "Data": "05/03/2024 10:00", "Custo": 1})),
            record(json!({"Usuario": "21999998888", "Data": "06/03/2024 21:00", "Custo": 3})),
        ],
        renewals: vec![
            record(json!({"Usuario": "5511987654321", "Data": "05/04/2024", "Custo": 1})),
        ],
        active: vec![record(json!({"Usuario": "5511987654321", "Max_Conexoes": 2}))],
        expired: vec![record(json!({"Usuario": "31988887777"}))],
    };

    let snapshot_a = engine().aggregate(&input).expect("first run");
    let snapshot_b = engine().aggregate(&input).expect("second run");

    let json_a = serde_json::to_string(&snapshot_a).expect("serializes");
    let json_b = serde_json::to_string(&snapshot_b).expect("serializes");
    assert_eq!(json_a, json_b, "snapshots must be byte-identical");
    assert_eq!(snapshot_a, snapshot_b);
}

/// Connection stats over the active base, defaulting one screen.
#[test]
fn connection_stats_default_to_one_screen() {
    let input = CategoryInput {
        active: vec![
            record(json!({"Max_Conexoes": 3})),
            record(json!({"Max_Conexoes": 1})),
            record(json!({})),
        ],
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");
    assert_eq!(snapshot.max_connections, 3);
    assert!((snapshot.average_connections - 5.0 / 3.0).abs() < 1e-9);
    assert_eq!(snapshot.connections.len(), 2);
}

/// Reseller ranking over tests, direct sales as the default bucket.
#[test]
fn reseller_ranking_counts_tests() {
    let input = CategoryInput {
        tests: vec![
            record(json!({"Revendedor": "Loja A"})),
            record(json!({"Revendedor": "Loja A"})),
            record(json!({})),
        ],
        ..CategoryInput::default()
    };

    let snapshot = engine().aggregate(&input).expect("aggregation succeeds");
    assert_eq!(snapshot.top_resellers[0].reseller, "Loja A");
    assert_eq!(snapshot.top_resellers[0].count, 2);
    assert_eq!(snapshot.top_resellers[1].reseller, "Direto");
}

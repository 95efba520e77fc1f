//! dash-runner: headless metrics runner for the reseller dashboard.
//!
//! Usage:
//!   dash-runner --input panel.json --db cache.db
//!   dash-runner --demo --seed 42 --json
//!   dash-runner --from-cache --db cache.db

use anyhow::Result;
use chrono::{DateTime, Utc};
use painel_core::{
    clock::{Clock, FixedClock, SystemClock},
    config::EngineConfig,
    engine::{CategoryInput, MetricsEngine},
    snapshot::MetricsSnapshot,
};
use std::env;

mod cache;
mod sample;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let demo = args.iter().any(|a| a == "--demo");
    let emit_json = args.iter().any(|a| a == "--json");
    let from_cache = args.iter().any(|a| a == "--from-cache");
    let input_path = flag_value(&args, "--input");
    let config_path = flag_value(&args, "--config");
    let db_path = flag_value(&args, "--db");
    let now_arg = flag_value(&args, "--now");

    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let now_utc: DateTime<Utc> = match now_arg {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| anyhow::anyhow!("--now must be RFC 3339: {e}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let clock: Box<dyn Clock> = match now_arg {
        Some(_) => Box::new(FixedClock(now_utc)),
        None => Box::new(SystemClock),
    };

    let engine = MetricsEngine::new(config, clock)?;

    let input = load_input(demo, seed, now_utc, from_cache, input_path, db_path)?;

    if !emit_json {
        println!("dash-runner");
        println!("  tests:       {}", input.tests.len());
        println!("  conversions: {}", input.conversions.len());
        println!("  renewals:    {}", input.renewals.len());
        println!("  active:      {}", input.active.len());
        println!("  expired:     {}", input.expired.len());
        println!();
    }

    let snapshot = engine.aggregate(&input)?;

    if emit_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&snapshot);
    }

    // Persist a capped copy plus the derived snapshot, unless this run
    // itself came from the cache.
    if let (Some(db), false) = (db_path, from_cache) {
        let mut store = cache::CacheStore::open(db)?;
        store.migrate()?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let saved_at = now_utc.to_rfc3339();
        store.save_dataset(&run_id, &saved_at, &input)?;
        store.save_snapshot(&run_id, &saved_at, &snapshot)?;
        log::info!("saved run {run_id} to {db}");
    }

    Ok(())
}

fn load_input(
    demo: bool,
    seed: u64,
    now_utc: DateTime<Utc>,
    from_cache: bool,
    input_path: Option<&str>,
    db_path: Option<&str>,
) -> Result<CategoryInput> {
    if from_cache {
        let db = db_path
            .ok_or_else(|| anyhow::anyhow!("--from-cache requires --db <path>"))?;
        let store = cache::CacheStore::open(db)?;
        store.migrate()?;
        let run_id = store
            .latest_run_id()?
            .ok_or_else(|| anyhow::anyhow!("cache at {db} holds no runs"))?;
        log::info!("replaying cached run {run_id}");
        return store.load_dataset(&run_id);
    }

    if demo {
        log::info!("generating demo dataset (seed {seed})");
        return Ok(sample::generate(seed, now_utc));
    }

    let path = input_path.ok_or_else(|| {
        anyhow::anyhow!("provide --input <file.json>, --demo, or --from-cache (see --help)")
    })?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let input: CategoryInput = serde_json::from_str(&content)?;
    Ok(input)
}

fn print_summary(s: &MetricsSnapshot) {
    println!("=== METRICS SUMMARY ===");
    println!("  tests:           {}", s.tests);
    println!("  conversions:     {} ({:.1}%)", s.conversions, s.conversion_rate_pct);
    println!("  renewals:        {}", s.renewals);
    println!("  active clients:  {}", s.active_clients);
    println!("  expired clients: {}", s.expired_clients);
    println!("  churn:           {:.1}%", s.churn_rate_pct);
    println!("  retention:       {:.1}%", s.retention_rate_pct);
    println!("  fidelity:        {:.1}%", s.fidelity_rate_pct);

    println!();
    println!("=== FINANCIAL SUMMARY ===");
    println!("  revenue:        R$ {:.2}", s.revenue_total);
    println!("  average ticket: R$ {:.2}", s.average_ticket);
    println!("  MRR:            R$ {:.2}", s.monthly_recurring_revenue);
    println!("  ARR:            R$ {:.2}", s.annual_recurring_revenue);
    println!("  LTV:            R$ {:.2}", s.ltv);
    println!("  CAC:            R$ {:.2}", s.cac);
    println!("  ROAS:           {:.2}", s.roas);
    println!("  profit:         R$ {:.2}", s.profit_total);

    println!();
    println!("=== ENGAGEMENT ===");
    println!("  best day:   {} ({} conversions)", s.best_day, s.best_day_count);
    println!("  best shift: {} ({} conversions)", s.best_shift, s.best_shift_count);
    println!(
        "  median days to conversion: {:.0}",
        s.median_days_to_conversion
    );
    println!("  states covered: {}", s.states_covered);
    for state in s.top_states.iter().take(5) {
        println!(
            "    {} | {} clients ({:.1}%)",
            state.state, state.total, state.share_pct
        );
    }

    if !s.retention_curve_estimate.is_empty() {
        println!();
        println!("=== RETENTION CURVE (estimate) ===");
        for point in &s.retention_curve_estimate {
            println!(
                "  month {:>2}: {:>5.1}% ({}/{} clients)",
                point.month, point.rate_pct, point.retained, point.eligible
            );
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

//! Deterministic demo dataset generator.
//!
//! Same seed + same base instant = same dataset, so demo runs are
//! reproducible end to end. Output rows deliberately mix the column
//! spellings and date formats real panel exports mix, exercising the
//! alias resolver and both date grammars.

use chrono::{DateTime, Duration, Utc};
use painel_core::{engine::CategoryInput, record::RawRecord};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde_json::{json, Value};

const DDD_POOL: [&str; 10] = ["11", "21", "31", "41", "47", "51", "61", "71", "81", "85"];
const COST_TIERS: [f64; 6] = [1.0, 1.0, 1.0, 2.0, 3.0, 6.0];
const RESELLERS: [&str; 4] = ["Loja Centro", "Loja Norte", "Revenda Sul", "Parceiro Web"];

const TEST_COUNT: usize = 400;
const CONVERSION_RATE: f64 = 0.30;

/// Deterministic RNG for demo data, one stream per run.
struct DemoRng {
    inner: Pcg64Mcg,
}

impl DemoRng {
    fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    fn below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len() as u64) as usize]
    }
}

/// Build a demo dataset anchored to `base` (dates run up to ~180 days
/// back from it).
pub fn generate(seed: u64, base: DateTime<Utc>) -> CategoryInput {
    let mut rng = DemoRng::new(seed);
    let mut input = CategoryInput::default();

    for _ in 0..TEST_COUNT {
        let phone = phone(&mut rng);
        let tested_at = base - Duration::minutes(rng.below(180 * 24 * 60) as i64);

        let mut test = serde_json::Map::new();
        test.insert("Usuario".into(), json!(phone));
        test.insert("Criado_Em".into(), date_value(&mut rng, &tested_at));
        if rng.chance(0.6) {
            test.insert("Revendedor".into(), json!(rng.pick(&RESELLERS)));
        }
        input.tests.push(RawRecord(test));

        if !rng.chance(CONVERSION_RATE) {
            continue;
        }

        // Conversion lands 0-14 days after the test.
        let converted_at = tested_at + Duration::minutes(rng.below(14 * 24 * 60) as i64);
        let cost = *rng.pick(&COST_TIERS);
        let mut conversion = serde_json::Map::new();
        conversion.insert("Usuario".into(), json!(phone));
        conversion.insert("Data".into(), date_value(&mut rng, &converted_at));
        conversion.insert("Custo".into(), json!(cost));
        conversion.insert("Creditos_Apos".into(), json!(rng.below(20)));
        input.conversions.push(RawRecord(conversion));

        // Renewals roughly monthly after the conversion.
        let renewal_count = rng.below(5);
        for k in 1..=renewal_count {
            let renewed_at = converted_at
                + Duration::days(30 * k as i64)
                + Duration::hours(rng.below(72) as i64)
                - Duration::hours(36);
            if renewed_at > base {
                break;
            }
            let mut renewal = serde_json::Map::new();
            renewal.insert("Usuario".into(), json!(phone));
            renewal.insert("Data".into(), date_value(&mut rng, &renewed_at));
            renewal.insert("Custo".into(), json!(cost));
            input.renewals.push(RawRecord(renewal));
        }

        // Converted users split into the active and expired bases.
        if rng.chance(0.6) {
            let mut active = serde_json::Map::new();
            active.insert("Usuario".into(), json!(phone));
            active.insert("Criado_Em".into(), date_value(&mut rng, &converted_at));
            active.insert("Max_Conexoes".into(), json!(1 + rng.below(3)));
            input.active.push(RawRecord(active));
        } else {
            let expires_at = base - Duration::minutes(rng.below(90 * 24 * 60) as i64);
            let mut expired = serde_json::Map::new();
            expired.insert("Usuario".into(), json!(phone));
            expired.insert("Expira_Em".into(), date_value(&mut rng, &expires_at));
            input.expired.push(RawRecord(expired));
        }
    }

    input
}

/// A Brazilian mobile number: 55 + DDD + 9 + eight digits.
fn phone(rng: &mut DemoRng) -> String {
    format!("55{}9{:08}", rng.pick(&DDD_POOL), rng.below(100_000_000))
}

/// Render a date the way exports do: sometimes Brazilian wall clock,
/// sometimes ISO UTC, occasionally a spreadsheet serial.
fn date_value(rng: &mut DemoRng, dt: &DateTime<Utc>) -> Value {
    match rng.below(4) {
        0 => json!(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        1 => {
            let serial_epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)
                .expect("valid epoch")
                .and_hms_opt(0, 0, 0)
                .expect("valid epoch time");
            let serial =
                (dt.naive_utc() - serial_epoch).num_seconds() as f64 / 86_400.0;
            json!((serial * 10_000.0).round() / 10_000.0)
        }
        _ => json!(dt.format("%d/%m/%Y %H:%M").to_string()),
    }
}

//! SQLite local cache for panel datasets and derived snapshots.
//!
//! RULE: Only cache.rs talks to the database. The engine never sees
//! SQL; it re-aggregates whatever capped copy this module hands back.
//!
//! Each saved run stores a size-capped slice of the five category
//! arrays plus the snapshot derived from the full dataset. Reloading a
//! capped run through the engine yields smaller aggregates, which the
//! engine's contract explicitly tolerates.

use anyhow::Result;
use painel_core::{engine::CategoryInput, record::RawRecord, snapshot::MetricsSnapshot};
use rusqlite::{params, Connection};

/// Records kept per category per run.
pub const CATEGORY_CAP: usize = 1000;

const CATEGORIES: [&str; 5] = ["testes", "conversoes", "renovacoes", "ativos", "expirados"];

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dataset (
    run_id   TEXT    NOT NULL,
    category TEXT    NOT NULL,
    position INTEGER NOT NULL,
    payload  TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dataset_run ON dataset(run_id, category, position);

CREATE TABLE IF NOT EXISTS run (
    run_id   TEXT PRIMARY KEY,
    saved_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshot (
    run_id     TEXT PRIMARY KEY,
    saved_at   TEXT NOT NULL,
    state_json TEXT NOT NULL
);
";

pub struct CacheStore {
    conn: Connection,
}

impl CacheStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// In-memory cache, used in tests.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Persist a capped copy of the dataset under `run_id`.
    pub fn save_dataset(
        &mut self,
        run_id: &str,
        saved_at: &str,
        input: &CategoryInput,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO run (run_id, saved_at) VALUES (?1, ?2)",
            params![run_id, saved_at],
        )?;

        let slices: [(&str, &[RawRecord]); 5] = [
            ("testes", &input.tests),
            ("conversoes", &input.conversions),
            ("renovacoes", &input.renewals),
            ("ativos", &input.active),
            ("expirados", &input.expired),
        ];
        for (category, records) in slices {
            let kept = records.len().min(CATEGORY_CAP);
            if kept < records.len() {
                log::info!(
                    "cache: capping {category} at {kept} of {} records",
                    records.len()
                );
            }
            for (position, record) in records.iter().take(CATEGORY_CAP).enumerate() {
                tx.execute(
                    "INSERT INTO dataset (run_id, category, position, payload)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        run_id,
                        category,
                        position as i64,
                        serde_json::to_string(record)?
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recently saved run, if any.
    pub fn latest_run_id(&self) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT run_id FROM run ORDER BY saved_at DESC, run_id DESC LIMIT 1")?;
        let run_id = stmt.query_row([], |row| row.get::<_, String>(0)).ok();
        Ok(run_id)
    }

    /// Reload the capped dataset for a run.
    pub fn load_dataset(&self, run_id: &str) -> Result<CategoryInput> {
        let mut input = CategoryInput::default();
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM dataset
             WHERE run_id = ?1 AND category = ?2
             ORDER BY position ASC",
        )?;

        for category in CATEGORIES {
            let records = stmt
                .query_map(params![run_id, category], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?
                .into_iter()
                .filter_map(|payload| serde_json::from_str::<RawRecord>(&payload).ok())
                .collect();
            match category {
                "testes" => input.tests = records,
                "conversoes" => input.conversions = records,
                "renovacoes" => input.renewals = records,
                "ativos" => input.active = records,
                "expirados" => input.expired = records,
                _ => unreachable!(),
            }
        }
        Ok(input)
    }

    /// Persist the derived snapshot alongside its run.
    pub fn save_snapshot(
        &self,
        run_id: &str,
        saved_at: &str,
        snapshot: &MetricsSnapshot,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot (run_id, saved_at, state_json)
             VALUES (?1, ?2, ?3)",
            params![run_id, saved_at, serde_json::to_string(snapshot)?],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: serde_json::Value) -> RawRecord {
        match fields {
            serde_json::Value::Object(map) => RawRecord(map),
            _ => panic!("test records must be JSON objects"),
        }
    }

    #[test]
    fn dataset_round_trips_through_cache() {
        let mut cache = CacheStore::in_memory().unwrap();
        cache.migrate().unwrap();

        let input = CategoryInput {
            tests: vec![record(json!({"Usuario": "5511987654321"}))],
            conversions: vec![record(json!({"Custo": 3}))],
            ..CategoryInput::default()
        };
        cache.save_dataset("run-1", "2024-06-15T12:00:00Z", &input).unwrap();

        assert_eq!(cache.latest_run_id().unwrap().as_deref(), Some("run-1"));
        let loaded = cache.load_dataset("run-1").unwrap();
        assert_eq!(loaded.tests, input.tests);
        assert_eq!(loaded.conversions, input.conversions);
        assert!(loaded.renewals.is_empty());
    }

    #[test]
    fn oversized_categories_are_capped() {
        let mut cache = CacheStore::in_memory().unwrap();
        cache.migrate().unwrap();

        let input = CategoryInput {
            tests: (0..CATEGORY_CAP + 50)
                .map(|i| record(json!({ "Usuario": format!("user-{i}") })))
                .collect(),
            ..CategoryInput::default()
        };
        cache.save_dataset("run-2", "2024-06-15T12:00:00Z", &input).unwrap();

        let loaded = cache.load_dataset("run-2").unwrap();
        assert_eq!(loaded.tests.len(), CATEGORY_CAP);
    }
}

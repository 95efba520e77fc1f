//! Engine configuration and injected reference data.
//!
//! Everything the aggregation passes look up — field alias lists, the
//! DDD reference table, the plan price list, the per-credit cost, the
//! timezone offset — lives here so it can be replaced from a JSON file
//! without touching aggregation code. `EngineConfig::default()` carries
//! the real Brazilian tables; `load()` reads a full or partial override
//! file.

use crate::{
    dates::DEFAULT_TZ_OFFSET_MINUTES,
    error::{EngineError, EngineResult},
    geo::AreaCodeTable,
    plans::PlanTable,
};
use serde::{Deserialize, Serialize};

/// Ordered candidate key names for each logical field. New spellings
/// from a new export format are added here, not at resolution sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAliases {
    pub user: Vec<String>,
    pub created_at: Vec<String>,
    pub event_date: Vec<String>,
    pub expires_at: Vec<String>,
    pub cost: Vec<String>,
    pub credits_after: Vec<String>,
    pub state: Vec<String>,
    pub area_code: Vec<String>,
    pub reseller: Vec<String>,
    pub connections: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        let list = |keys: &[&str]| keys.iter().map(|k| k.to_string()).collect();
        Self {
            user: list(&["Usuario", "usuario"]),
            created_at: list(&["CRIADO_DT", "Criado_Em", "Criado", "criado_em", "criado"]),
            event_date: list(&["DT", "LOG_DT", "Data", "data"]),
            expires_at: list(&["EXPIRA_DT", "Expira_Em", "Expira", "expira_em", "expira"]),
            cost: list(&["Custo", "custo"]),
            credits_after: list(&["Creditos_Apos", "creditos_apos"]),
            state: list(&["UF", "uf"]),
            area_code: list(&["DDD", "ddd"]),
            reseller: list(&["Revendedor", "revendedor"]),
            connections: list(&["Max_Conexoes", "max_conexoes", "conexoes"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minutes east of UTC for wall-clock interpretation. São Paulo.
    pub tz_offset_minutes: i32,
    /// What the reseller pays the panel per credit, in the base
    /// currency. Drives acquisition cost, ROAS and profit.
    pub cost_per_credit: f64,
    /// Renewals required before a client counts as loyal.
    pub loyalty_min_renewals: u64,
    /// Size of the recent-clients slice in the snapshot.
    pub recent_clients_limit: usize,
    /// Horizon of the retention curve estimate, in months.
    pub retention_curve_months: u32,
    /// States listed in the top-states ranking.
    pub top_states_limit: usize,
    /// Resellers listed in the top-resellers ranking.
    pub top_resellers_limit: usize,
    pub aliases: FieldAliases,
    pub plans: PlanTable,
    pub area_codes: AreaCodeTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tz_offset_minutes: DEFAULT_TZ_OFFSET_MINUTES,
            cost_per_credit: 10.0,
            loyalty_min_renewals: 2,
            recent_clients_limit: 10,
            retention_curve_months: 12,
            top_states_limit: 10,
            top_resellers_limit: 10,
            aliases: FieldAliases::default(),
            plans: PlanTable::standard(),
            area_codes: AreaCodeTable::brazil(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Fields absent from the file keep their
    /// defaults, so a partial override (say, just a new plan table) is
    /// a small document.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Structural checks on injected reference data. Per-record data
    /// problems are never errors; a broken reference table is.
    pub fn validate(&self) -> EngineResult<()> {
        if self.plans.tiers.is_empty() {
            return Err(EngineError::ReferenceData("plan table is empty".into()));
        }
        if !self.plans.has_fallback() {
            return Err(EngineError::ReferenceData(
                "plan table has no monthly fallback tier".into(),
            ));
        }
        if self.area_codes.is_empty() {
            return Err(EngineError::ReferenceData(
                "area-code table is empty".into(),
            ));
        }
        if self.cost_per_credit < 0.0 {
            return Err(EngineError::ReferenceData(
                "cost_per_credit must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

//! Untyped input rows and alias-based field resolution.
//!
//! Panel exports are inconsistent about column names: the same logical
//! field arrives as `Usuario` or `usuario`, `Criado_Em` or `CRIADO_DT`,
//! depending on which export produced the row. A RawRecord is the raw
//! key/value map exactly as received; the resolver walks an ordered
//! alias list and returns the first key that is present and non-empty.
//!
//! RULE: The untyped shape never crosses the normalization boundary.
//! Aggregation code works on resolved values, not on RawRecord keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row from a panel export, schema unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// First alias present in the row whose value is not null and not an
    /// empty string. Never panics, never errors.
    pub fn resolve<'a>(&'a self, aliases: &[String]) -> Option<&'a Value> {
        for alias in aliases {
            match self.0.get(alias) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) if s.trim().is_empty() => continue,
                Some(v) => return Some(v),
            }
        }
        None
    }

    /// Resolved value as a string. Numbers are rendered with
    /// `to_string()` so numeric user columns still resolve.
    pub fn resolve_str(&self, aliases: &[String]) -> Option<String> {
        match self.resolve(aliases)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Resolved value as f64: JSON numbers directly, strings via a
    /// lenient parse (`"1,5"` is accepted as 1.5 — panel exports use
    /// the Brazilian decimal comma).
    pub fn resolve_f64(&self, aliases: &[String]) -> Option<f64> {
        match self.resolve(aliases)? {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => {
                let normalized = s.trim().replace(',', ".");
                normalized.parse::<f64>().ok().filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    /// Resolved numeric value with the missing-field fallback of 0.0.
    /// The invariant callers rely on: never NaN, never negative input
    /// left unguarded downstream.
    pub fn number(&self, aliases: &[String]) -> f64 {
        self.resolve_f64(aliases).unwrap_or(0.0)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

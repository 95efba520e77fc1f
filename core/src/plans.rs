//! Cost-tier → plan mapping.
//!
//! The `Custo` column in sale records is the number of panel credits
//! spent (1, 1.5, 2, 3, 6, 12), not money. Revenue figures therefore
//! substitute the canonical tier price for the raw cost code — a sale
//! recorded as cost 3 is a Trimestral worth its average price, whatever
//! the reseller actually charged.

use serde::{Deserialize, Serialize};

/// Canonical plan identity for a cost tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInfo {
    pub name: String,
    pub average_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTier {
    pub cost: f64,
    pub name: String,
    pub average_price: f64,
}

/// Injected tier table. The band rule (costs in [1.5, 2] are the
/// two-screen plan) and the monthly fallback are fixed policy; the
/// tiers themselves are reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTable {
    pub tiers: Vec<PlanTier>,
}

const TWO_SCREEN_BAND: (f64, f64) = (1.5, 2.0);
const FALLBACK_COST: f64 = 1.0;

impl PlanTable {
    /// The reseller's current price list.
    pub fn standard() -> Self {
        let tier = |cost: f64, name: &str, average_price: f64| PlanTier {
            cost,
            name: name.to_string(),
            average_price,
        };
        Self {
            tiers: vec![
                tier(1.0, "Mensal", 30.0),
                tier(1.5, "2 Telas", 50.0),
                tier(2.0, "2 Telas", 50.0),
                tier(3.0, "Trimestral", 75.0),
                tier(6.0, "Semestral", 150.0),
                tier(12.0, "Anual", 280.0),
            ],
        }
    }

    /// Map a raw cost value to its plan. Exact tier first, then the
    /// two-screen band, then the monthly fallback. Every cost maps to
    /// exactly one plan.
    pub fn map(&self, cost: f64) -> PlanInfo {
        if let Some(tier) = self.exact(cost) {
            return tier;
        }
        let (lo, hi) = TWO_SCREEN_BAND;
        if cost >= lo && cost <= hi {
            if let Some(tier) = self.exact(hi) {
                return tier;
            }
        }
        if let Some(tier) = self.exact(FALLBACK_COST) {
            return tier;
        }
        // Validated tables always contain the fallback tier; an
        // unvalidated empty table still must not panic.
        log::warn!("plan table has no fallback tier; cost {cost} mapped to empty plan");
        PlanInfo {
            name: String::new(),
            average_price: 0.0,
        }
    }

    fn exact(&self, cost: f64) -> Option<PlanInfo> {
        self.tiers
            .iter()
            .find(|t| (t.cost - cost).abs() < 1e-9)
            .map(|t| PlanInfo {
                name: t.name.clone(),
                average_price: t.average_price,
            })
    }

    pub fn has_fallback(&self) -> bool {
        self.tiers.iter().any(|t| (t.cost - FALLBACK_COST).abs() < 1e-9)
    }
}

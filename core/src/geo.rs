//! Phone-derived geography: DDD area code → state → region.
//!
//! Subscriber identifiers in panel exports are usually Brazilian phone
//! numbers (`5511987654321` or `11987654321`). The resolver strips
//! non-digits, peels the optional `55` country prefix, and looks the
//! two-digit DDD up in an injected reference table. A number that does
//! not resolve still counts toward category totals — it is only left
//! out of the geographic breakdowns.

use crate::types::StateCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geography derived for a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub area_code: String,
    pub state: StateCode,
    pub region_code: String,
    pub region_name: String,
    pub is_valid: bool,
}

impl GeoInfo {
    /// Placeholder for a record whose geography could not be resolved.
    pub fn unknown(area_code: impl Into<String>) -> Self {
        Self {
            area_code: area_code.into(),
            state: String::new(),
            region_code: String::new(),
            region_name: String::new(),
            is_valid: false,
        }
    }
}

/// DDD → UF → region reference table. Injected so it can be replaced
/// from a JSON file and unit-tested apart from the resolver logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaCodeTable {
    /// Two-digit DDD → two-letter state code.
    pub area_to_state: BTreeMap<String, StateCode>,
    /// State code → region code (N, NE, CO, SE, S).
    pub state_to_region: BTreeMap<StateCode, String>,
    /// Region code → display name.
    pub region_names: BTreeMap<String, String>,
}

impl AreaCodeTable {
    /// The real Brazilian numbering plan. Covers assigned DDDs only,
    /// not the full 11–99 numeric range.
    pub fn brazil() -> Self {
        let area_to_state: BTreeMap<String, StateCode> = [
            // São Paulo
            ("11", "SP"), ("12", "SP"), ("13", "SP"), ("14", "SP"), ("15", "SP"),
            ("16", "SP"), ("17", "SP"), ("18", "SP"), ("19", "SP"),
            // Rio de Janeiro
            ("21", "RJ"), ("22", "RJ"), ("24", "RJ"),
            // Espírito Santo
            ("27", "ES"), ("28", "ES"),
            // Minas Gerais
            ("31", "MG"), ("32", "MG"), ("33", "MG"), ("34", "MG"), ("35", "MG"),
            ("37", "MG"), ("38", "MG"),
            // Paraná
            ("41", "PR"), ("42", "PR"), ("43", "PR"), ("44", "PR"), ("45", "PR"),
            ("46", "PR"),
            // Santa Catarina
            ("47", "SC"), ("48", "SC"), ("49", "SC"),
            // Rio Grande do Sul
            ("51", "RS"), ("53", "RS"), ("54", "RS"), ("55", "RS"),
            // Distrito Federal e Goiás
            ("61", "DF"), ("62", "GO"), ("64", "GO"),
            // Tocantins
            ("63", "TO"),
            // Mato Grosso e Mato Grosso do Sul
            ("65", "MT"), ("66", "MT"), ("67", "MS"),
            // Acre
            ("68", "AC"),
            // Rondônia
            ("69", "RO"),
            // Bahia
            ("71", "BA"), ("73", "BA"), ("74", "BA"), ("75", "BA"), ("77", "BA"),
            // Sergipe
            ("79", "SE"),
            // Pernambuco
            ("81", "PE"), ("87", "PE"),
            // Alagoas
            ("82", "AL"),
            // Paraíba
            ("83", "PB"),
            // Rio Grande do Norte
            ("84", "RN"),
            // Ceará
            ("85", "CE"), ("88", "CE"),
            // Piauí
            ("86", "PI"), ("89", "PI"),
            // Pará
            ("91", "PA"), ("93", "PA"), ("94", "PA"),
            // Amazonas
            ("92", "AM"), ("97", "AM"),
            // Roraima
            ("95", "RR"),
            // Amapá
            ("96", "AP"),
            // Maranhão
            ("98", "MA"), ("99", "MA"),
        ]
        .into_iter()
        .map(|(ddd, uf)| (ddd.to_string(), uf.to_string()))
        .collect();

        let state_to_region: BTreeMap<StateCode, String> = [
            ("AC", "N"), ("AP", "N"), ("AM", "N"), ("PA", "N"), ("RO", "N"),
            ("RR", "N"), ("TO", "N"),
            ("AL", "NE"), ("BA", "NE"), ("CE", "NE"), ("MA", "NE"), ("PB", "NE"),
            ("PE", "NE"), ("PI", "NE"), ("RN", "NE"), ("SE", "NE"),
            ("DF", "CO"), ("GO", "CO"), ("MT", "CO"), ("MS", "CO"),
            ("ES", "SE"), ("MG", "SE"), ("RJ", "SE"), ("SP", "SE"),
            ("PR", "S"), ("RS", "S"), ("SC", "S"),
        ]
        .into_iter()
        .map(|(uf, region)| (uf.to_string(), region.to_string()))
        .collect();

        let region_names: BTreeMap<String, String> = [
            ("N", "Norte"),
            ("NE", "Nordeste"),
            ("CO", "Centro-Oeste"),
            ("SE", "Sudeste"),
            ("S", "Sul"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            area_to_state,
            state_to_region,
            region_names,
        }
    }

    /// Two-digit DDD from a phone-like string, validated against the
    /// table. `55`-prefixed numbers use digits [2..4], everything else
    /// the leading two digits.
    pub fn extract_area_code(&self, phone_like: &str) -> Option<String> {
        let digits: String = phone_like.chars().filter(|c| c.is_ascii_digit()).collect();

        let code = if digits.starts_with("55") && digits.len() >= 4 {
            &digits[2..4]
        } else if digits.len() >= 2 {
            &digits[0..2]
        } else {
            return None;
        };

        if self.area_to_state.contains_key(code) {
            Some(code.to_string())
        } else {
            None
        }
    }

    /// Full geography for a phone-like string. Always returns a value;
    /// an unresolvable input yields `is_valid == false`.
    pub fn resolve(&self, phone_like: &str) -> GeoInfo {
        match self.extract_area_code(phone_like) {
            Some(code) => self.from_area_code(&code),
            None => GeoInfo::unknown(""),
        }
    }

    /// Geography for an already-known DDD (exports sometimes carry an
    /// explicit DDD column that takes priority over the phone number).
    pub fn from_area_code(&self, code: &str) -> GeoInfo {
        let Some(state) = self.area_to_state.get(code) else {
            return GeoInfo::unknown(code);
        };
        let region_code = self
            .state_to_region
            .get(state)
            .cloned()
            .unwrap_or_default();
        let region_name = self
            .region_names
            .get(&region_code)
            .cloned()
            .unwrap_or_default();
        GeoInfo {
            area_code: code.to_string(),
            state: state.clone(),
            region_code,
            region_name,
            is_valid: true,
        }
    }

    /// Region code for a state, when the export carries an explicit UF
    /// column instead of a phone number.
    pub fn region_of_state(&self, state: &str) -> Option<&str> {
        self.state_to_region.get(state).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.area_to_state.is_empty()
    }
}

//! Gazetteer reference data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A gazetteer entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: u32,
    pub name: String,
    /// Canonical comma-separated name, most specific level first.
    pub full_name: String,
    #[serde(default)]
    pub alt_names: Vec<String>,
    /// Parent place; 0 for a country.
    #[serde(default)]
    pub located_in_id: u32,
    #[serde(default)]
    pub also_located_in_ids: Vec<u32>,
    /// 1 for a country, increasing with specificity.
    pub level: u32,
    pub country_id: u32,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Popularity used to break ties.
    #[serde(default)]
    pub count: u32,
}

impl Place {
    /// Parents of this place, primary parent first.
    pub fn parent_ids(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.located_in_id)
            .chain(self.also_located_in_ids.iter().copied())
            .filter(|id| *id != 0)
    }
}

/// A normalized word and the places whose names contain it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaceWord {
    pub word: String,
    pub ids: Vec<u32>,
}

/// Tenant-wide settings that tune place standardization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSettings {
    /// Lowercase abbreviation → expansion (e.g. `co` → `county`, `al` → `alabama`).
    #[serde(default)]
    pub abbreviations: BTreeMap<String, String>,
    /// Words naming a jurisdiction type (`county`, `parish`, ...).
    #[serde(default)]
    pub type_words: Vec<String>,
    /// Words ignored entirely (`of`, `the`, ...).
    #[serde(default)]
    pub noise_words: Vec<String>,
    #[serde(default)]
    pub large_country_ids: Vec<u32>,
    #[serde(default)]
    pub medium_country_ids: Vec<u32>,
    /// Per-level weights, indexed by `level - 1`, for each country size class.
    #[serde(default)]
    pub large_level_weights: Vec<f64>,
    #[serde(default)]
    pub medium_level_weights: Vec<f64>,
    #[serde(default)]
    pub small_level_weights: Vec<f64>,
    #[serde(default)]
    pub primary_match_weight: f64,
    #[serde(rename = "usCountryId", default)]
    pub us_country_id: u32,
}

impl PlaceSettings {
    /// Weight of a place level given its country's size class.
    pub fn level_weight(&self, country_id: u32, level: u32) -> f64 {
        let weights = if self.large_country_ids.contains(&country_id) {
            &self.large_level_weights
        } else if self.medium_country_ids.contains(&country_id) {
            &self.medium_level_weights
        } else {
            &self.small_level_weights
        };
        let index = level.saturating_sub(1) as usize;
        weights
            .get(index)
            .or_else(|| weights.last())
            .copied()
            .unwrap_or(0.0)
    }
}

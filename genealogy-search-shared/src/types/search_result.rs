//! Search result types.
//!
//! This module defines the response structures returned from genealogical searches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::roles::{EventType, Relative, Role};

/// An event shown on a hit (`{type, date, place}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

/// A relative named on a hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRelationship {
    #[serde(rename = "type")]
    pub relative: Relative,
    pub name: String,
}

/// The person a hit describes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchPerson {
    pub name: String,
    pub role: Role,
    pub events: Vec<SearchEvent>,
    pub relationships: Vec<SearchRelationship>,
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Document ID (`<recordID>[_<suffix>]`).
    pub id: String,
    pub score: f64,
    pub collection_id: u32,
    pub collection_name: String,
    pub person: SearchPerson,
    /// Raw record columns; only present on lookups by ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<BTreeMap<String, String>>,
    /// Image path of the record; only present on lookups by ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// One bucket of a terms facet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFacetBucket {
    pub label: String,
    pub count: u64,
}

/// A facet with its buckets, ordered by descending count.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFacet {
    pub buckets: Vec<SearchFacetBucket>,
}

/// Complete search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Total number of matching documents; may exceed `hits.len()` due to paging.
    pub total: u64,
    pub max_score: f64,
    pub hits: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, SearchFacet>,
}

impl SearchResult {
    /// Create an empty search result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result() {
        let result = SearchResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.total, 0);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("facets").is_none());
        assert_eq!(json["maxScore"], 0.0);
    }

    #[test]
    fn test_hit_wire_shape() {
        let hit = SearchHit {
            id: "12_s".to_string(),
            score: 1.5,
            collection_id: 3,
            collection_name: "Marriages".to_string(),
            person: SearchPerson {
                name: "Wilma Flintstone".to_string(),
                role: Role::Spouse,
                events: vec![SearchEvent {
                    event_type: EventType::Marriage,
                    date: Some("1920".to_string()),
                    place: None,
                }],
                relationships: vec![SearchRelationship {
                    relative: Relative::Spouse,
                    name: "Fred Flintstone".to_string(),
                }],
            },
            record: None,
            image_path: None,
        };

        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["collectionId"], 3);
        assert_eq!(json["person"]["role"], "spouse");
        assert_eq!(json["person"]["events"][0]["type"], "marriage");
        assert!(json["person"]["events"][0].get("place").is_none());
        assert_eq!(json["person"]["relationships"][0]["type"], "spouse");
        assert!(json.get("record").is_none());
    }
}

//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the genealogical records index.

use serde_json::{json, Map, Value};

use genealogy_search_shared::{EventType, Relative};

/// Configuration for the search index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The alias name for the search index (used for all operations).
    pub alias: String,
    /// The version number for the index (e.g., 0 for "records_v0").
    pub version: u32,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `alias` - The index alias name
    /// * `version` - The version number
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// The concrete index behind the alias (e.g. "records_v0").
    pub fn versioned_index_name(&self) -> String {
        format!("{}_v{}", self.alias, self.version)
    }
}

/// Levels of accumulated place prefixes stored per event.
const PLACE_LEVELS: usize = 4;
/// Levels of collection location facets.
const COLLECTION_PLACE_LEVELS: usize = 3;

fn name_field() -> Value {
    json!({
        "type": "text",
        "analyzer": "name_text",
        "fields": {
            "narrow": { "type": "text", "analyzer": "name_narrow" },
            "broad": { "type": "text", "analyzer": "name_broad" }
        }
    })
}

/// Get the index settings and mappings for the records index.
///
/// The configuration includes:
/// - **Name fields**: folded text with `narrow` (double metaphone) and `broad`
///   (Beider-Morse) phonetic subfields
/// - **Place levels and facets**: keyword fields matched by exact term
/// - **Dates and years**: integer fields for term and range queries
///
/// The `name_narrow`/`name_broad` analyzers require the analysis-phonetic plugin.
///
/// # Arguments
///
/// * `alias` - Alias attached to the new index
pub fn get_index_settings(alias: &str) -> Value {
    let mut properties = Map::new();

    properties.insert("given".to_string(), name_field());
    properties.insert("surname".to_string(), name_field());
    for relative in Relative::ALL {
        properties.insert(format!("{}Given", relative.prefix()), name_field());
        properties.insert(format!("{}Surname", relative.prefix()), name_field());
    }

    for event in EventType::ALL {
        let prefix = event.prefix();
        properties.insert(
            format!("{}Place", prefix),
            json!({ "type": "text", "analyzer": "name_text" }),
        );
        for level in 1..=PLACE_LEVELS {
            properties.insert(format!("{}Place{}", prefix, level), json!({ "type": "keyword" }));
        }
        properties.insert(format!("{}DateStd", prefix), json!({ "type": "integer" }));
        properties.insert(format!("{}Year", prefix), json!({ "type": "integer" }));
    }

    for field in ["keywords", "book_title", "book_author"] {
        properties.insert(
            field.to_string(),
            json!({ "type": "text", "analyzer": "name_text" }),
        );
    }
    for field in ["post", "collectionId", "societyId"] {
        properties.insert(field.to_string(), json!({ "type": "integer" }));
    }
    for field in ["category", "collection", "privacy", "lastModified"] {
        properties.insert(field.to_string(), json!({ "type": "keyword" }));
    }
    for level in 1..=COLLECTION_PLACE_LEVELS {
        properties.insert(format!("collectionPlace{}", level), json!({ "type": "keyword" }));
    }

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "filter": {
                    "name_double_metaphone": {
                        "type": "phonetic",
                        "encoder": "double_metaphone",
                        "replace": true
                    },
                    "name_beider_morse": {
                        "type": "phonetic",
                        "encoder": "beider_morse",
                        "rule_type": "approx",
                        "name_type": "generic",
                        "languageset": ["any"]
                    }
                },
                "analyzer": {
                    "name_text": {
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding"]
                    },
                    "name_narrow": {
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding", "name_double_metaphone"]
                    },
                    "name_broad": {
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding", "name_beider_morse"]
                    }
                }
            }
        },
        "mappings": {
            "dynamic": false,
            "properties": properties
        },
        "aliases": {
            alias: {}
        }
    })
}

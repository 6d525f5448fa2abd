//! The searchable document emitted for one (record, role).
//!
//! Field names follow the index mapping exactly: `given`, `surname`,
//! `<relative>Given`/`<relative>Surname`, `<event>Place`, `<event>Place1..4`,
//! `<event>DateStd`, `<event>Year`, plus the collection and tenant fields. The document is
//! rendered to and read from the engine's `_source` JSON through [`IndexedDocument::to_source`]
//! and [`IndexedDocument::from_source`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::roles::{EventType, Relative};

/// Space-joined unique name tokens of one relative kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelativeNames {
    pub given: String,
    pub surname: String,
}

impl RelativeNames {
    pub fn is_empty(&self) -> bool {
        self.given.is_empty() && self.surname.is_empty()
    }
}

/// Indexed fields of one event type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    /// Place text as entered on the record.
    pub place: Option<String>,
    /// Accumulated place levels, least specific first (`<event>Place1..4`).
    pub place_levels: Vec<String>,
    pub date_std: Vec<i32>,
    pub year: Vec<i32>,
}

impl EventFields {
    pub fn is_empty(&self) -> bool {
        self.place.is_none() && self.date_std.is_empty()
    }
}

/// A single searchable document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedDocument {
    /// Document ID (`<recordID>` or `<recordID>_<suffix>`); not part of the source.
    pub id: String,
    pub given: String,
    pub surname: String,
    pub relatives: BTreeMap<Relative, RelativeNames>,
    pub events: BTreeMap<EventType, EventFields>,
    pub keywords: Option<String>,
    pub post: u32,
    pub category: Vec<String>,
    pub collection: String,
    pub collection_id: u32,
    pub society_id: u32,
    /// Collection location facets, least specific first (`collectionPlace1..3`).
    pub collection_places: Vec<String>,
    pub last_modified: String,
    pub privacy: Option<String>,
}

pub const PRIVACY_PUBLIC: &str = "public";
pub const MAX_PLACE_LEVELS: usize = 4;
pub const MAX_COLLECTION_PLACE_LEVELS: usize = 3;

fn insert_str(map: &mut Map<String, Value>, key: impl Into<String>, value: &str) {
    if !value.is_empty() {
        map.insert(key.into(), Value::String(value.to_string()));
    }
}

fn get_str(source: &Value, key: &str) -> Option<String> {
    source
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn get_ints(source: &Value, key: &str) -> Vec<i32> {
    match source.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_i64)
            .map(|v| v as i32)
            .collect(),
        Some(Value::Number(n)) => n.as_i64().map(|v| vec![v as i32]).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn get_strs(source: &Value, key: &str) -> Vec<String> {
    match source.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

impl IndexedDocument {
    /// Relative names of one kind, empty when absent.
    pub fn relative(&self, relative: Relative) -> RelativeNames {
        self.relatives.get(&relative).cloned().unwrap_or_default()
    }

    /// Render the engine `_source` body.
    pub fn to_source(&self) -> Value {
        let mut map = Map::new();
        insert_str(&mut map, "given", &self.given);
        insert_str(&mut map, "surname", &self.surname);

        for (relative, names) in &self.relatives {
            insert_str(&mut map, format!("{}Given", relative.prefix()), &names.given);
            insert_str(&mut map, format!("{}Surname", relative.prefix()), &names.surname);
        }

        for (event, fields) in &self.events {
            let prefix = event.prefix();
            if let Some(place) = &fields.place {
                insert_str(&mut map, format!("{}Place", prefix), place);
            }
            for (i, level) in fields.place_levels.iter().take(MAX_PLACE_LEVELS).enumerate() {
                insert_str(&mut map, format!("{}Place{}", prefix, i + 1), level);
            }
            if !fields.date_std.is_empty() {
                map.insert(format!("{}DateStd", prefix), fields.date_std.clone().into());
            }
            if !fields.year.is_empty() {
                map.insert(format!("{}Year", prefix), fields.year.clone().into());
            }
        }

        if let Some(keywords) = &self.keywords {
            insert_str(&mut map, "keywords", keywords);
        }
        map.insert("post".to_string(), self.post.into());
        map.insert("category".to_string(), self.category.clone().into());
        insert_str(&mut map, "collection", &self.collection);
        map.insert("collectionId".to_string(), self.collection_id.into());
        map.insert("societyId".to_string(), self.society_id.into());
        for (i, place) in self
            .collection_places
            .iter()
            .take(MAX_COLLECTION_PLACE_LEVELS)
            .enumerate()
        {
            insert_str(&mut map, format!("collectionPlace{}", i + 1), place);
        }
        insert_str(&mut map, "lastModified", &self.last_modified);
        if let Some(privacy) = &self.privacy {
            insert_str(&mut map, "privacy", privacy);
        }

        Value::Object(map)
    }

    /// Read a document back from an engine `_source` body.
    pub fn from_source(id: impl Into<String>, source: &Value) -> Self {
        let mut relatives = BTreeMap::new();
        for relative in Relative::ALL {
            let names = RelativeNames {
                given: get_str(source, &format!("{}Given", relative.prefix())).unwrap_or_default(),
                surname: get_str(source, &format!("{}Surname", relative.prefix()))
                    .unwrap_or_default(),
            };
            if !names.is_empty() {
                relatives.insert(relative, names);
            }
        }

        let mut events = BTreeMap::new();
        for event in EventType::ALL {
            let prefix = event.prefix();
            let fields = EventFields {
                place: get_str(source, &format!("{}Place", prefix)),
                place_levels: (1..=MAX_PLACE_LEVELS)
                    .map_while(|i| get_str(source, &format!("{}Place{}", prefix, i)))
                    .collect(),
                date_std: get_ints(source, &format!("{}DateStd", prefix)),
                year: get_ints(source, &format!("{}Year", prefix)),
            };
            if !fields.is_empty() {
                events.insert(event, fields);
            }
        }

        let as_u32 = |key: &str| {
            source
                .get(key)
                .and_then(Value::as_u64)
                .map(|v| v as u32)
                .unwrap_or_default()
        };

        Self {
            id: id.into(),
            given: get_str(source, "given").unwrap_or_default(),
            surname: get_str(source, "surname").unwrap_or_default(),
            relatives,
            events,
            keywords: get_str(source, "keywords"),
            post: as_u32("post"),
            category: get_strs(source, "category"),
            collection: get_str(source, "collection").unwrap_or_default(),
            collection_id: as_u32("collectionId"),
            society_id: as_u32("societyId"),
            collection_places: (1..=MAX_COLLECTION_PLACE_LEVELS)
                .map_while(|i| get_str(source, &format!("collectionPlace{}", i)))
                .collect(),
            last_modified: get_str(source, "lastModified").unwrap_or_default(),
            privacy: get_str(source, "privacy"),
        }
    }
}

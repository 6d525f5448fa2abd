//! Tenant-scoped content entities.
//!
//! Every entity carries the `society_id` of the tenant that owns it and a `last_modified`
//! timestamp used for optimistic concurrency.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::roles::{IxField, Role};

/// A grouping of collections used for faceting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u32,
    pub society_id: u32,
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

/// Maps one incoming column header to an indexed role and field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMapping {
    pub header: String,
    pub ix_role: Role,
    pub ix_field: IxField,
}

impl CollectionMapping {
    pub fn new(header: impl Into<String>, ix_role: Role, ix_field: IxField) -> Self {
        Self {
            header: header.into(),
            ix_role,
            ix_field,
        }
    }
}

/// Privacy bitmask of a collection.
///
/// Only [`PrivacyLevel::PRIVATE_SEARCH`] is defined; the remaining bits are reserved and
/// default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivacyLevel(pub u32);

impl PrivacyLevel {
    pub const PUBLIC: PrivacyLevel = PrivacyLevel(0);
    pub const PRIVATE_SEARCH: PrivacyLevel = PrivacyLevel(1);

    pub fn contains(&self, other: PrivacyLevel) -> bool {
        self.0 & other.0 != 0
    }

    /// Records in collections without the private-search bit are publicly searchable.
    pub fn is_public_search(&self) -> bool {
        !self.contains(Self::PRIVATE_SEARCH)
    }
}

/// Schema mapping from incoming CSV headers to indexable roles and fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: u32,
    pub society_id: u32,
    pub name: String,
    pub category_ids: Vec<u32>,
    #[serde(default)]
    pub mappings: Vec<CollectionMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household_number_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household_relationship_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path_header: Option<String>,
    #[serde(default)]
    pub citation_template: String,
    /// Standardized place the collection covers, most specific level first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
    pub last_modified: DateTime<Utc>,
}

/// Publication state of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostStatus {
    #[default]
    Draft,
    ToPublish,
    Publishing,
    Published,
    PublishError,
    ToUnpublish,
    Unpublishing,
    UnpublishError,
}

impl PostStatus {
    /// Whether a status transition is allowed.
    ///
    /// The publisher only moves posts forward from the explicit `ToPublish` / `ToUnpublish`
    /// triggers (or retries from the matching error state).
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        use PostStatus::*;
        matches!(
            (self, next),
            (Draft, ToPublish)
                | (PublishError, ToPublish)
                | (ToPublish, Publishing)
                | (PublishError, Publishing)
                | (Publishing, Published)
                | (Publishing, PublishError)
                | (Published, ToUnpublish)
                | (UnpublishError, ToUnpublish)
                | (ToUnpublish, Unpublishing)
                | (UnpublishError, Unpublishing)
                | (Unpublishing, Draft)
                | (Unpublishing, UnpublishError)
        )
    }
}

/// Image loading state of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImagesStatus {
    #[default]
    ToLoad,
    Loading,
    LoadComplete,
    LoadError,
}

/// A batch of records uploaded by a tenant; the unit of publish/unpublish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: u32,
    pub society_id: u32,
    pub collection_id: u32,
    pub name: String,
    #[serde(default)]
    pub records_key: String,
    #[serde(default)]
    pub images_key: String,
    pub post_status: PostStatus,
    pub images_status: ImagesStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_error: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A single row of a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: u32,
    pub society_id: u32,
    pub post_id: u32,
    /// Schema-less user columns, keyed by header. Standardized companions live under
    /// `<header>_std`.
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ix_hash: Option<String>,
    pub last_modified: DateTime<Utc>,
}

impl Record {
    /// Non-blank value of a column.
    pub fn value(&self, header: &str) -> Option<&str> {
        self.data
            .get(header)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Non-blank standardized companion of a column.
    pub fn std_value(&self, header: &str) -> Option<&str> {
        self.value(&format!("{}_std", header))
    }
}

/// Ordered record IDs of one household in a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordHousehold {
    pub society_id: u32,
    pub post_id: u32,
    pub household_id: String,
    pub record_ids: Vec<u32>,
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_level_bits() {
        assert!(PrivacyLevel::PUBLIC.is_public_search());
        assert!(!PrivacyLevel::PRIVATE_SEARCH.is_public_search());
        assert!(!PrivacyLevel(3).is_public_search());
        assert!(PrivacyLevel(2).is_public_search());
    }

    #[test]
    fn test_post_status_transitions() {
        assert!(PostStatus::ToPublish.can_transition_to(PostStatus::Publishing));
        assert!(PostStatus::Publishing.can_transition_to(PostStatus::Published));
        assert!(PostStatus::Unpublishing.can_transition_to(PostStatus::Draft));
        assert!(!PostStatus::Published.can_transition_to(PostStatus::Publishing));
        assert!(!PostStatus::Draft.can_transition_to(PostStatus::Published));
    }

    #[test]
    fn test_record_values_ignore_blanks() {
        let mut data = BTreeMap::new();
        data.insert("Given".to_string(), "  Fred ".to_string());
        data.insert("Born".to_string(), " ".to_string());
        data.insert("Born_std".to_string(), "19010319".to_string());
        let record = Record {
            id: 1,
            society_id: 1,
            post_id: 1,
            data,
            ix_hash: None,
            last_modified: Utc::now(),
        };

        assert_eq!(record.value("Given"), Some("Fred"));
        assert_eq!(record.value("Born"), None);
        assert_eq!(record.std_value("Born"), Some("19010319"));
        assert_eq!(record.value("Missing"), None);
    }

    #[test]
    fn test_post_status_wire_names() {
        let json = serde_json::to_string(&PostStatus::ToUnpublish).unwrap();
        assert_eq!(json, "\"ToUnpublish\"");
    }
}

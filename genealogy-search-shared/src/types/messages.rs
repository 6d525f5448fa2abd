//! Pub/sub message bodies.
//!
//! Three topics carry JSON bodies: `recordswriter`, `imageswriter` and `publisher`.

use serde::{Deserialize, Serialize};

/// Body of a `recordswriter` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordsWriterMessage {
    #[serde(rename = "postID")]
    pub post_id: u32,
}

/// Action of an `imageswriter` message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImagesWriterAction {
    Unzip,
    GenerateThumbnail,
}

/// Body of an `imageswriter` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagesWriterMessage {
    pub action: ImagesWriterAction,
    #[serde(rename = "societyId")]
    pub society_id: u32,
    #[serde(rename = "postID")]
    pub post_id: u32,
    #[serde(rename = "newZips", default, skip_serializing_if = "Option::is_none")]
    pub new_zips: Option<Vec<String>>,
    #[serde(rename = "imagePath", default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// Action of a `publisher` message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublisherAction {
    Index,
    Unindex,
}

/// Body of a `publisher` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublisherMessage {
    pub action: PublisherAction,
    #[serde(rename = "societyId")]
    pub society_id: u32,
    #[serde(rename = "postID")]
    pub post_id: u32,
}

impl PublisherMessage {
    pub fn index(society_id: u32, post_id: u32) -> Self {
        Self {
            action: PublisherAction::Index,
            society_id,
            post_id,
        }
    }

    pub fn unindex(society_id: u32, post_id: u32) -> Self {
        Self {
            action: PublisherAction::Unindex,
            society_id,
            post_id,
        }
    }
}

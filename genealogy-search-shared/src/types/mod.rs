//! This module defines the core data structures and types used across the genealogy search
//! system. It re-exports the commonly used types at the crate root.

pub mod context;
pub mod entities;
pub mod indexed_document;
pub mod messages;
pub mod name_variants;
pub mod place;
pub mod roles;
pub mod search_request;
pub mod search_result;

pub use context::RequestContext;
pub use entities::{
    Category, Collection, CollectionMapping, ImagesStatus, Post, PostStatus, PrivacyLevel,
    Record, RecordHousehold,
};
pub use indexed_document::{
    EventFields, IndexedDocument, RelativeNames, MAX_COLLECTION_PLACE_LEVELS, MAX_PLACE_LEVELS,
    PRIVACY_PUBLIC,
};
pub use messages::{
    ImagesWriterAction, ImagesWriterMessage, PublisherAction, PublisherMessage,
    RecordsWriterMessage,
};
pub use name_variants::{NameType, NameVariants};
pub use place::{Place, PlaceSettings, PlaceWord};
pub use roles::{EventType, IxField, Relative, Role};
pub use search_request::{
    DateFuzziness, NameFuzziness, PlaceFuzziness, SearchRequest, DEFAULT_SIZE, MAX_FROM, MAX_SIZE,
};
pub use search_result::{
    SearchEvent, SearchFacet, SearchFacetBucket, SearchHit, SearchPerson, SearchRelationship,
    SearchResult,
};

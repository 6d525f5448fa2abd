//! Interface definitions for the collaborators the core depends on.
//!
//! The traits allow dependency injection and swappable backends: OpenSearch or in-memory
//! for the engine, PostgreSQL or in-memory for content and reference data.

mod content_store;
mod gazetteer;
mod search_index_provider;

pub use content_store::ContentStore;
pub use gazetteer::{Gazetteer, NameVariantsSource};
pub use search_index_provider::SearchIndexProvider;

//! In-memory implementations of every collaborator, for tests and local runs.

mod content_store;
mod gazetteer;
mod search_index;

pub use content_store::InMemoryContentStore;
pub use gazetteer::InMemoryGazetteer;
pub use search_index::InMemorySearchIndex;

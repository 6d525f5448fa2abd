//! Processor module for the indexing pipeline.
//!
//! Transforms a post's records into one search document per (record, role).

mod record_processor;
mod relative_roles;

pub use record_processor::{PostScope, RecordProcessor};
pub use relative_roles::relative_roles;

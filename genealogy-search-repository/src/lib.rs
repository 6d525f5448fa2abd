//! # Genealogy Search Repository
//!
//! This crate provides the collaborator traits the search core depends on and their
//! implementations: OpenSearch for the engine, PostgreSQL for content and gazetteer
//! reference data, and in-memory variants of each for tests.

pub mod config;
pub mod dsl;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod types;
pub mod utils;

pub use config::PostgresConfig;
pub use dsl::{Aggregation, BoolQuery, Operator, Query, SearchDefinition, TermValue};
pub use errors::{from_sqlx, SearchIndexError};
pub use interfaces::{ContentStore, Gazetteer, NameVariantsSource, SearchIndexProvider};
pub use memory::{InMemoryContentStore, InMemoryGazetteer, InMemorySearchIndex};
pub use opensearch::{IndexConfig, OpenSearchProvider};
pub use postgres::PostgresStore;
pub use types::{
    BatchOperationResult, BatchOperationSummary, BulkIndexItem, RawHit, RawSearchResponse,
    TermsBucket,
};
pub use utils::redact_url;

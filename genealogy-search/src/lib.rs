//! # Genealogy Search
//!
//! Search core of a multi-tenant genealogy records CMS: indexes published posts into
//! OpenSearch and answers fuzzy genealogical queries.
//!
//! ## Architecture
//!
//! Publishing follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Receives `publisher` messages from the pub/sub topic
//! 2. **Processor**: Standardizes dates and places and turns each record into one
//!    document per role
//! 3. **Loader**: Bulk indexes documents with a pool of workers
//! 4. **Orchestrator**: Moves posts through their publish and unpublish states
//!
//! Searching goes through the query builder and the search executor.
//!
//! ## Modules
//!
//! - [`config`]: Environment settings and dependency wiring
//! - [`consumer`]: Pub/sub subscriptions and topic URLs
//! - [`standardize`]: Date and place standardization with request batching
//! - [`names`]: Cached name-variant lookup
//! - [`household`]: Household membership and relationships to the head
//! - [`processor`]: Record to document transformation
//! - [`loader`]: Bulk indexer
//! - [`pipeline`]: Indexing of one post
//! - [`orchestrator`]: Publisher worker
//! - [`query`]: Search request to engine query translation
//! - [`search`]: Search execution and result shaping
//! - [`errors`]: Error types for the core

pub mod config;
pub mod consumer;
pub mod errors;
pub mod household;
pub mod loader;
pub mod names;
pub mod orchestrator;
pub mod pipeline;
pub mod processor;
pub mod query;
pub mod search;
pub mod standardize;
pub mod text;

pub use config::{Dependencies, Settings};
pub use errors::{PipelineError, SearchError};
pub use orchestrator::PublisherWorker;
pub use search::SearchExecutor;

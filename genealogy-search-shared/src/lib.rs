//! # Genealogy Search Shared
//!
//! This crate defines shared data structures and types used across the genealogy search
//! system. It includes the tenant-scoped content entities, the indexed document shape,
//! search requests and results, gazetteer reference data, pub/sub message bodies and the
//! domain error kinds that cross the API boundary.

pub mod errors;
pub mod types;

pub use errors::{ApiError, ApiErrors, DomainError, ErrorKind};
pub use types::*;

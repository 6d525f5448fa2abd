//! Error types for the genealogy search repository.
//!
//! Engine failures use `SearchIndexError`. Persistence collaborators return the shared
//! `DomainError`; the PostgreSQL implementation translates driver errors in
//! [`from_sqlx`].

mod search_index_error;
mod sqlx_translate;

pub use search_index_error::SearchIndexError;
pub use sqlx_translate::from_sqlx;

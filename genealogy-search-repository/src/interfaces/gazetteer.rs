//! Read-only reference data: the place gazetteer and the name-variant tables.

use async_trait::async_trait;

use genealogy_search_shared::{
    DomainError, NameType, NameVariants, Place, PlaceSettings, PlaceWord,
};

/// Place lookups. Results for unknown IDs or words are simply absent.
#[async_trait]
pub trait Gazetteer: Send + Sync {
    async fn select_places_by_id(&self, ids: &[u32]) -> Result<Vec<Place>, DomainError>;

    async fn select_place_words_by_word(
        &self,
        words: &[String],
    ) -> Result<Vec<PlaceWord>, DomainError>;

    async fn select_place_settings(&self) -> Result<PlaceSettings, DomainError>;
}

/// Name-variant lookups keyed by a case-folded, ASCII-folded name.
#[async_trait]
pub trait NameVariantsSource: Send + Sync {
    /// Returns `NotFound` when the name has no variant row.
    async fn select_name_variants(
        &self,
        name_type: NameType,
        name: &str,
    ) -> Result<NameVariants, DomainError>;
}

//! Name-variant lookup used by the query builder.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use genealogy_search_repository::NameVariantsSource;
use genealogy_search_shared::{DomainError, NameType};

const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Cached access to the name-variant tables.
///
/// The cache is a bounded moka cache, which evicts by TinyLFU admission and recency rather
/// than strict LRU.
pub struct NameVariantLookup {
    source: Arc<dyn NameVariantsSource>,
    cache: Cache<(NameType, String), Vec<String>>,
}

impl NameVariantLookup {
    pub fn new(source: Arc<dyn NameVariantsSource>) -> Self {
        Self {
            source,
            cache: Cache::builder()
                .max_capacity(DEFAULT_CACHE_CAPACITY)
                .build(),
        }
    }

    /// Variants of an already folded, lowercased name.
    ///
    /// A name with no entry has no variants; any other failure is returned.
    pub async fn get_name_variants(
        &self,
        name_type: NameType,
        name: &str,
    ) -> Result<Vec<String>, DomainError> {
        let key = (name_type, name.to_string());
        if let Some(variants) = self.cache.get(&key).await {
            return Ok(variants);
        }

        let variants = match self.source.select_name_variants(name_type, name).await {
            Ok(found) => found.variants,
            Err(e) if e.is_not_found() => {
                debug!(name_type = name_type.as_str(), name = %name, "No name variants");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        self.cache.insert(key, variants.clone()).await;
        Ok(variants)
    }
}

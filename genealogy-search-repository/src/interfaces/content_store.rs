//! Tenant-scoped content persistence.

use async_trait::async_trait;

use genealogy_search_shared::{Category, Collection, DomainError, Post, Record, RecordHousehold};

/// Entity reads and writes for one tenant at a time.
///
/// Every method takes the acting tenant's `society_id`; rows owned by another tenant are
/// reported as `NotFound`. Updates are optimistic: the entity's `last_modified` must equal
/// the persisted value, otherwise the call fails with `ConcurrentUpdate` and storage is left
/// unchanged. Successful writes return the entity with its new `last_modified`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn select_post(&self, society_id: u32, post_id: u32) -> Result<Post, DomainError>;

    async fn update_post(&self, society_id: u32, post: &Post) -> Result<Post, DomainError>;

    async fn select_collection(
        &self,
        society_id: u32,
        collection_id: u32,
    ) -> Result<Collection, DomainError>;

    async fn update_collection(
        &self,
        society_id: u32,
        collection: &Collection,
    ) -> Result<Collection, DomainError>;

    /// Categories with the given IDs, in the requested order. Missing IDs are skipped.
    async fn select_categories_by_id(
        &self,
        society_id: u32,
        category_ids: &[u32],
    ) -> Result<Vec<Category>, DomainError>;

    async fn select_records_by_post(
        &self,
        society_id: u32,
        post_id: u32,
    ) -> Result<Vec<Record>, DomainError>;

    async fn select_record(&self, society_id: u32, record_id: u32) -> Result<Record, DomainError>;

    async fn select_record_households_by_post(
        &self,
        society_id: u32,
        post_id: u32,
    ) -> Result<Vec<RecordHousehold>, DomainError>;

    async fn insert_category(
        &self,
        society_id: u32,
        category: &Category,
    ) -> Result<Category, DomainError>;

    /// Fails with `BadReference` when a category ID does not exist for the tenant.
    async fn insert_collection(
        &self,
        society_id: u32,
        collection: &Collection,
    ) -> Result<Collection, DomainError>;

    /// Fails with `BadReference` when the collection does not exist for the tenant.
    async fn insert_post(&self, society_id: u32, post: &Post) -> Result<Post, DomainError>;

    /// Insert records under one post, assigning IDs in order.
    async fn insert_records(
        &self,
        society_id: u32,
        post_id: u32,
        records: &[Record],
    ) -> Result<Vec<Record>, DomainError>;

    async fn insert_record_households(
        &self,
        society_id: u32,
        post_id: u32,
        households: &[RecordHousehold],
    ) -> Result<(), DomainError>;
}

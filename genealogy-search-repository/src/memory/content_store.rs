use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use genealogy_search_shared::{Category, Collection, DomainError, Post, Record, RecordHousehold};

use crate::interfaces::ContentStore;

#[derive(Default)]
struct State {
    next_id: u32,
    last_timestamp: Option<DateTime<Utc>>,
    categories: BTreeMap<u32, Category>,
    collections: BTreeMap<u32, Collection>,
    posts: BTreeMap<u32, Post>,
    records: BTreeMap<u32, Record>,
    households: BTreeMap<(u32, String), RecordHousehold>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps, so every write changes `last_modified`.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

/// Tenant-checked in-memory content store with auto-increment IDs.
#[derive(Default)]
pub struct InMemoryContentStore {
    state: Mutex<State>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::other("content store lock poisoned"))
    }
}

fn owned<T: Clone>(
    map: &BTreeMap<u32, T>,
    society_of: impl Fn(&T) -> u32,
    society_id: u32,
    entity: &str,
    id: u32,
) -> Result<T, DomainError> {
    map.get(&id)
        .filter(|v| society_of(v) == society_id)
        .cloned()
        .ok_or_else(|| DomainError::not_found(entity, id))
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn select_post(&self, society_id: u32, post_id: u32) -> Result<Post, DomainError> {
        let state = self.lock()?;
        owned(&state.posts, |p| p.society_id, society_id, "post", post_id)
    }

    async fn update_post(&self, society_id: u32, post: &Post) -> Result<Post, DomainError> {
        let mut state = self.lock()?;
        let current = owned(&state.posts, |p| p.society_id, society_id, "post", post.id)?;
        if current.last_modified != post.last_modified {
            return Err(DomainError::concurrent_update("post", post.id));
        }
        let mut updated = post.clone();
        updated.society_id = society_id;
        updated.collection_id = current.collection_id;
        updated.last_modified = state.now();
        state.posts.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn select_collection(
        &self,
        society_id: u32,
        collection_id: u32,
    ) -> Result<Collection, DomainError> {
        let state = self.lock()?;
        owned(
            &state.collections,
            |c| c.society_id,
            society_id,
            "collection",
            collection_id,
        )
    }

    async fn update_collection(
        &self,
        society_id: u32,
        collection: &Collection,
    ) -> Result<Collection, DomainError> {
        let mut state = self.lock()?;
        let current = owned(
            &state.collections,
            |c| c.society_id,
            society_id,
            "collection",
            collection.id,
        )?;
        if current.last_modified != collection.last_modified {
            return Err(DomainError::concurrent_update("collection", collection.id));
        }
        check_categories(&state, society_id, &collection.category_ids)?;
        let mut updated = collection.clone();
        updated.society_id = society_id;
        updated.last_modified = state.now();
        state.collections.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn select_categories_by_id(
        &self,
        society_id: u32,
        category_ids: &[u32],
    ) -> Result<Vec<Category>, DomainError> {
        let state = self.lock()?;
        Ok(category_ids
            .iter()
            .filter_map(|id| state.categories.get(id))
            .filter(|c| c.society_id == society_id)
            .cloned()
            .collect())
    }

    async fn select_records_by_post(
        &self,
        society_id: u32,
        post_id: u32,
    ) -> Result<Vec<Record>, DomainError> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .filter(|r| r.society_id == society_id && r.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn select_record(&self, society_id: u32, record_id: u32) -> Result<Record, DomainError> {
        let state = self.lock()?;
        owned(&state.records, |r| r.society_id, society_id, "record", record_id)
    }

    async fn select_record_households_by_post(
        &self,
        society_id: u32,
        post_id: u32,
    ) -> Result<Vec<RecordHousehold>, DomainError> {
        let state = self.lock()?;
        Ok(state
            .households
            .values()
            .filter(|h| h.society_id == society_id && h.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_category(
        &self,
        society_id: u32,
        category: &Category,
    ) -> Result<Category, DomainError> {
        if category.name.trim().is_empty() {
            return Err(DomainError::required("name"));
        }
        let mut state = self.lock()?;
        let mut inserted = category.clone();
        inserted.id = state.next_id();
        inserted.society_id = society_id;
        inserted.last_modified = state.now();
        state.categories.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn insert_collection(
        &self,
        society_id: u32,
        collection: &Collection,
    ) -> Result<Collection, DomainError> {
        if collection.name.trim().is_empty() {
            return Err(DomainError::required("name"));
        }
        let mut state = self.lock()?;
        check_categories(&state, society_id, &collection.category_ids)?;
        let mut inserted = collection.clone();
        inserted.id = state.next_id();
        inserted.society_id = society_id;
        inserted.last_modified = state.now();
        state.collections.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn insert_post(&self, society_id: u32, post: &Post) -> Result<Post, DomainError> {
        if post.name.trim().is_empty() {
            return Err(DomainError::required("name"));
        }
        let mut state = self.lock()?;
        let collection_exists = state
            .collections
            .get(&post.collection_id)
            .is_some_and(|c| c.society_id == society_id);
        if !collection_exists {
            return Err(DomainError::bad_reference("collection", post.collection_id));
        }
        let mut inserted = post.clone();
        inserted.id = state.next_id();
        inserted.society_id = society_id;
        inserted.last_modified = state.now();
        state.posts.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn insert_records(
        &self,
        society_id: u32,
        post_id: u32,
        records: &[Record],
    ) -> Result<Vec<Record>, DomainError> {
        let mut state = self.lock()?;
        check_post(&state, society_id, post_id)?;
        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            let mut record = record.clone();
            record.id = state.next_id();
            record.society_id = society_id;
            record.post_id = post_id;
            record.last_modified = state.now();
            state.records.insert(record.id, record.clone());
            inserted.push(record);
        }
        Ok(inserted)
    }

    async fn insert_record_households(
        &self,
        society_id: u32,
        post_id: u32,
        households: &[RecordHousehold],
    ) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        check_post(&state, society_id, post_id)?;
        for household in households {
            let mut household = household.clone();
            household.society_id = society_id;
            household.post_id = post_id;
            household.last_modified = state.now();
            state
                .households
                .insert((post_id, household.household_id.clone()), household);
        }
        Ok(())
    }
}

fn check_categories(
    state: &State,
    society_id: u32,
    category_ids: &[u32],
) -> Result<(), DomainError> {
    let missing = category_ids.iter().find(|id| {
        !state
            .categories
            .get(id)
            .is_some_and(|c| c.society_id == society_id)
    });
    match missing {
        Some(id) => Err(DomainError::bad_reference("category", id)),
        None => Ok(()),
    }
}

fn check_post(state: &State, society_id: u32, post_id: u32) -> Result<(), DomainError> {
    let exists = state
        .posts
        .get(&post_id)
        .is_some_and(|p| p.society_id == society_id);
    if exists {
        Ok(())
    } else {
        Err(DomainError::bad_reference("post", post_id))
    }
}

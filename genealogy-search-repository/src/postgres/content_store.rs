use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, types::Json, Postgres, Row, Transaction};
use tracing::debug;

use genealogy_search_shared::{
    Category, Collection, CollectionMapping, DomainError, ImagesStatus, Post, PostStatus,
    PrivacyLevel, Record, RecordHousehold,
};

use super::{from_db_id, to_db_id, to_db_ids, PostgresStore};
use crate::errors::from_sqlx;
use crate::interfaces::ContentStore;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryBody {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionBody {
    name: String,
    #[serde(default)]
    mappings: Vec<CollectionMapping>,
    #[serde(default)]
    household_number_header: Option<String>,
    #[serde(default)]
    household_relationship_header: Option<String>,
    #[serde(default)]
    gender_header: Option<String>,
    #[serde(default)]
    image_path_header: Option<String>,
    #[serde(default)]
    citation_template: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    privacy_level: PrivacyLevel,
}

impl From<&Collection> for CollectionBody {
    fn from(c: &Collection) -> Self {
        Self {
            name: c.name.clone(),
            mappings: c.mappings.clone(),
            household_number_header: c.household_number_header.clone(),
            household_relationship_header: c.household_relationship_header.clone(),
            gender_header: c.gender_header.clone(),
            image_path_header: c.image_path_header.clone(),
            citation_template: c.citation_template.clone(),
            location: c.location.clone(),
            privacy_level: c.privacy_level,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostBody {
    name: String,
    #[serde(default)]
    records_key: String,
    #[serde(default)]
    images_key: String,
    #[serde(default)]
    post_status: PostStatus,
    #[serde(default)]
    images_status: ImagesStatus,
    #[serde(default)]
    post_error: Option<String>,
}

impl From<&Post> for PostBody {
    fn from(p: &Post) -> Self {
        Self {
            name: p.name.clone(),
            records_key: p.records_key.clone(),
            images_key: p.images_key.clone(),
            post_status: p.post_status,
            images_status: p.images_status,
            post_error: p.post_error.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordBody {
    data: BTreeMap<String, String>,
}

const POST_COLUMNS: &str = "id, society_id, collection_id, body, last_update_time";
const RECORD_COLUMNS: &str = "id, society_id, post_id, body, ix_hash, last_update_time";
const CATEGORY_COLUMNS: &str = "id, society_id, body, last_update_time";
const COLLECTION_SELECT: &str = "SELECT c.id, c.society_id, c.body, c.last_update_time, \
     ARRAY(SELECT cc.category_id FROM collection_category cc \
           WHERE cc.collection_id = c.id ORDER BY cc.category_id) AS category_ids \
     FROM collection c";

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    let body: Json<CategoryBody> = row.try_get("body")?;
    Ok(Category {
        id: from_db_id(row.try_get("id")?),
        society_id: from_db_id(row.try_get("society_id")?),
        name: body.0.name,
        last_modified: row.try_get("last_update_time")?,
    })
}

fn collection_from_row(row: &PgRow) -> Result<Collection, sqlx::Error> {
    let body: Json<CollectionBody> = row.try_get("body")?;
    let body = body.0;
    let category_ids: Vec<i32> = row.try_get("category_ids")?;
    Ok(Collection {
        id: from_db_id(row.try_get("id")?),
        society_id: from_db_id(row.try_get("society_id")?),
        name: body.name,
        category_ids: category_ids.into_iter().map(from_db_id).collect(),
        mappings: body.mappings,
        household_number_header: body.household_number_header,
        household_relationship_header: body.household_relationship_header,
        gender_header: body.gender_header,
        image_path_header: body.image_path_header,
        citation_template: body.citation_template,
        location: body.location,
        privacy_level: body.privacy_level,
        last_modified: row.try_get("last_update_time")?,
    })
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    let body: Json<PostBody> = row.try_get("body")?;
    let body = body.0;
    Ok(Post {
        id: from_db_id(row.try_get("id")?),
        society_id: from_db_id(row.try_get("society_id")?),
        collection_id: from_db_id(row.try_get("collection_id")?),
        name: body.name,
        records_key: body.records_key,
        images_key: body.images_key,
        post_status: body.post_status,
        images_status: body.images_status,
        post_error: body.post_error,
        last_modified: row.try_get("last_update_time")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<Record, sqlx::Error> {
    let body: Json<RecordBody> = row.try_get("body")?;
    Ok(Record {
        id: from_db_id(row.try_get("id")?),
        society_id: from_db_id(row.try_get("society_id")?),
        post_id: from_db_id(row.try_get("post_id")?),
        data: body.0.data,
        ix_hash: row.try_get("ix_hash")?,
        last_modified: row.try_get("last_update_time")?,
    })
}

fn household_from_row(row: &PgRow) -> Result<RecordHousehold, sqlx::Error> {
    let record_ids: Vec<i32> = row.try_get("record_ids")?;
    Ok(RecordHousehold {
        society_id: from_db_id(row.try_get("society_id")?),
        post_id: from_db_id(row.try_get("post_id")?),
        household_id: row.try_get("household_id")?,
        record_ids: record_ids.into_iter().map(from_db_id).collect(),
        last_modified: row.try_get("last_update_time")?,
    })
}

impl PostgresStore {
    /// Whether a tenant-owned row exists. `table` is always one of the fixed table names.
    async fn row_exists(
        &self,
        table: &'static str,
        society_id: u32,
        id: u32,
    ) -> Result<bool, DomainError> {
        let sql = format!("SELECT 1 FROM {} WHERE society_id = $1 AND id = $2", table);
        let row = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_id(id))
            .fetch_optional(self.pool())
            .await
            .map_err(|e| from_sqlx(e, table, id))?;
        Ok(row.is_some())
    }

    /// Resolve a zero-row optimistic update into `ConcurrentUpdate` or `NotFound`.
    async fn stale_or_missing(
        &self,
        table: &'static str,
        society_id: u32,
        id: u32,
    ) -> DomainError {
        match self.row_exists(table, society_id, id).await {
            Ok(true) => DomainError::concurrent_update(table, id),
            Ok(false) => DomainError::not_found(table, id),
            Err(e) => e,
        }
    }

    async fn check_categories(
        tx: &mut Transaction<'_, Postgres>,
        society_id: u32,
        category_ids: &[u32],
    ) -> Result<(), DomainError> {
        let rows = sqlx::query("SELECT id FROM category WHERE society_id = $1 AND id = ANY($2)")
            .bind(to_db_id(society_id))
            .bind(to_db_ids(category_ids))
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| from_sqlx(e, "category", society_id))?;
        let mut found = HashSet::new();
        for row in &rows {
            let id: i32 = row.try_get("id").map_err(|e| from_sqlx(e, "category", 0))?;
            found.insert(from_db_id(id));
        }
        match category_ids.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(DomainError::bad_reference("category", missing)),
            None => Ok(()),
        }
    }

    async fn replace_collection_categories(
        tx: &mut Transaction<'_, Postgres>,
        collection_id: u32,
        category_ids: &[u32],
    ) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM collection_category WHERE collection_id = $1")
            .bind(to_db_id(collection_id))
            .execute(&mut **tx)
            .await
            .map_err(|e| from_sqlx(e, "collection", collection_id))?;
        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO collection_category (collection_id, category_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(to_db_id(collection_id))
            .bind(to_db_id(*category_id))
            .execute(&mut **tx)
            .await
            .map_err(|e| from_sqlx(e, "category", category_id))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PostgresStore {
    async fn select_post(&self, society_id: u32, post_id: u32) -> Result<Post, DomainError> {
        let sql = format!(
            "SELECT {} FROM post WHERE society_id = $1 AND id = $2",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_id(post_id))
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "post", post_id))?;
        post_from_row(&row).map_err(|e| from_sqlx(e, "post", post_id))
    }

    async fn update_post(&self, society_id: u32, post: &Post) -> Result<Post, DomainError> {
        let sql = format!(
            "UPDATE post SET body = $1, last_update_time = clock_timestamp() \
             WHERE society_id = $2 AND id = $3 AND last_update_time = $4 RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Json(PostBody::from(post)))
            .bind(to_db_id(society_id))
            .bind(to_db_id(post.id))
            .bind(post.last_modified)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "post", post.id))?;

        match row {
            Some(row) => {
                debug!(society_id, post_id = post.id, status = ?post.post_status, "Updated post");
                post_from_row(&row).map_err(|e| from_sqlx(e, "post", post.id))
            }
            None => Err(self.stale_or_missing("post", society_id, post.id).await),
        }
    }

    async fn select_collection(
        &self,
        society_id: u32,
        collection_id: u32,
    ) -> Result<Collection, DomainError> {
        let sql = format!("{} WHERE c.society_id = $1 AND c.id = $2", COLLECTION_SELECT);
        let row = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_id(collection_id))
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "collection", collection_id))?;
        collection_from_row(&row).map_err(|e| from_sqlx(e, "collection", collection_id))
    }

    async fn update_collection(
        &self,
        society_id: u32,
        collection: &Collection,
    ) -> Result<Collection, DomainError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| from_sqlx(e, "collection", collection.id))?;

        Self::check_categories(&mut tx, society_id, &collection.category_ids).await?;

        let row = sqlx::query(
            "UPDATE collection SET body = $1, last_update_time = clock_timestamp() \
             WHERE society_id = $2 AND id = $3 AND last_update_time = $4 RETURNING id",
        )
        .bind(Json(CollectionBody::from(collection)))
        .bind(to_db_id(society_id))
        .bind(to_db_id(collection.id))
        .bind(collection.last_modified)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| from_sqlx(e, "collection", collection.id))?;

        if row.is_none() {
            // Dropping the transaction rolls it back.
            drop(tx);
            return Err(self
                .stale_or_missing("collection", society_id, collection.id)
                .await);
        }

        Self::replace_collection_categories(&mut tx, collection.id, &collection.category_ids)
            .await?;
        tx.commit()
            .await
            .map_err(|e| from_sqlx(e, "collection", collection.id))?;

        self.select_collection(society_id, collection.id).await
    }

    async fn select_categories_by_id(
        &self,
        society_id: u32,
        category_ids: &[u32],
    ) -> Result<Vec<Category>, DomainError> {
        let sql = format!(
            "SELECT {} FROM category WHERE society_id = $1 AND id = ANY($2)",
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_ids(category_ids))
            .fetch_all(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "category", society_id))?;

        let mut by_id = BTreeMap::new();
        for row in &rows {
            let category = category_from_row(row).map_err(|e| from_sqlx(e, "category", 0))?;
            by_id.insert(category.id, category);
        }
        Ok(category_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect())
    }

    async fn select_records_by_post(
        &self,
        society_id: u32,
        post_id: u32,
    ) -> Result<Vec<Record>, DomainError> {
        let sql = format!(
            "SELECT {} FROM record WHERE society_id = $1 AND post_id = $2 ORDER BY id",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_id(post_id))
            .fetch_all(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "post", post_id))?;
        rows.iter()
            .map(|row| record_from_row(row).map_err(|e| from_sqlx(e, "record", 0)))
            .collect()
    }

    async fn select_record(&self, society_id: u32, record_id: u32) -> Result<Record, DomainError> {
        let sql = format!(
            "SELECT {} FROM record WHERE society_id = $1 AND id = $2",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_id(record_id))
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "record", record_id))?;
        record_from_row(&row).map_err(|e| from_sqlx(e, "record", record_id))
    }

    async fn select_record_households_by_post(
        &self,
        society_id: u32,
        post_id: u32,
    ) -> Result<Vec<RecordHousehold>, DomainError> {
        let rows = sqlx::query(
            "SELECT society_id, post_id, household_id, record_ids, last_update_time \
             FROM record_household WHERE society_id = $1 AND post_id = $2 ORDER BY household_id",
        )
        .bind(to_db_id(society_id))
        .bind(to_db_id(post_id))
        .fetch_all(self.pool())
        .await
        .map_err(|e| from_sqlx(e, "post", post_id))?;
        rows.iter()
            .map(|row| household_from_row(row).map_err(|e| from_sqlx(e, "record_household", post_id)))
            .collect()
    }

    async fn insert_category(
        &self,
        society_id: u32,
        category: &Category,
    ) -> Result<Category, DomainError> {
        if category.name.trim().is_empty() {
            return Err(DomainError::required("name"));
        }
        let sql = format!(
            "INSERT INTO category (society_id, body) VALUES ($1, $2) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(Json(CategoryBody {
                name: category.name.clone(),
            }))
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "category", 0))?;
        category_from_row(&row).map_err(|e| from_sqlx(e, "category", 0))
    }

    async fn insert_collection(
        &self,
        society_id: u32,
        collection: &Collection,
    ) -> Result<Collection, DomainError> {
        if collection.name.trim().is_empty() {
            return Err(DomainError::required("name"));
        }
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| from_sqlx(e, "collection", 0))?;

        Self::check_categories(&mut tx, society_id, &collection.category_ids).await?;

        let row = sqlx::query(
            "INSERT INTO collection (society_id, body) VALUES ($1, $2) RETURNING id",
        )
        .bind(to_db_id(society_id))
        .bind(Json(CollectionBody::from(collection)))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| from_sqlx(e, "collection", 0))?;
        let id: i32 = row.try_get("id").map_err(|e| from_sqlx(e, "collection", 0))?;
        let id = from_db_id(id);

        Self::replace_collection_categories(&mut tx, id, &collection.category_ids).await?;
        tx.commit().await.map_err(|e| from_sqlx(e, "collection", id))?;

        self.select_collection(society_id, id).await
    }

    async fn insert_post(&self, society_id: u32, post: &Post) -> Result<Post, DomainError> {
        if post.name.trim().is_empty() {
            return Err(DomainError::required("name"));
        }
        if !self
            .row_exists("collection", society_id, post.collection_id)
            .await?
        {
            return Err(DomainError::bad_reference("collection", post.collection_id));
        }

        let sql = format!(
            "INSERT INTO post (society_id, collection_id, body) VALUES ($1, $2, $3) RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(to_db_id(society_id))
            .bind(to_db_id(post.collection_id))
            .bind(Json(PostBody::from(post)))
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "collection", post.collection_id))?;
        post_from_row(&row).map_err(|e| from_sqlx(e, "post", 0))
    }

    async fn insert_records(
        &self,
        society_id: u32,
        post_id: u32,
        records: &[Record],
    ) -> Result<Vec<Record>, DomainError> {
        if !self.row_exists("post", society_id, post_id).await? {
            return Err(DomainError::bad_reference("post", post_id));
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| from_sqlx(e, "record", 0))?;
        let sql = format!(
            "INSERT INTO record (society_id, post_id, body, ix_hash) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            RECORD_COLUMNS
        );

        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            let row = sqlx::query(&sql)
                .bind(to_db_id(society_id))
                .bind(to_db_id(post_id))
                .bind(Json(RecordBody {
                    data: record.data.clone(),
                }))
                .bind(record.ix_hash.clone())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| from_sqlx(e, "post", post_id))?;
            inserted.push(record_from_row(&row).map_err(|e| from_sqlx(e, "record", 0))?);
        }
        tx.commit().await.map_err(|e| from_sqlx(e, "record", 0))?;

        debug!(society_id, post_id, count = inserted.len(), "Inserted records");
        Ok(inserted)
    }

    async fn insert_record_households(
        &self,
        society_id: u32,
        post_id: u32,
        households: &[RecordHousehold],
    ) -> Result<(), DomainError> {
        if !self.row_exists("post", society_id, post_id).await? {
            return Err(DomainError::bad_reference("post", post_id));
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| from_sqlx(e, "record_household", post_id))?;
        for household in households {
            sqlx::query(
                "INSERT INTO record_household (society_id, post_id, household_id, record_ids) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (post_id, household_id) \
                 DO UPDATE SET record_ids = EXCLUDED.record_ids, \
                               last_update_time = clock_timestamp()",
            )
            .bind(to_db_id(society_id))
            .bind(to_db_id(post_id))
            .bind(&household.household_id)
            .bind(to_db_ids(&household.record_ids))
            .execute(&mut *tx)
            .await
            .map_err(|e| from_sqlx(e, "record_household", &household.household_id))?;
        }
        tx.commit()
            .await
            .map_err(|e| from_sqlx(e, "record_household", post_id))?;
        Ok(())
    }
}

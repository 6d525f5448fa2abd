//! Search executor.
//!
//! Runs built queries against the engine and shapes the raw hits into [`SearchResult`]s.
//! Lookups by ID are post-filtered on tenant and privacy, since `get` bypasses the query
//! filters.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use genealogy_search_repository::{
    BoolQuery, ContentStore, Query, RawSearchResponse, SearchIndexProvider,
};
use genealogy_search_shared::{
    DomainError, IndexedDocument, RequestContext, Role, SearchEvent, SearchFacet,
    SearchFacetBucket, SearchHit, SearchPerson, SearchRelationship, SearchRequest, SearchResult,
    PRIVACY_PUBLIC,
};

use crate::errors::SearchError;
use crate::query::QueryBuilder;
use crate::standardize::display_date;

fn full_name(given: &str, surname: &str) -> String {
    format!("{} {}", given, surname).trim().to_string()
}

/// Shape a stored document into the person shown on a hit.
fn person(doc: &IndexedDocument) -> SearchPerson {
    let role = Role::parse_document_id(&doc.id)
        .map(|(_, role)| role)
        .unwrap_or(Role::Principal);

    let events = doc
        .events
        .iter()
        .filter_map(|(event_type, fields)| {
            let date = fields
                .date_std
                .first()
                .map(|d| display_date(*d))
                .or_else(|| fields.year.first().map(|y| y.to_string()));
            let place = fields
                .place
                .clone()
                .or_else(|| fields.place_levels.last().cloned());
            if date.is_none() && place.is_none() {
                return None;
            }
            Some(SearchEvent {
                event_type: *event_type,
                date,
                place,
            })
        })
        .collect();

    let relationships = doc
        .relatives
        .iter()
        .map(|(relative, names)| SearchRelationship {
            relative: *relative,
            name: full_name(&names.given, &names.surname),
        })
        .filter(|r| !r.name.is_empty())
        .collect();

    SearchPerson {
        name: full_name(&doc.given, &doc.surname),
        role,
        events,
        relationships,
    }
}

fn hit(doc: &IndexedDocument, score: f64) -> SearchHit {
    SearchHit {
        id: doc.id.clone(),
        score,
        collection_id: doc.collection_id,
        collection_name: doc.collection.clone(),
        person: person(doc),
        record: None,
        image_path: None,
    }
}

fn shape(response: RawSearchResponse) -> SearchResult {
    let hits = response
        .hits
        .iter()
        .map(|raw| hit(&IndexedDocument::from_source(&raw.id, &raw.source), raw.score))
        .collect();
    let facets: BTreeMap<String, SearchFacet> = response
        .aggregations
        .into_iter()
        .map(|(name, buckets)| {
            let buckets = buckets
                .into_iter()
                .map(|b| SearchFacetBucket {
                    label: b.key,
                    count: b.doc_count,
                })
                .collect();
            (name, SearchFacet { buckets })
        })
        .collect();

    SearchResult {
        total: response.total,
        max_score: response.max_score,
        hits,
        facets,
    }
}

/// Executes searches for a tenant.
pub struct SearchExecutor {
    index: Arc<dyn SearchIndexProvider>,
    store: Arc<dyn ContentStore>,
    builder: QueryBuilder,
}

impl SearchExecutor {
    pub fn new(
        index: Arc<dyn SearchIndexProvider>,
        store: Arc<dyn ContentStore>,
        builder: QueryBuilder,
    ) -> Self {
        Self {
            index,
            store,
            builder,
        }
    }

    /// Run a search.
    ///
    /// A request for another tenant's records yields an empty result.
    #[instrument(skip(self, req), fields(society_id = ctx.society_id, user_id = ?ctx.user_id))]
    pub async fn search(
        &self,
        ctx: &RequestContext,
        req: &SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        let definition = match self.builder.build(ctx, req).await {
            Ok(definition) => definition,
            Err(SearchError::Unauthorized { .. }) => return Ok(SearchResult::empty()),
            Err(e) => return Err(e),
        };

        let response = self.index.search(&definition).await?;
        debug!(
            total = response.total,
            hits = response.hits.len(),
            "Search completed"
        );
        Ok(shape(response))
    }

    /// Look up one document, including its record's raw columns.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchHit)` - The hit with `record` and, when configured, `image_path`
    /// * `Err(SearchError)` - `NotFound` when the document does not exist or is not visible
    ///   to the caller
    #[instrument(skip(self), fields(society_id = ctx.society_id, user_id = ?ctx.user_id))]
    pub async fn search_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<SearchHit, SearchError> {
        let not_found = || SearchError::Domain(DomainError::not_found("search result", id));

        let source = self.index.get(id).await?.ok_or_else(not_found)?;
        let doc = IndexedDocument::from_source(id, &source);
        if doc.society_id != ctx.society_id {
            warn!(
                document_society_id = doc.society_id,
                "Lookup of another society's document rejected"
            );
            return Err(not_found());
        }
        if !ctx.is_authenticated() && doc.privacy.as_deref() != Some(PRIVACY_PUBLIC) {
            return Err(not_found());
        }

        let (record_id, _) = Role::parse_document_id(id).ok_or_else(not_found)?;
        let record = self.store.select_record(ctx.society_id, record_id).await?;
        let collection = self
            .store
            .select_collection(ctx.society_id, doc.collection_id)
            .await?;

        let mut result = hit(&doc, 0.0);
        result.image_path = collection
            .image_path_header
            .as_deref()
            .and_then(|header| record.value(header))
            .map(str::to_string);
        result.record = Some(record.data);
        Ok(result)
    }

    /// Delete every document of a post for the acting tenant.
    #[instrument(skip(self), fields(society_id = ctx.society_id))]
    pub async fn search_delete_by_post(
        &self,
        ctx: &RequestContext,
        post_id: u32,
    ) -> Result<u64, SearchError> {
        let query = Query::Bool(BoolQuery {
            filter: vec![
                Query::filter_term("post", post_id),
                Query::filter_term("societyId", ctx.society_id),
            ],
            ..Default::default()
        });
        let deleted = self.index.delete_by_query(&query).await?;
        debug!(post_id = post_id, deleted = deleted, "Deleted post documents");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameVariantLookup;
    use chrono::Utc;
    use genealogy_search_repository::{
        BulkIndexItem, InMemoryContentStore, InMemoryGazetteer, InMemorySearchIndex,
    };
    use genealogy_search_shared::{
        Category, Collection, EventFields, EventType, ImagesStatus, NameFuzziness, PlaceSettings,
        Post, PostStatus, PrivacyLevel, Record, Relative, RelativeNames,
    };

    struct Fixture {
        executor: SearchExecutor,
        index: Arc<InMemorySearchIndex>,
        record_id: u32,
        post_id: u32,
    }

    fn document(id: String, post: u32, collection_id: u32, society_id: u32) -> IndexedDocument {
        let mut doc = IndexedDocument {
            id,
            given: "Fred".to_string(),
            surname: "Flintstone".to_string(),
            post,
            category: vec!["Vital records".to_string()],
            collection: "Bedrock births".to_string(),
            collection_id,
            society_id,
            last_modified: "1700000000000".to_string(),
            ..Default::default()
        };
        doc.relatives.insert(
            Relative::Spouse,
            RelativeNames {
                given: "Wilma".to_string(),
                surname: String::new(),
            },
        );
        doc.events.insert(
            EventType::Birth,
            EventFields {
                place: Some("Autauga, Alabama, United States".to_string()),
                place_levels: vec!["United States".to_string()],
                date_std: vec![19000101],
                year: vec![1900],
            },
        );
        doc
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryContentStore::new());
        let index = Arc::new(InMemorySearchIndex::new());

        let category = store
            .insert_category(
                1,
                &Category {
                    id: 0,
                    society_id: 1,
                    name: "Vital records".to_string(),
                    last_modified: Utc::now(),
                },
            )
            .await
            .unwrap();
        let collection = store
            .insert_collection(
                1,
                &Collection {
                    id: 0,
                    society_id: 1,
                    name: "Bedrock births".to_string(),
                    category_ids: vec![category.id],
                    mappings: vec![],
                    household_number_header: None,
                    household_relationship_header: None,
                    gender_header: None,
                    image_path_header: Some("Image".to_string()),
                    citation_template: String::new(),
                    location: None,
                    privacy_level: PrivacyLevel::PRIVATE_SEARCH,
                    last_modified: Utc::now(),
                },
            )
            .await
            .unwrap();
        let post = store
            .insert_post(
                1,
                &Post {
                    id: 0,
                    society_id: 1,
                    collection_id: collection.id,
                    name: "1900".to_string(),
                    records_key: String::new(),
                    images_key: String::new(),
                    post_status: PostStatus::Published,
                    images_status: ImagesStatus::ToLoad,
                    post_error: None,
                    last_modified: Utc::now(),
                },
            )
            .await
            .unwrap();
        let records = store
            .insert_records(
                1,
                post.id,
                &[Record {
                    id: 0,
                    society_id: 1,
                    post_id: post.id,
                    data: [("Given", "Fred"), ("Image", "roll1/0001.jpg")]
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    ix_hash: None,
                    last_modified: Utc::now(),
                }],
            )
            .await
            .unwrap();
        let record_id = records[0].id;

        let items: Vec<BulkIndexItem> = [
            document(record_id.to_string(), post.id, collection.id, 1),
            document(format!("{}_s", record_id), post.id, collection.id, 1),
            document("900".to_string(), 99, 42, 2),
        ]
        .iter()
        .map(|doc| BulkIndexItem {
            doc_id: doc.id.clone(),
            body: doc.to_source(),
        })
        .collect();
        index.bulk_index(&items).await.unwrap();

        let names = Arc::new(NameVariantLookup::new(Arc::new(InMemoryGazetteer::new(
            PlaceSettings::default(),
        ))));
        Fixture {
            executor: SearchExecutor::new(index.clone(), store, QueryBuilder::new(names)),
            index,
            record_id,
            post_id: post.id,
        }
    }

    fn flintstone() -> SearchRequest {
        SearchRequest {
            given: Some("Fred".to_string()),
            surname: Some("Flintstone".to_string()),
            surname_fuzziness: NameFuzziness::EXACT,
            category_facet: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_shapes_hits() {
        let f = fixture().await;
        let ctx = RequestContext::new(1, Some(7));

        let result = f.executor.search(&ctx, &flintstone()).await.unwrap();

        assert_eq!(result.total, 2);
        let principal = result
            .hits
            .iter()
            .find(|h| h.id == f.record_id.to_string())
            .unwrap();
        assert_eq!(principal.person.name, "Fred Flintstone");
        assert_eq!(principal.person.role, Role::Principal);
        assert_eq!(principal.collection_name, "Bedrock births");
        assert_eq!(
            principal.person.events,
            vec![SearchEvent {
                event_type: EventType::Birth,
                date: Some("1 Jan 1900".to_string()),
                place: Some("Autauga, Alabama, United States".to_string()),
            }]
        );
        assert_eq!(
            principal.person.relationships,
            vec![SearchRelationship {
                relative: Relative::Spouse,
                name: "Wilma".to_string(),
            }]
        );
        assert!(principal.record.is_none());

        let spouse = result.hits.iter().find(|h| h.id.ends_with("_s")).unwrap();
        assert_eq!(spouse.person.role, Role::Spouse);

        assert_eq!(
            result.facets["category"].buckets,
            vec![SearchFacetBucket {
                label: "Vital records".to_string(),
                count: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_private_documents_hidden_from_anonymous_search() {
        let f = fixture().await;

        let result = f
            .executor
            .search(&RequestContext::new(1, None), &flintstone())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_other_society_search_is_empty() {
        let f = fixture().await;
        let req = SearchRequest {
            society_id: Some(2),
            ..flintstone()
        };

        let result = f
            .executor
            .search(&RequestContext::new(1, Some(7)), &req)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_search_by_id_includes_record() {
        let f = fixture().await;

        let hit = f
            .executor
            .search_by_id(&RequestContext::new(1, Some(7)), &f.record_id.to_string())
            .await
            .unwrap();

        let record = hit.record.unwrap();
        assert_eq!(record["Given"], "Fred");
        assert_eq!(hit.image_path.as_deref(), Some("roll1/0001.jpg"));
    }

    #[tokio::test]
    async fn test_search_by_id_is_filtered() {
        let f = fixture().await;
        let id = f.record_id.to_string();

        let err = f
            .executor
            .search_by_id(&RequestContext::new(1, None), &id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = f
            .executor
            .search_by_id(&RequestContext::new(2, Some(7)), &id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = f
            .executor
            .search_by_id(&RequestContext::new(1, Some(7)), "12345")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_by_post_is_tenant_scoped() {
        let f = fixture().await;

        let deleted = f
            .executor
            .search_delete_by_post(&RequestContext::system(2), f.post_id)
            .await
            .unwrap();
        assert_eq!(deleted, 0);

        let deleted = f
            .executor
            .search_delete_by_post(&RequestContext::system(1), f.post_id)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(f.index.document_ids(), vec!["900".to_string()]);
    }
}

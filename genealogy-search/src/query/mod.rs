//! Query builder.
//!
//! Translates a [`SearchRequest`] into a [`SearchDefinition`]. Each searched value becomes a
//! sub-query whose shape depends on its fuzziness flags. Values searched with default
//! fuzziness only rank results and go into `should`; values with any explicit flag must
//! match and go into `must`. Tenant, privacy and facet selections become exact-term filters.

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use genealogy_search_repository::{Aggregation, BoolQuery, Query, SearchDefinition};
use genealogy_search_shared::{
    DateFuzziness, EventType, NameFuzziness, NameType, PlaceFuzziness, Relative, RequestContext,
    SearchRequest, MAX_PLACE_LEVELS, PRIVACY_PUBLIC,
};

use crate::errors::SearchError;
use crate::names::NameVariantLookup;
use crate::text::{fold_lower, has_search_markers, has_wildcard, split_word};

pub const EXACT_NAME_BOOST: f64 = 1.0;
pub const VARIANT_NAME_BOOST: f64 = 0.8;
pub const NARROW_NAME_BOOST: f64 = 0.8;
pub const BROAD_NAME_BOOST: f64 = 0.6;
pub const FUZZY_NAME_BOOST: f64 = 0.2;
pub const INITIAL_NAME_BOOST: f64 = 0.4;
pub const WILDCARD_NAME_BOOST: f64 = 0.5;

pub const EXACT_YEAR_BOOST: f64 = 0.7;
pub const RANGE_YEAR_BOOST: f64 = 0.3;

pub const EXACT_PLACE_BOOST: f64 = 1.0;
pub const LEVEL_PLACE_BOOST: f64 = 0.2;
pub const FUZZY_PLACE_BOOST: f64 = 0.2;
pub const WILDCARD_PLACE_BOOST: f64 = 0.7;

/// Buckets returned per facet.
pub const FACET_SIZE: usize = 250;

/// A top-level level that is too broad to rank on by itself.
const SKIPPED_LEVEL: &str = "United States";

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\b(\d{4})\b").unwrap();
}

/// Sub-queries split by whether they must match.
#[derive(Debug, Default)]
struct Clauses {
    must: Vec<Query>,
    should: Vec<Query>,
}

impl Clauses {
    fn push(&mut self, required: bool, query: Query) {
        if required {
            self.must.push(query);
        } else {
            self.should.push(query);
        }
    }
}

/// First four-digit year in a date value.
fn extract_year(value: &str) -> Option<i64> {
    YEAR.captures(value).and_then(|c| c[1].parse().ok())
}

/// Builds search definitions from requests.
pub struct QueryBuilder {
    names: Arc<NameVariantLookup>,
}

impl QueryBuilder {
    pub fn new(names: Arc<NameVariantLookup>) -> Self {
        Self { names }
    }

    /// Build the search definition for `req` on behalf of `ctx`.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchDefinition)` - The query, facets and paging
    /// * `Err(SearchError::Unauthorized)` - The request names another tenant
    pub async fn build(
        &self,
        ctx: &RequestContext,
        req: &SearchRequest,
    ) -> Result<SearchDefinition, SearchError> {
        let filter = self.filters(ctx, req)?;
        let mut top = Clauses::default();

        let mut principal = Clauses::default();
        if let Some((value, fuzziness)) = req.given() {
            self.name_clauses(&mut principal, "given", NameType::Given, value, fuzziness)
                .await?;
        }
        if let Some((value, fuzziness)) = req.surname() {
            self.name_clauses(&mut principal, "surname", NameType::Surname, value, fuzziness)
                .await?;
        }
        if !principal.must.is_empty() || !principal.should.is_empty() {
            top.must.push(Query::Bool(BoolQuery {
                must: principal.must,
                should: principal.should,
                filter: Vec::new(),
            }));
        }

        for relative in Relative::ALL {
            if let Some((value, fuzziness)) = req.relative_given(relative) {
                let field = format!("{}Given", relative.prefix());
                self.name_clauses(&mut top, &field, NameType::Given, value, fuzziness)
                    .await?;
            }
            if let Some((value, fuzziness)) = req.relative_surname(relative) {
                let field = format!("{}Surname", relative.prefix());
                self.name_clauses(&mut top, &field, NameType::Surname, value, fuzziness)
                    .await?;
            }
        }

        for event in EventType::ALL {
            if let Some((value, fuzziness)) = req.event_date(event) {
                if let Some(query) = date_query(event, value, fuzziness) {
                    top.push(!fuzziness.is_default(), query);
                }
            }
        }
        if let Some((value, fuzziness)) = req.any_date() {
            let queries = EventType::ALL
                .into_iter()
                .filter_map(|event| date_query(event, value, fuzziness))
                .collect();
            if let Some(query) = Query::one_of(queries) {
                top.push(!fuzziness.is_default(), query);
            }
        }

        for event in EventType::ALL {
            if let Some((value, fuzziness)) = req.event_place(event) {
                if let Some(query) = place_query(event, value, fuzziness) {
                    top.push(!fuzziness.is_default(), query);
                }
            }
        }
        if let Some((value, fuzziness)) = req.any_place() {
            let queries = EventType::ALL
                .into_iter()
                .filter_map(|event| place_query(event, value, fuzziness))
                .collect();
            if let Some(query) = Query::one_of(queries) {
                top.push(!fuzziness.is_default(), query);
            }
        }

        for (field, value) in req.text_fields() {
            if let Some(query) = text_query(field, value) {
                top.must.push(query);
            }
        }

        Ok(SearchDefinition {
            query: BoolQuery {
                must: top.must,
                should: top.should,
                filter,
            },
            aggs: facets(req),
            from: req.clamped_from(),
            size: req.clamped_size(),
        })
    }

    fn filters(
        &self,
        ctx: &RequestContext,
        req: &SearchRequest,
    ) -> Result<Vec<Query>, SearchError> {
        let society_id = req.society_id.unwrap_or(ctx.society_id);
        if society_id != ctx.society_id {
            warn!(
                requested = society_id,
                acting = ctx.society_id,
                user_id = ?ctx.user_id,
                "Search for another society rejected"
            );
            return Err(SearchError::Unauthorized {
                requested: society_id,
                acting: ctx.society_id,
            });
        }

        let mut filter = vec![Query::filter_term("societyId", society_id)];
        if !ctx.is_authenticated() {
            filter.push(Query::filter_term("privacy", PRIVACY_PUBLIC));
        }
        if let Some(category) = req.category() {
            filter.push(Query::filter_term("category", category));
        }
        if let Some(collection) = req.collection() {
            filter.push(Query::filter_term("collection", collection));
        }
        for level in 1..=3 {
            if let Some(place) = req.collection_place(level) {
                filter.push(Query::filter_term(format!("collectionPlace{}", level), place));
            }
        }
        Ok(filter)
    }

    /// Add the sub-queries for every word of a name value.
    async fn name_clauses(
        &self,
        clauses: &mut Clauses,
        field: &str,
        name_type: NameType,
        value: &str,
        fuzziness: NameFuzziness,
    ) -> Result<(), SearchError> {
        let required = !fuzziness.is_default();
        for token in split_word(value) {
            if let Some(query) = self.name_query(field, name_type, token, fuzziness).await? {
                clauses.push(required, query);
            }
        }
        Ok(())
    }

    async fn name_query(
        &self,
        field: &str,
        name_type: NameType,
        token: &str,
        fuzziness: NameFuzziness,
    ) -> Result<Option<Query>, SearchError> {
        if has_wildcard(token) {
            return Ok(wildcard_query(field, token, WILDCARD_NAME_BOOST));
        }
        if let Some(fuzzy) = token.strip_prefix('~') {
            let folded = fold_lower(fuzzy);
            return Ok((!folded.is_empty()).then(|| Query::fuzzy(field, folded, FUZZY_NAME_BOOST)));
        }
        if fuzziness == NameFuzziness::EXACT {
            return Ok(Some(Query::match_query(field, token, EXACT_NAME_BOOST)));
        }

        let folded = fold_lower(token);
        let mut queries = vec![Query::match_query(field, token, EXACT_NAME_BOOST)];
        if fuzziness.enables(NameFuzziness::VARIANTS) {
            let variants = self.names.get_name_variants(name_type, &folded).await?;
            queries.extend(
                variants
                    .into_iter()
                    .map(|variant| Query::match_query(field, variant, VARIANT_NAME_BOOST)),
            );
        }
        if fuzziness.enables(NameFuzziness::SOUNDS_LIKE_NARROW) {
            queries.push(Query::match_query(
                format!("{}.narrow", field),
                token,
                NARROW_NAME_BOOST,
            ));
        }
        if fuzziness.enables(NameFuzziness::SOUNDS_LIKE_BROAD) {
            queries.push(Query::match_query(
                format!("{}.broad", field),
                token,
                BROAD_NAME_BOOST,
            ));
        }
        if fuzziness.enables(NameFuzziness::LEVENSHTEIN) {
            queries.push(Query::fuzzy(field, folded, FUZZY_NAME_BOOST));
        }
        if name_type == NameType::Given && fuzziness.enables(NameFuzziness::INITIALS) {
            if let Some(initial) = token.chars().next() {
                queries.push(Query::match_query(
                    field,
                    initial.to_string(),
                    INITIAL_NAME_BOOST,
                ));
            }
        }
        Ok(Query::one_of(queries))
    }
}

/// A wildcard query, or nothing when the value starts with a wildcard.
fn wildcard_query(field: &str, token: &str, boost: f64) -> Option<Query> {
    if token.starts_with(['*', '?']) {
        return None;
    }
    Some(Query::wildcard(field, token.to_lowercase(), boost))
}

fn date_query(event: EventType, value: &str, fuzziness: DateFuzziness) -> Option<Query> {
    let year = extract_year(value)?;
    let field = format!("{}Year", event.prefix());
    let exact = Query::term(field.clone(), year, EXACT_YEAR_BOOST);
    match fuzziness.range_years() {
        None => Some(exact),
        Some(range) => Some(Query::dis_max(vec![
            exact,
            Query::range(field, year - range, year + range, RANGE_YEAR_BOOST),
        ])),
    }
}

fn place_query(event: EventType, value: &str, fuzziness: PlaceFuzziness) -> Option<Query> {
    let label = format!("{}Place", event.prefix());
    if has_search_markers(value) {
        return marked_tokens_query(&label, value, FUZZY_PLACE_BOOST, WILDCARD_PLACE_BOOST);
    }

    let mut levels: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .rev()
        .collect();
    levels.truncate(MAX_PLACE_LEVELS);
    if levels.is_empty() {
        return None;
    }

    let depth = levels.len();
    let joined = levels.join(",");
    let field = format!("{}{}", label, depth);
    let mut queries = vec![
        Query::term(field.clone(), joined.clone(), EXACT_PLACE_BOOST),
        Query::term(field, format!("{},", joined), EXACT_PLACE_BOOST),
    ];

    if fuzziness.enables(PlaceFuzziness::HIGHER_JURISDICTIONS) {
        for i in 1..depth {
            let higher = levels[..i].join(",");
            if higher == SKIPPED_LEVEL {
                continue;
            }
            queries.push(Query::term(
                format!("{}{}", label, i),
                higher,
                i as f64 * LEVEL_PLACE_BOOST,
            ));
        }
    }

    Query::one_of(queries)
}

/// Per-token fuzzy, wildcard or plain matches for a value carrying search markers.
fn marked_tokens_query(
    field: &str,
    value: &str,
    fuzzy_boost: f64,
    wildcard_boost: f64,
) -> Option<Query> {
    let mut queries: Vec<Query> = split_word(value)
        .into_iter()
        .filter_map(|token| {
            if has_wildcard(token) {
                wildcard_query(field, token, wildcard_boost)
            } else if let Some(fuzzy) = token.strip_prefix('~') {
                let folded = fold_lower(fuzzy);
                (!folded.is_empty()).then(|| Query::fuzzy(field, folded, fuzzy_boost))
            } else {
                Some(Query::match_query(field, fold_lower(token), 1.0))
            }
        })
        .collect();

    match queries.len() {
        0 => None,
        1 => queries.pop(),
        _ => Some(Query::Bool(BoolQuery {
            must: queries,
            ..Default::default()
        })),
    }
}

fn text_query(field: &str, value: &str) -> Option<Query> {
    if has_search_markers(value) {
        marked_tokens_query(field, value, FUZZY_NAME_BOOST, WILDCARD_NAME_BOOST)
    } else {
        Some(Query::match_all_terms(field, value))
    }
}

fn facets(req: &SearchRequest) -> BTreeMap<String, Aggregation> {
    let mut aggs = BTreeMap::new();
    let mut add = |field: &str| {
        aggs.insert(field.to_string(), Aggregation::terms(field, FACET_SIZE));
    };

    if req.category_facet {
        add("category");
    }
    if req.collection_facet && req.category().is_some() {
        add("collection");
    }
    let place1 = req.collection_place(1).is_some();
    let place2 = req.collection_place(2).is_some();
    if req.collection_place1_facet {
        add("collectionPlace1");
    }
    if req.collection_place2_facet && place1 {
        add("collectionPlace2");
    }
    if req.collection_place3_facet && place1 && place2 {
        add("collectionPlace3");
    }
    aggs
}

#[cfg(test)]
mod tests {
    use super::*;
    use genealogy_search_repository::{InMemoryGazetteer, TermValue};
    use genealogy_search_shared::PlaceSettings;

    fn builder() -> QueryBuilder {
        let gazetteer = InMemoryGazetteer::new(PlaceSettings::default()).with_name_variants(
            NameType::Surname,
            "flintstone",
            vec!["flintston".to_string()],
        );
        QueryBuilder::new(Arc::new(NameVariantLookup::new(Arc::new(gazetteer))))
    }

    fn member() -> RequestContext {
        RequestContext::new(1, Some(42))
    }

    fn term(field: &str, value: impl Into<TermValue>, boost: f64) -> Query {
        Query::term(field, value, boost)
    }

    #[tokio::test]
    async fn test_exact_surname_default_given() {
        let req = SearchRequest {
            given: Some("Fred".to_string()),
            surname: Some("Flintstone".to_string()),
            surname_fuzziness: NameFuzziness::EXACT,
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();

        let expected = Query::Bool(BoolQuery {
            must: vec![Query::match_query("surname", "Flintstone", 1.0)],
            should: vec![Query::dis_max(vec![
                Query::match_query("given", "Fred", 1.0),
                Query::match_query("given.narrow", "Fred", 0.8),
                Query::match_query("given.broad", "Fred", 0.6),
                Query::fuzzy("given", "fred", 0.2),
                Query::match_query("given", "F", 0.4),
            ])],
            filter: vec![],
        });
        assert_eq!(def.query.must, vec![expected]);
        assert!(def.query.should.is_empty());
        assert_eq!(def.query.filter, vec![term("societyId", 1u32, 1.0)]);
        assert_eq!(def.from, 0);
        assert_eq!(def.size, 10);
        assert!(def.aggs.is_empty());
    }

    #[tokio::test]
    async fn test_date_fuzziness_two() {
        let req = SearchRequest {
            surname: Some("Flintstone".to_string()),
            surname_fuzziness: NameFuzziness::EXACT,
            birth_date: Some("1900".to_string()),
            birth_date_fuzziness: DateFuzziness::TWO,
            death_date: Some("1995".to_string()),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();

        assert_eq!(def.query.must.len(), 2);
        assert_eq!(
            def.query.must[1],
            Query::dis_max(vec![
                term("birthYear", 1900i64, 0.7),
                Query::range("birthYear", 1898, 1902, 0.3),
            ])
        );
        assert_eq!(
            def.query.should,
            vec![Query::dis_max(vec![
                term("deathYear", 1995i64, 0.7),
                Query::range("deathYear", 1990, 2000, 0.3),
            ])]
        );
    }

    #[tokio::test]
    async fn test_exact_date_is_a_single_term() {
        let req = SearchRequest {
            birth_date: Some("abt 1900".to_string()),
            birth_date_fuzziness: DateFuzziness::EXACT,
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        assert_eq!(def.query.must, vec![term("birthYear", 1900i64, 0.7)]);
    }

    #[tokio::test]
    async fn test_place_levels_default() {
        let req = SearchRequest {
            birth_place: Some("Autauga, Alabama, United States".to_string()),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();

        assert!(def.query.must.is_empty());
        assert_eq!(
            def.query.should,
            vec![Query::dis_max(vec![
                term("birthPlace3", "United States,Alabama,Autauga", 1.0),
                term("birthPlace3", "United States,Alabama,Autauga,", 1.0),
                term("birthPlace2", "United States,Alabama", 0.4),
            ])]
        );
    }

    #[tokio::test]
    async fn test_exact_place_skips_higher_levels() {
        let req = SearchRequest {
            death_place: Some("Bedrock".to_string()),
            death_place_fuzziness: PlaceFuzziness::EXACT,
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        assert_eq!(
            def.query.must,
            vec![Query::dis_max(vec![
                term("deathPlace1", "Bedrock", 1.0),
                term("deathPlace1", "Bedrock,", 1.0),
            ])]
        );
    }

    #[tokio::test]
    async fn test_place_with_markers() {
        let req = SearchRequest {
            birth_place: Some("~Autaga Ala* County".to_string()),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        assert_eq!(
            def.query.should,
            vec![Query::Bool(BoolQuery {
                must: vec![
                    Query::fuzzy("birthPlace", "autaga", 0.2),
                    Query::wildcard("birthPlace", "ala*", 0.7),
                    Query::match_query("birthPlace", "county", 1.0),
                ],
                ..Default::default()
            })]
        );
    }

    #[tokio::test]
    async fn test_variants_and_wildcards() {
        let req = SearchRequest {
            given: Some("*red".to_string()),
            surname: Some("Flintstone".to_string()),
            surname_fuzziness: NameFuzziness::VARIANTS,
            father_given: Some("Ed*".to_string()),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();

        let principal = Query::Bool(BoolQuery {
            must: vec![Query::dis_max(vec![
                Query::match_query("surname", "Flintstone", 1.0),
                Query::match_query("surname", "flintston", 0.8),
            ])],
            ..Default::default()
        });
        assert_eq!(def.query.must, vec![principal]);
        assert_eq!(
            def.query.should,
            vec![Query::wildcard("fatherGiven", "ed*", 0.5)]
        );
    }

    #[tokio::test]
    async fn test_keywords_require_all_terms() {
        let req = SearchRequest {
            keywords: Some("quarry foreman".to_string()),
            book_title: Some("Led*".to_string()),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        assert_eq!(
            def.query.must,
            vec![
                Query::match_all_terms("keywords", "quarry foreman"),
                Query::wildcard("book_title", "led*", 0.5),
            ]
        );
    }

    #[tokio::test]
    async fn test_any_date_spans_events() {
        let req = SearchRequest {
            any_date: Some("1900".to_string()),
            any_date_fuzziness: DateFuzziness::ONE,
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        match &def.query.must[..] {
            [Query::DisMax { queries }] => {
                assert_eq!(queries.len(), EventType::ALL.len());
                assert_eq!(
                    queries[0],
                    Query::dis_max(vec![
                        term("birthYear", 1900i64, 0.7),
                        Query::range("birthYear", 1899, 1901, 0.3),
                    ])
                );
            }
            other => panic!("unexpected clauses: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_society_is_unauthorized() {
        let req = SearchRequest {
            society_id: Some(2),
            ..Default::default()
        };

        let err = builder().build(&member(), &req).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Unauthorized {
                requested: 2,
                acting: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_filters() {
        let req = SearchRequest {
            category: Some("Census".to_string()),
            collection: Some("1900 Census".to_string()),
            collection_place1: Some("United States".to_string()),
            ..Default::default()
        };

        let def = builder()
            .build(&RequestContext::new(1, None), &req)
            .await
            .unwrap();
        assert_eq!(
            def.query.filter,
            vec![
                term("societyId", 1u32, 1.0),
                term("privacy", "public", 1.0),
                term("category", "Census", 1.0),
                term("collection", "1900 Census", 1.0),
                term("collectionPlace1", "United States", 1.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_facet_gating() {
        let mut req = SearchRequest {
            category_facet: true,
            collection_facet: true,
            collection_place2_facet: true,
            collection_place3_facet: true,
            collection_place1: Some(String::new()),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        let names: Vec<&str> = def.aggs.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["category"]);

        req.collection_place1 = Some("United States".to_string());
        req.category = Some("Census".to_string());
        let def = builder().build(&member(), &req).await.unwrap();
        let names: Vec<&str> = def.aggs.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["category", "collection", "collectionPlace2"]);
        assert_eq!(
            def.aggs["collectionPlace2"],
            Aggregation::terms("collectionPlace2", 250)
        );
    }

    #[tokio::test]
    async fn test_paging_is_clamped() {
        let req = SearchRequest {
            from: Some(1_000_000),
            size: Some(5000),
            ..Default::default()
        };

        let def = builder().build(&member(), &req).await.unwrap();
        assert_eq!(def.from, genealogy_search_shared::MAX_FROM);
        assert_eq!(def.size, genealogy_search_shared::MAX_SIZE);
    }
}

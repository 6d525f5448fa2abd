//! Request and response types for search engine operations.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::SearchIndexError;

/// One document to index (or replace) by ID.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkIndexItem {
    /// Stable document ID; re-indexing replaces the stored document.
    pub doc_id: String,
    /// The `_source` body.
    pub body: Value,
}

/// Result of a batch operation for a single item.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document ID.
    pub doc_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Engine-side reason if the operation failed.
    pub error: Option<String>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// Allows callers to handle partial failures: a bulk request can succeed as a whole while
/// individual items are rejected.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

/// A single raw hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub score: f64,
    pub source: Value,
}

/// One bucket of a terms aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsBucket {
    pub key: String,
    pub doc_count: u64,
}

/// Engine search response, reduced to what result shaping needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSearchResponse {
    pub total: u64,
    pub max_score: f64,
    pub hits: Vec<RawHit>,
    pub aggregations: BTreeMap<String, Vec<TermsBucket>>,
}

impl RawSearchResponse {
    /// Parse an Elasticsearch/OpenSearch `_search` response body.
    ///
    /// # Arguments
    ///
    /// * `body` - The decoded response JSON
    ///
    /// # Returns
    ///
    /// * `Ok(RawSearchResponse)` - The parsed response
    /// * `Err(SearchIndexError)` - If the `hits` section is missing or malformed
    pub fn from_json(body: &Value) -> Result<Self, SearchIndexError> {
        let hits_section = body
            .get("hits")
            .ok_or_else(|| SearchIndexError::parse("response has no hits section"))?;

        let total = match hits_section.get("total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(obj) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
            None => 0,
        };
        let max_score = hits_section
            .get("max_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let raw_hits = hits_section
            .get("hits")
            .and_then(Value::as_array)
            .ok_or_else(|| SearchIndexError::parse("hits.hits is not an array"))?;

        let mut hits = Vec::with_capacity(raw_hits.len());
        for hit in raw_hits {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchIndexError::parse("hit without _id"))?;
            hits.push(RawHit {
                id: id.to_string(),
                score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
                source: hit.get("_source").cloned().unwrap_or(Value::Null),
            });
        }

        let mut aggregations = BTreeMap::new();
        if let Some(Value::Object(aggs)) = body.get("aggregations") {
            for (name, agg) in aggs {
                let buckets = agg
                    .get("buckets")
                    .and_then(Value::as_array)
                    .map(|buckets| {
                        buckets
                            .iter()
                            .filter_map(|b| {
                                let key = match b.get("key")? {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                let doc_count = b.get("doc_count")?.as_u64()?;
                                Some(TermsBucket { key, doc_count })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                aggregations.insert(name.clone(), buckets);
            }
        }

        Ok(Self {
            total,
            max_score,
            hits,
            aggregations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_response() {
        let body = json!({
            "took": 3,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "max_score": 2.5,
                "hits": [
                    { "_id": "1", "_score": 2.5, "_source": { "given": "Fred" } },
                    { "_id": "1_s", "_score": 1.0, "_source": { "given": "Wilma" } }
                ]
            },
            "aggregations": {
                "category": {
                    "buckets": [ { "key": "Vital", "doc_count": 2 } ]
                }
            }
        });

        let response = RawSearchResponse::from_json(&body).unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.max_score, 2.5);
        assert_eq!(response.hits[1].id, "1_s");
        assert_eq!(response.hits[0].source["given"], "Fred");
        assert_eq!(
            response.aggregations["category"],
            vec![TermsBucket {
                key: "Vital".to_string(),
                doc_count: 2
            }]
        );
    }

    #[test]
    fn test_parse_rejects_missing_hits() {
        let result = RawSearchResponse::from_json(&json!({ "error": "boom" }));
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }

    #[test]
    fn test_null_max_score() {
        let body = json!({ "hits": { "total": 0, "max_score": null, "hits": [] } });
        let response = RawSearchResponse::from_json(&body).unwrap();
        assert_eq!(response.max_score, 0.0);
        assert!(response.hits.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult {
                doc_id: "1".to_string(),
                success: true,
                error: None,
            },
            BatchOperationResult {
                doc_id: "2".to_string(),
                success: false,
                error: Some("mapper_parsing_exception".to_string()),
            },
        ]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }
}

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::dsl::{Aggregation, BoolQuery, Operator, Query, SearchDefinition, TermValue};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{
    BatchOperationResult, BatchOperationSummary, BulkIndexItem, RawHit, RawSearchResponse,
    TermsBucket,
};

/// An in-memory search index that evaluates the query DSL over stored `_source` bodies.
///
/// Scoring is the sum of matching clause boosts inside a bool and the maximum inside a
/// dis-max. `term` compares whole stored values exactly, as on a keyword field; `match`,
/// `wildcard` and `fuzzy` tokenize on non-alphanumeric characters and lowercase.
/// Phonetic subfields (`.narrow`, `.broad`) never match.
#[derive(Default)]
pub struct InMemorySearchIndex {
    docs: RwLock<BTreeMap<String, Value>>,
    rejected: Mutex<HashSet<String>>,
    bulk_calls: AtomicUsize,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future bulk item with this ID fail.
    pub fn reject_document(&self, doc_id: impl Into<String>) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.insert(doc_id.into());
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of every stored document, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        self.docs
            .read()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn document(&self, doc_id: &str) -> Option<Value> {
        self.docs.read().ok().and_then(|d| d.get(doc_id).cloned())
    }

    /// Number of `bulk_index` calls so far.
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }
}

fn lock_err<T>(_: T) -> SearchIndexError {
    SearchIndexError::connection("in-memory index lock poisoned")
}

fn field_values<'a>(doc: &'a Value, field: &str) -> Vec<&'a Value> {
    match doc.get(field) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(v) => vec![v],
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_tokens(doc: &Value, field: &str) -> Vec<String> {
    field_values(doc, field)
        .into_iter()
        .filter_map(Value::as_str)
        .flat_map(tokens)
        .collect()
}

fn as_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_phonetic(field: &str) -> bool {
    field.ends_with(".narrow") || field.ends_with(".broad")
}

/// Glob match supporting `*` and `?`.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some('*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some('?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(current[j] + 1);
        }
        prev = current;
    }
    prev[b.len()]
}

/// Edit distance allowed by `fuzziness=AUTO`.
fn auto_distance(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn eval_bool(query: &BoolQuery, doc: &Value) -> Option<f64> {
    let mut score = 0.0;
    for clause in &query.must {
        score += evaluate(clause, doc)?;
    }
    for clause in &query.filter {
        evaluate(clause, doc)?;
    }
    let mut should_matched = false;
    for clause in &query.should {
        if let Some(s) = evaluate(clause, doc) {
            score += s;
            should_matched = true;
        }
    }
    let should_required = query.must.is_empty() && query.filter.is_empty();
    if should_required && !query.should.is_empty() && !should_matched {
        return None;
    }
    Some(score)
}

/// Score `doc` against `query`; `None` when it does not match.
fn evaluate(query: &Query, doc: &Value) -> Option<f64> {
    match query {
        Query::Bool(b) => eval_bool(b, doc),
        Query::DisMax { queries } => queries
            .iter()
            .filter_map(|q| evaluate(q, doc))
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(CmpOrdering::Equal)),
        Query::Match {
            field,
            query,
            boost,
            operator,
        } => {
            if is_phonetic(field) {
                return None;
            }
            let wanted = tokens(query);
            if wanted.is_empty() {
                return None;
            }
            let have = field_tokens(doc, field);
            let matched = match operator {
                Operator::Or => wanted.iter().any(|t| have.contains(t)),
                Operator::And => wanted.iter().all(|t| have.contains(t)),
            };
            matched.then_some(*boost)
        }
        Query::Term {
            field,
            value,
            boost,
        } => {
            let values = field_values(doc, field);
            let matched = match value {
                TermValue::Str(s) => values.iter().any(|v| v.as_str() == Some(s.as_str())),
                TermValue::Int(i) => values.iter().any(|v| as_number(v) == Some(*i)),
            };
            matched.then_some(*boost)
        }
        Query::Range {
            field,
            gte,
            lte,
            boost,
        } => {
            let matched = field_values(doc, field).into_iter().any(|v| {
                as_number(v).is_some_and(|n| {
                    gte.map_or(true, |g| n >= g) && lte.map_or(true, |l| n <= l)
                })
            });
            matched.then_some(*boost)
        }
        Query::Wildcard {
            field,
            value,
            boost,
        } => {
            let pattern: Vec<char> = value.to_lowercase().chars().collect();
            let whole_values = field_values(doc, field)
                .into_iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase);
            let matched = whole_values
                .chain(field_tokens(doc, field))
                .any(|candidate| {
                    let text: Vec<char> = candidate.chars().collect();
                    glob_match(&pattern, &text)
                });
            matched.then_some(*boost)
        }
        Query::Fuzzy {
            field,
            value,
            boost,
        } => {
            let term = value.to_lowercase();
            let max_distance = auto_distance(&term);
            let matched = field_tokens(doc, field)
                .iter()
                .any(|t| levenshtein(t, &term) <= max_distance);
            matched.then_some(*boost)
        }
    }
}

fn terms_aggregation(docs: &[&Value], field: &str, size: usize) -> Vec<TermsBucket> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for doc in docs {
        let mut seen = HashSet::new();
        for value in field_values(doc, field) {
            let key = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if seen.insert(key.clone()) {
                *counts.entry(key).or_default() += 1;
            }
        }
    }
    let mut buckets: Vec<TermsBucket> = counts
        .into_iter()
        .map(|(key, doc_count)| TermsBucket { key, doc_count })
        .collect();
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(size);
    buckets
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn bulk_index(
        &self,
        items: &[BulkIndexItem],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let rejected = self.rejected.lock().map_err(lock_err)?.clone();
        let mut docs = self.docs.write().map_err(lock_err)?;

        let results = items
            .iter()
            .map(|item| {
                if rejected.contains(&item.doc_id) {
                    return BatchOperationResult {
                        doc_id: item.doc_id.clone(),
                        success: false,
                        error: Some("document rejected".to_string()),
                    };
                }
                docs.insert(item.doc_id.clone(), item.body.clone());
                BatchOperationResult {
                    doc_id: item.doc_id.clone(),
                    success: true,
                    error: None,
                }
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }

    async fn search(
        &self,
        definition: &SearchDefinition,
    ) -> Result<RawSearchResponse, SearchIndexError> {
        let docs = self.docs.read().map_err(lock_err)?;

        let mut matches: Vec<(&String, &Value, f64)> = docs
            .iter()
            .filter_map(|(id, doc)| eval_bool(&definition.query, doc).map(|s| (id, doc, s)))
            .collect();
        matches.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let matched_docs: Vec<&Value> = matches.iter().map(|(_, doc, _)| *doc).collect();
        let aggregations = definition
            .aggs
            .iter()
            .map(|(name, agg)| match agg {
                Aggregation::Terms { field, size } => {
                    (name.clone(), terms_aggregation(&matched_docs, field, *size))
                }
            })
            .collect();

        let max_score = matches.first().map(|m| m.2).unwrap_or(0.0);
        let hits = matches
            .iter()
            .skip(definition.from)
            .take(definition.size)
            .map(|(id, doc, score)| RawHit {
                id: (*id).clone(),
                score: *score,
                source: (*doc).clone(),
            })
            .collect();

        debug!(total = matches.len(), "In-memory search");
        Ok(RawSearchResponse {
            total: matches.len() as u64,
            max_score,
            hits,
            aggregations,
        })
    }

    async fn get(&self, doc_id: &str) -> Result<Option<Value>, SearchIndexError> {
        let docs = self.docs.read().map_err(lock_err)?;
        Ok(docs.get(doc_id).cloned())
    }

    async fn delete_by_query(&self, query: &Query) -> Result<u64, SearchIndexError> {
        let mut docs = self.docs.write().map_err(lock_err)?;
        let before = docs.len();
        docs.retain(|_, doc| evaluate(query, doc).is_none());
        Ok((before - docs.len()) as u64)
    }
}

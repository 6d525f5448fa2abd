//! Engine-neutral query DSL.
//!
//! The query builder produces a [`SearchDefinition`]; the OpenSearch provider renders it with
//! [`SearchDefinition::to_json`] and the in-memory index evaluates it directly.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// A term value.
#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Str(String),
    Int(i64),
}

impl TermValue {
    fn to_json(&self) -> Value {
        match self {
            TermValue::Str(s) => Value::String(s.clone()),
            TermValue::Int(i) => json!(i),
        }
    }
}

impl From<&str> for TermValue {
    fn from(value: &str) -> Self {
        TermValue::Str(value.to_string())
    }
}

impl From<String> for TermValue {
    fn from(value: String) -> Self {
        TermValue::Str(value)
    }
}

impl From<i64> for TermValue {
    fn from(value: i64) -> Self {
        TermValue::Int(value)
    }
}

impl From<u32> for TermValue {
    fn from(value: u32) -> Self {
        TermValue::Int(value as i64)
    }
}

/// Match operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Or,
    And,
}

/// A boolean query with must / should / filter clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub filter: Vec<Query>,
}

impl BoolQuery {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.filter.is_empty()
    }
}

/// A query tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Bool(BoolQuery),
    /// Scores as the maximum of its matching clauses.
    DisMax { queries: Vec<Query> },
    Match {
        field: String,
        query: String,
        boost: f64,
        operator: Operator,
    },
    Term {
        field: String,
        value: TermValue,
        boost: f64,
    },
    Range {
        field: String,
        gte: Option<i64>,
        lte: Option<i64>,
        boost: f64,
    },
    Wildcard {
        field: String,
        value: String,
        boost: f64,
    },
    /// Edit-distance match with `fuzziness=AUTO` and `rewrite=constant_score_boolean`.
    Fuzzy {
        field: String,
        value: String,
        boost: f64,
    },
}

impl Query {
    pub fn match_query(field: impl Into<String>, query: impl Into<String>, boost: f64) -> Self {
        Query::Match {
            field: field.into(),
            query: query.into(),
            boost,
            operator: Operator::Or,
        }
    }

    pub fn match_all_terms(field: impl Into<String>, query: impl Into<String>) -> Self {
        Query::Match {
            field: field.into(),
            query: query.into(),
            boost: 1.0,
            operator: Operator::And,
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<TermValue>, boost: f64) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
            boost,
        }
    }

    /// Unboosted term, used in filters.
    pub fn filter_term(field: impl Into<String>, value: impl Into<TermValue>) -> Self {
        Self::term(field, value, 1.0)
    }

    pub fn range(field: impl Into<String>, gte: i64, lte: i64, boost: f64) -> Self {
        Query::Range {
            field: field.into(),
            gte: Some(gte),
            lte: Some(lte),
            boost,
        }
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<String>, boost: f64) -> Self {
        Query::Wildcard {
            field: field.into(),
            value: value.into(),
            boost,
        }
    }

    pub fn fuzzy(field: impl Into<String>, value: impl Into<String>, boost: f64) -> Self {
        Query::Fuzzy {
            field: field.into(),
            value: value.into(),
            boost,
        }
    }

    pub fn dis_max(queries: Vec<Query>) -> Self {
        Query::DisMax { queries }
    }

    /// Collapse a list of alternatives: `None` when empty, the query itself when single,
    /// a dis-max otherwise.
    pub fn one_of(mut queries: Vec<Query>) -> Option<Self> {
        match queries.len() {
            0 => None,
            1 => queries.pop(),
            _ => Some(Query::dis_max(queries)),
        }
    }

    /// Render the engine JSON for this node.
    pub fn to_json(&self) -> Value {
        match self {
            Query::Bool(b) => {
                let mut body = Map::new();
                for (key, clauses) in [("must", &b.must), ("should", &b.should), ("filter", &b.filter)]
                {
                    if !clauses.is_empty() {
                        body.insert(
                            key.to_string(),
                            Value::Array(clauses.iter().map(Query::to_json).collect()),
                        );
                    }
                }
                json!({ "bool": body })
            }
            Query::DisMax { queries } => json!({
                "dis_max": { "queries": queries.iter().map(Query::to_json).collect::<Vec<_>>() }
            }),
            Query::Match {
                field,
                query,
                boost,
                operator,
            } => {
                let mut inner = json!({ "query": query, "boost": boost });
                if *operator == Operator::And {
                    inner["operator"] = json!("and");
                }
                json!({ "match": { field.as_str(): inner } })
            }
            Query::Term {
                field,
                value,
                boost,
            } => json!({ "term": { field.as_str(): { "value": value.to_json(), "boost": boost } } }),
            Query::Range {
                field,
                gte,
                lte,
                boost,
            } => {
                let mut inner = json!({ "boost": boost });
                if let Some(gte) = gte {
                    inner["gte"] = json!(gte);
                }
                if let Some(lte) = lte {
                    inner["lte"] = json!(lte);
                }
                json!({ "range": { field.as_str(): inner } })
            }
            Query::Wildcard {
                field,
                value,
                boost,
            } => json!({ "wildcard": { field.as_str(): { "value": value, "boost": boost } } }),
            Query::Fuzzy {
                field,
                value,
                boost,
            } => json!({
                "fuzzy": {
                    field.as_str(): {
                        "value": value,
                        "fuzziness": "AUTO",
                        "rewrite": "constant_score_boolean",
                        "boost": boost
                    }
                }
            }),
        }
    }
}

/// An aggregation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Terms { field: String, size: usize },
}

impl Aggregation {
    pub fn terms(field: impl Into<String>, size: usize) -> Self {
        Aggregation::Terms {
            field: field.into(),
            size,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size } => {
                json!({ "terms": { "field": field, "size": size } })
            }
        }
    }
}

/// A complete search: query tree, aggregations and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDefinition {
    pub query: BoolQuery,
    pub aggs: BTreeMap<String, Aggregation>,
    pub from: usize,
    pub size: usize,
}

impl SearchDefinition {
    /// Render the engine request body. Total hits are always tracked exactly.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "query": Query::Bool(self.query.clone()).to_json(),
            "from": self.from,
            "size": self.size,
            "track_total_hits": true,
        });
        if !self.aggs.is_empty() {
            let aggs: Map<String, Value> = self
                .aggs
                .iter()
                .map(|(name, agg)| (name.clone(), agg.to_json()))
                .collect();
            body["aggs"] = Value::Object(aggs);
        }
        body
    }
}

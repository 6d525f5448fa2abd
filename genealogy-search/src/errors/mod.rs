//! Error types for the genealogy search core.

use genealogy_search_repository::SearchIndexError;
use genealogy_search_shared::DomainError;
use thiserror::Error;

/// Errors raised while indexing posts or running the publisher worker.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A persistence or reference-data collaborator failed.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// The search engine failed.
    #[error("Index error: {0}")]
    Index(#[from] SearchIndexError),

    /// One or more documents were rejected by the engine.
    #[error("{failed} documents failed to index")]
    BulkFailures { failed: u64 },

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Pub/sub transport error.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PipelineError {
    /// Create a bulk failure error.
    pub fn bulk_failures(failed: u64) -> Self {
        Self::BulkFailures { failed }
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for PipelineError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::TransportError(err.to_string())
    }
}

impl From<SearchError> for PipelineError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Domain(e) => Self::Domain(e),
            SearchError::Index(e) => Self::Index(e),
            unauthorized @ SearchError::Unauthorized { .. } => {
                Self::Domain(DomainError::from(unauthorized))
            }
        }
    }
}

impl From<PipelineError> for DomainError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Domain(e) => e,
            other => DomainError::other(other.to_string()),
        }
    }
}

/// Errors raised while building or executing a search.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The request names a tenant other than the acting one.
    #[error("society {requested} is not accessible from society {acting}")]
    Unauthorized { requested: u32, acting: u32 },

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Index error: {0}")]
    Index(#[from] SearchIndexError),
}

impl SearchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SearchError::Domain(e) if e.is_not_found())
    }
}

impl From<SearchError> for DomainError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Domain(e) => e,
            // Reported as missing so tenants cannot probe each other.
            SearchError::Unauthorized { requested, .. } => {
                DomainError::not_found("society", requested)
            }
            SearchError::Index(e) => DomainError::other(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genealogy_search_shared::ErrorKind;

    #[test]
    fn test_bulk_failures_surface_as_other() {
        let err: DomainError = PipelineError::bulk_failures(3).into();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "3 documents failed to index");
    }

    #[test]
    fn test_unauthorized_surfaces_as_not_found() {
        let err: DomainError = SearchError::Unauthorized {
            requested: 2,
            acting: 1,
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_domain_errors_pass_through() {
        let err: DomainError =
            PipelineError::from(DomainError::concurrent_update("post", 4)).into();
        assert_eq!(err.kind(), ErrorKind::ConcurrentUpdate);
    }
}

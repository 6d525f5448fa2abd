//! Environment settings.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::warn;
use url::Url;

use crate::consumer::TopicUrl;
use crate::errors::PipelineError;
use crate::loader::BulkIndexerConfig;

/// Default engine index (alias) name.
const DEFAULT_INDEX_NAME: &str = "records";

/// Blob store access. Only the ingestion side reads or writes blobs; the worker validates
/// and logs these so one environment file serves every process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobStoreSettings {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub disable_ssl: bool,
}

/// Everything the worker reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub elasticsearch_url: String,
    pub index_name: String,
    pub publisher_url: TopicUrl,
    pub recordswriter_url: Option<TopicUrl>,
    pub imageswriter_url: Option<TopicUrl>,
    pub blob_store: BlobStoreSettings,
    pub base_url: Option<Url>,
    pub bulk_indexer: BulkIndexerConfig,
    /// Process one queue event from stdin instead of consuming the publisher topic.
    pub batch_mode: bool,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `ELASTICSEARCH_URL`: Search engine URL (required)
    /// - `PUB_SUB_PUBLISHER_URL`: Topic the worker consumes (required)
    /// - `PUB_SUB_RECORDSWRITER_URL`, `PUB_SUB_IMAGESWRITER_URL`: Ingestion topics
    /// - `AWS_REGION`, `BLOB_STORE_*`: Blob store access
    /// - `BASE_URL`: Base for absolute URLs
    /// - `INDEX_NAME`: Engine index alias (default: records)
    /// - `BULK_INDEXER_WORKERS`, `BULK_INDEXER_FLUSH_DOCUMENTS`: Bulk indexer sizing
    /// - `LAMBDA_TASK_ROOT`: Presence selects batch-handler mode
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &str| {
            get(name).ok_or_else(|| PipelineError::config(format!("{} is required", name)))
        };
        let topic = |name: &str| get(name).map(|v| TopicUrl::parse(&v)).transpose();

        let defaults = BulkIndexerConfig::default();
        let bulk_indexer = BulkIndexerConfig {
            workers: parse_or(get("BULK_INDEXER_WORKERS"), "BULK_INDEXER_WORKERS", defaults.workers),
            flush_documents: parse_or(
                get("BULK_INDEXER_FLUSH_DOCUMENTS"),
                "BULK_INDEXER_FLUSH_DOCUMENTS",
                defaults.flush_documents,
            ),
            ..defaults
        };

        let base_url = get("BASE_URL")
            .map(|v| Url::parse(&v))
            .transpose()
            .map_err(|e| PipelineError::config(format!("BASE_URL is invalid: {}", e)))?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            elasticsearch_url: required("ELASTICSEARCH_URL")?,
            index_name: get("INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            publisher_url: TopicUrl::parse(&required("PUB_SUB_PUBLISHER_URL")?)?,
            recordswriter_url: topic("PUB_SUB_RECORDSWRITER_URL")?,
            imageswriter_url: topic("PUB_SUB_IMAGESWRITER_URL")?,
            blob_store: BlobStoreSettings {
                region: get("AWS_REGION"),
                endpoint: get("BLOB_STORE_ENDPOINT"),
                access_key: get("BLOB_STORE_ACCESS_KEY"),
                secret_key: get("BLOB_STORE_SECRET_KEY"),
                bucket: get("BLOB_STORE_BUCKET"),
                disable_ssl: parse_or(get("BLOB_STORE_DISABLE_SSL"), "BLOB_STORE_DISABLE_SSL", false),
            },
            base_url,
            bulk_indexer,
            batch_mode: lookup("LAMBDA_TASK_ROOT").is_some(),
        })
    }
}

/// Parse an optional value, falling back to `default` with a warning when it is malformed.
fn parse_or<T>(value: Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, default = %default, "Invalid setting, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, PipelineError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://app:secret@db:5432/cms"),
        ("ELASTICSEARCH_URL", "http://search:9200"),
        ("PUB_SUB_PUBLISHER_URL", "kafka://kafka:9092/publisher"),
    ];

    #[test]
    fn test_defaults() {
        let s = settings(&REQUIRED).unwrap();

        assert_eq!(s.index_name, "records");
        assert_eq!(s.bulk_indexer.workers, 5);
        assert_eq!(s.bulk_indexer.flush_documents, 100);
        assert_eq!(s.publisher_url.scheme(), "kafka");
        assert!(s.recordswriter_url.is_none());
        assert_eq!(s.blob_store, BlobStoreSettings::default());
        assert!(!s.batch_mode);
    }

    #[test]
    fn test_missing_required_variable() {
        let err = settings(&REQUIRED[..2]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: PUB_SUB_PUBLISHER_URL is required"
        );

        let mut blank = REQUIRED.to_vec();
        blank[0] = ("DATABASE_URL", "  ");
        assert!(settings(&blank).is_err());
    }

    #[test]
    fn test_optional_variables() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("BULK_INDEXER_WORKERS", "8"),
            ("BULK_INDEXER_FLUSH_DOCUMENTS", "lots"),
            ("PUB_SUB_IMAGESWRITER_URL", "https://sqs.us-east-2.amazonaws.com/1/images"),
            ("BLOB_STORE_DISABLE_SSL", "true"),
            ("BLOB_STORE_BUCKET", "uploads"),
            ("BASE_URL", "https://records.example.org"),
            ("LAMBDA_TASK_ROOT", "/var/task"),
        ]);
        let s = settings(&vars).unwrap();

        assert_eq!(s.bulk_indexer.workers, 8);
        assert_eq!(s.bulk_indexer.flush_documents, 100);
        assert_eq!(s.imageswriter_url.map(|u| u.scheme()), Some("awssqs"));
        assert!(s.blob_store.disable_ssl);
        assert_eq!(s.blob_store.bucket.as_deref(), Some("uploads"));
        assert_eq!(
            s.base_url.map(|u| u.to_string()).as_deref(),
            Some("https://records.example.org/")
        );
        assert!(s.batch_mode);
    }

    #[test]
    fn test_invalid_topic_url() {
        let mut vars = REQUIRED.to_vec();
        vars[2] = ("PUB_SUB_PUBLISHER_URL", "ftp://queue");
        assert!(settings(&vars).is_err());
    }
}

//! Pub/sub topic URLs.

use std::fmt;

use url::Url;

use genealogy_search_repository::redact_url;

use crate::errors::PipelineError;

const DEFAULT_GROUP_ID: &str = "genealogy-search";

/// A parsed topic URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicUrl {
    /// `awssqs://...`; queue URLs given as `https://sqs.<region>.amazonaws.com/...` are
    /// rewritten to this form with a `region` parameter.
    AwsSqs(String),
    /// `amqp://...`
    Amqp(String),
    /// `kafka://<brokers>/<topic>[?group=<id>]`
    Kafka {
        brokers: String,
        topic: String,
        group_id: String,
    },
    /// `mem://<topic>`
    Memory { topic: String },
}

impl TopicUrl {
    /// Parse a topic URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use genealogy_search::consumer::TopicUrl;
    ///
    /// let url = TopicUrl::parse("https://sqs.us-east-1.amazonaws.com/123456789012/publisher")
    ///     .unwrap();
    /// assert_eq!(
    ///     url,
    ///     TopicUrl::AwsSqs(
    ///         "awssqs://sqs.us-east-1.amazonaws.com/123456789012/publisher?region=us-east-1"
    ///             .to_string()
    ///     )
    /// );
    /// ```
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("kafka://") {
            return parse_kafka(rest);
        }
        if let Some(topic) = raw.strip_prefix("mem://") {
            let topic = topic.trim_end_matches('/');
            if topic.is_empty() {
                return Err(PipelineError::config("mem:// topic URL has no topic"));
            }
            return Ok(TopicUrl::Memory {
                topic: topic.to_string(),
            });
        }

        let url = Url::parse(raw)
            .map_err(|e| PipelineError::config(format!("invalid topic URL: {}", e)))?;
        match url.scheme() {
            "awssqs" => Ok(TopicUrl::AwsSqs(raw.to_string())),
            "amqp" | "amqps" => Ok(TopicUrl::Amqp(raw.to_string())),
            "https" => rewrite_sqs(&url).map(TopicUrl::AwsSqs),
            other => Err(PipelineError::config(format!(
                "unsupported topic URL scheme: {}",
                other
            ))),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            TopicUrl::AwsSqs(_) => "awssqs",
            TopicUrl::Amqp(_) => "amqp",
            TopicUrl::Kafka { .. } => "kafka",
            TopicUrl::Memory { .. } => "mem",
        }
    }
}

fn parse_kafka(rest: &str) -> Result<TopicUrl, PipelineError> {
    let (location, query) = match rest.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (rest, None),
    };
    let (brokers, topic) = location
        .split_once('/')
        .ok_or_else(|| PipelineError::config("kafka:// topic URL has no topic"))?;
    let topic = topic.trim_end_matches('/');
    if brokers.is_empty() || topic.is_empty() {
        return Err(PipelineError::config(
            "kafka:// topic URL needs brokers and a topic",
        ));
    }

    let group_id = query
        .into_iter()
        .flat_map(|q| url::form_urlencoded::parse(q.as_bytes()))
        .find(|(key, _)| key == "group")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| DEFAULT_GROUP_ID.to_string());

    Ok(TopicUrl::Kafka {
        brokers: brokers.to_string(),
        topic: topic.to_string(),
        group_id,
    })
}

/// `https://sqs.<region>.amazonaws.com/<account>/<queue>` to the `awssqs://` form.
fn rewrite_sqs(url: &Url) -> Result<String, PipelineError> {
    let host = url.host_str().unwrap_or_default();
    let region = host
        .strip_prefix("sqs.")
        .and_then(|h| h.strip_suffix(".amazonaws.com"))
        .filter(|r| !r.is_empty() && !r.contains('.'))
        .ok_or_else(|| {
            PipelineError::config(format!("https topic URL is not an SQS queue: {}", host))
        })?;
    Ok(format!("awssqs://{}{}?region={}", host, url.path(), region))
}

impl fmt::Display for TopicUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicUrl::AwsSqs(raw) | TopicUrl::Amqp(raw) => write!(f, "{}", redact_url(raw)),
            TopicUrl::Kafka { brokers, topic, .. } => write!(f, "kafka://{}/{}", brokers, topic),
            TopicUrl::Memory { topic } => write!(f, "mem://{}", topic),
        }
    }
}

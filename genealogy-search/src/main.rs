//! Genealogy Search Main Entry Point
//!
//! Runs the publisher worker: consumes `publisher` messages and indexes or unindexes
//! posts. With `LAMBDA_TASK_ROOT` set it instead handles one queue event read from stdin.

use std::env;

use dotenv::dotenv;
use genealogy_search::{Dependencies, PipelineError, Settings};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// A queue event delivered to the batch handler.
#[derive(Debug, Deserialize)]
struct QueueEvent {
    #[serde(rename = "Records", default)]
    records: Vec<QueueRecord>,
}

#[derive(Debug, Deserialize)]
struct QueueRecord {
    body: String,
}

/// Default filter directive for `MIN_LOG_LEVEL`.
fn default_directive() -> String {
    let level = match env::var("MIN_LOG_LEVEL")
        .unwrap_or_default()
        .to_uppercase()
        .as_str()
    {
        "DEBUG" => "debug",
        "ERROR" => "error",
        _ => "info",
    };
    format!(
        "genealogy_search={level},genealogy_search_repository={level}",
        level = level
    )
}

/// Initialize tracing/logging.
fn init_tracing(batch_mode: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive()));
    let json = batch_mode || env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "genealogy-search",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "genealogy-search",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

/// Handle one queue event from stdin, failing with the last message error.
async fn run_batch(deps: &Dependencies) -> Result<(), PipelineError> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|e| PipelineError::transport(format!("Failed to read stdin: {}", e)))?;
    let event: QueueEvent = serde_json::from_str(&input)
        .map_err(|e| PipelineError::parse(format!("Invalid queue event: {}", e)))?;

    info!(messages = event.records.len(), "Processing queue event");
    let bodies: Vec<Vec<u8>> = event
        .records
        .into_iter()
        .map(|r| r.body.into_bytes())
        .collect();
    deps.worker.process_batch(&bodies).await
}

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing(env::var_os("LAMBDA_TASK_ROOT").is_some());

    info!("Starting genealogy search publisher");

    let settings = Settings::from_env().inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;
    let batch_mode = settings.batch_mode;

    let deps = match Dependencies::new(settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let result = if batch_mode {
        run_batch(&deps).await
    } else {
        match deps.subscribe().await {
            Ok(mut subscription) => deps.worker.run(subscription.as_mut()).await,
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => {
            info!("Publisher completed successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Publisher failed");
            Err(e)
        }
    }
}

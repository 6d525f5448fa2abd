//! PostgreSQL implementations of the content store, the gazetteer and the name-variant
//! tables.
//!
//! Entities are stored as a JSONB `body` next to their tenant and timestamp columns; the
//! bodies are modelled as typed structs and decoded with `sqlx::types::Json`.

mod content_store;
mod gazetteer;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use genealogy_search_shared::DomainError;

use crate::config::PostgresConfig;
use crate::utils::redact_url;

/// A PostgreSQL-backed store shared by all persistence collaborators.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and, if configured, run the embedded migrations.
    ///
    /// # Arguments
    ///
    /// * `config` - Connection settings
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresStore)` - A connected store
    /// * `Err(DomainError)` - If the connection or a migration fails
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| DomainError::other(format!("database connection failed: {}", e)))?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| DomainError::other(format!("database migration failed: {}", e)))?;
        }

        info!(
            database = %redact_url(&config.database_url),
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_db_id(id: u32) -> i32 {
    id as i32
}

fn from_db_id(id: i32) -> u32 {
    id as u32
}

fn to_db_ids(ids: &[u32]) -> Vec<i32> {
    ids.iter().copied().map(to_db_id).collect()
}

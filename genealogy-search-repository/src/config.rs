//! Configuration types for the PostgreSQL collaborators.

/// Connection settings for the PostgreSQL store.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Connection URL. Never log it directly; use `redact_url`.
    pub database_url: String,
    /// Maximum pool size. Defaults to 20.
    pub max_connections: u32,
    /// Run embedded migrations on connect.
    pub run_migrations: bool,
}

impl PostgresConfig {
    /// Create a config with default pool settings.
    ///
    /// # Arguments
    ///
    /// * `database_url` - The PostgreSQL connection URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 20,
            run_migrations: true,
        }
    }

    /// Override the pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

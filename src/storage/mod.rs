//! Storage layer
//!
//! A single [`SeaOrmStorage`] wraps the shared connection pool and exposes
//! typed repositories for links, clicks, installs and webhooks. All writes
//! are single-statement inserts or updates; there are no user-visible
//! transactions.

mod clicks;
mod connection;
mod converters;
mod installs;
mod links;
mod models;
mod webhooks;

pub use clicks::{CANDIDATE_SCAN_LIMIT, MAX_ATTRIBUTION_WINDOW_HOURS};
pub use connection::{connect_pool, connect_sqlite, run_migrations};
pub use installs::NewInstall;
pub use models::*;

use sea_orm::DatabaseConnection;

use crate::config::DatabaseConfig;
use crate::errors::Result;

/// Shared storage backend over the sea-orm connection pool.
#[derive(Clone)]
pub struct SeaOrmStorage {
    pub(crate) db: DatabaseConnection,
}

impl SeaOrmStorage {
    /// Connect the pool, run migrations and wrap the connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = connect_pool(config).await?;
        run_migrations(&db).await?;
        Ok(Self::from_connection(db))
    }

    /// Wrap an existing connection (tests use this with SQLite).
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| crate::errors::LinkFortyError::database_connection(e.to_string()))
    }
}

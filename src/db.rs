// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::{anyhow, Result};
use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::StoreError;

pub type DbPool = Pool<AsyncPgConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database manager owning the connection pool
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database manager with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);

        let pool = DbPool::builder(manager)
            .max_size(config.max_connections)
            .build()?;

        let db = Self { pool };

        // Test connection and run migrations
        db.initialize(&config.url).await?;

        Ok(db)
    }

    async fn initialize(&self, url: &str) -> Result<()> {
        let _conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        info!("Successfully connected to the database");

        run_migrations(url.to_string()).await?;

        Ok(())
    }

    /// Get the database connection pool reference
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Applies pending embedded migrations on a blocking task.
async fn run_migrations(url: String) -> Result<()> {
    let applied = tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&url)?;
        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(versions.len())
    })
    .await
    .map_err(|e| anyhow!("migration task failed: {e}"))??;

    info!("Database migrations applied successfully ({} new)", applied);
    Ok(())
}

/// Initialize database connection pool and run migrations
pub async fn init_database(config: &DatabaseConfig) -> Result<Database> {
    Database::new(config).await
}

//! Database Module
//!
//! PostgreSQL connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::DatabaseSettings;

/// Create a PostgreSQL connection pool
#[instrument(skip(settings), fields(max_connections = settings.max_connections))]
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await?;
    info!("Database connection pool created");
    Ok(pool)
}

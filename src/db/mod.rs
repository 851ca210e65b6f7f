//! PostgreSQL pool setup for the credential store

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Attempts made before startup gives up on the database
const CONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    NotConfigured,

    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Database unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),
}

/// Open the pool and bring the schema up to date.
///
/// Retries the initial connection with a linear backoff, so the server can
/// start alongside a database that is still booting.
pub async fn connect(config: &Config) -> Result<PgPool, DbError> {
    let url = config.database_url.as_deref().ok_or(DbError::NotConfigured)?;
    let options = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.store_timeout)
        .idle_timeout(Duration::from_secs(600));

    let mut attempt = 1;
    let pool = loop {
        match options.clone().connect(url).await {
            Ok(pool) => break pool,
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    "Database not reachable at {}, retrying",
                    config.database_url_masked()
                );
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => return Err(DbError::Connect(e)),
        }
    };
    tracing::info!(
        max_connections = config.db_max_connections,
        "Connected to {}",
        config.database_url_masked()
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Schema migrations applied");

    Ok(pool)
}

/// Round-trip a trivial query
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::Unreachable)
}

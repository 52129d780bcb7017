//! Database pool configuration and migrations

pub mod seed;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use tracing::info;

use crate::config::DatabaseConfig;

pub use seed::seed_defaults;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the SQLite pool, creating the file on first run.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid DATABASE_URL {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        // SQLite is single-writer, but can have multiple readers
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    info!("Database connected (WAL, foreign keys on)");
    Ok(pool)
}

/// Applies pending migrations. Uses the `_sqlx_migrations` table to track state.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    let pending = MIGRATOR
        .migrations
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .count();
    info!("Checking {} migrations...", pending);

    MIGRATOR.run(pool).await.context("Migration failed")?;

    info!("Migrations complete");
    Ok(())
}

/// Number of applied migrations
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let result: Option<(i64,)> =
        sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_optional(pool)
            .await?;

    Ok(result.map(|(c,)| c).unwrap_or(0))
}

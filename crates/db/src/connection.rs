use std::str::FromStr;
use std::time::Duration;

use outfitter_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens a pool, creating the database file on first use.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { max_connections.max(1) })
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::connect_with_settings;

    #[tokio::test]
    async fn in_memory_pool_enforces_foreign_keys() {
        let pool = connect_with_settings("sqlite::memory:", 8, 30).await.expect("connect");
        let enabled: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(enabled, 1);
    }
}

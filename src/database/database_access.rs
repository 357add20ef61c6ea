use std::time::Duration;

use sea_orm::{DatabaseConnection, SqlxSqliteConnector};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) the score database and ensures the schema exists.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, Error> {
    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    info!(
        path = %config.path.display(),
        max_connections = config.max_connections,
        "Opening score database"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| format!("Could not connect to database: {e}"))?;

    create_schema(&pool).await?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            CREATE TABLE IF NOT EXISTS high_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                initials VARCHAR(3) NOT NULL,
                score INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
            CREATE INDEX IF NOT EXISTS idx_high_scores_score
            ON high_scores (score DESC, id ASC)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

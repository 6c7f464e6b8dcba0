use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// Open (creating if missing) the SQLite database backing the dedup store.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Ensure the jobs table exists. Safe to call on every run.
pub async fn initialize(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS jobs (
             job_id TEXT PRIMARY KEY NOT NULL,
             source TEXT NOT NULL,
             company TEXT NOT NULL,
             title TEXT NOT NULL,
             link TEXT NOT NULL,
             search_term TEXT NOT NULL,
             posted_ts INTEGER NOT NULL,
             first_seen_at TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS jobs_first_seen_idx ON jobs (first_seen_at)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
    let pool = create_pool(&url).await.expect("pool");
    initialize(&pool).await.expect("initialize");
    (dir, pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (_dir, pool) = test_pool().await;
        initialize(&pool).await.expect("second initialize");
        initialize(&pool).await.expect("third initialize");

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn table_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("jobs.db").display());

        let pool = create_pool(&url).await.expect("pool");
        initialize(&pool).await.expect("initialize");
        sqlx::query(
            "INSERT INTO jobs VALUES ('ms_1', 'microsoft', 'Microsoft', 'Data Engineer', 'https://x/1', 'Data', 1, '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert");
        pool.close().await;

        let reopened = create_pool(&url).await.expect("reopen");
        initialize(&reopened).await.expect("initialize again");
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&reopened)
            .await
            .expect("count");
        assert_eq!(row.0, 1);
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::{migrations, KvStore, StoreResult};

/// SQLite-backed store.
///
/// Counters, field maps and scored sets live in three tables. Each trait call
/// is a single statement or a single transaction, so counter increments and
/// pops are atomic across connections.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or migrations fail.
    pub async fn new(path: &Path) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Concurrent submissions all write the same counter rows.
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        migrations::run(&pool).await?;
        info!(path = %path.display(), "Store migrations complete");

        Ok(Self { pool })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r"
            INSERT INTO kv_counters (key, value) VALUES (?, 1)
            ON CONFLICT(key) DO UPDATE SET value = value + 1
            RETURNING value
            ",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM kv_counters WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn hreplace(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kv_hashes WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        for (field, value) in fields {
            sqlx::query(
                r"
                INSERT INTO kv_hashes (key, field, value) VALUES (?, ?, ?)
                ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
                ",
            )
            .bind(key)
            .bind(*field)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO kv_hashes (key, field, value) VALUES (?, ?, ?)
            ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
            ",
        )
        .bind(key)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT field, value FROM kv_hashes WHERE key = ?")
                .bind(key)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn hexists(&self, key: &str) -> StoreResult<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM kv_hashes WHERE key = ?)")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        loop {
            // Only canonical integer text is updated in place; anything else
            // leaves the row alone and returns no value.
            let updated: Option<String> = sqlx::query_scalar(
                r"
                INSERT INTO kv_hashes (key, field, value) VALUES (?, ?, CAST(? AS TEXT))
                ON CONFLICT(key, field) DO UPDATE
                    SET value = CAST(CAST(value AS INTEGER) + ? AS TEXT)
                    WHERE CAST(CAST(value AS INTEGER) AS TEXT) = value
                RETURNING value
                ",
            )
            .bind(key)
            .bind(field)
            .bind(delta)
            .bind(delta)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(value) = updated {
                return super::parse_int(key, &value);
            }

            let current: Option<String> =
                sqlx::query_scalar("SELECT value FROM kv_hashes WHERE key = ? AND field = ?")
                    .bind(key)
                    .bind(field)
                    .fetch_optional(&self.pool)
                    .await?;
            let Some(current) = current else {
                continue;
            };
            // Rejects non-integers; integers written as " 7" or "+7" fall through.
            let next = super::parse_int(key, &current)? + delta;
            let swapped = sqlx::query(
                "UPDATE kv_hashes SET value = ? WHERE key = ? AND field = ? AND value = ?",
            )
            .bind(next.to_string())
            .bind(key)
            .bind(field)
            .bind(&current)
            .execute(&self.pool)
            .await?
            .rows_affected();
            if swapped == 1 {
                return Ok(next);
            }
        }
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO kv_zsets (key, member, score) VALUES (?, ?, ?)
            ON CONFLICT(key, member) DO UPDATE SET score = excluded.score
            ",
        )
        .bind(key)
        .bind(member)
        .bind(score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_zsets WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn zrange(&self, key: &str, start: u64, count: u64) -> StoreResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT member, score FROM kv_zsets
            WHERE key = ?
            ORDER BY score ASC, member ASC
            LIMIT ? OFFSET ?
            ",
        )
        .bind(key)
        .bind(count as i64)
        .bind(start as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn zrevrange(
        &self,
        key: &str,
        start: u64,
        count: u64,
    ) -> StoreResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT member, score FROM kv_zsets
            WHERE key = ?
            ORDER BY score DESC, member DESC
            LIMIT ? OFFSET ?
            ",
        )
        .bind(key)
        .bind(count as i64)
        .bind(start as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn zpopmin(&self, key: &str, count: u64) -> StoreResult<Vec<(String, i64)>> {
        let mut rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            DELETE FROM kv_zsets
            WHERE key = ? AND member IN (
                SELECT member FROM kv_zsets
                WHERE key = ?
                ORDER BY score ASC, member ASC
                LIMIT ?
            )
            RETURNING member, score
            ",
        )
        .bind(key)
        .bind(key)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;
        // RETURNING order is unspecified.
        rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(rows)
    }
}

use sqlx::SqlitePool;

use crate::error::AppResult;

/// Auto-increment emulation for the document store. Every operation is a
/// single statement, so concurrent callers never observe the same value.
#[derive(Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Increments and returns the counter, creating it on first use (first value is 1)
    pub async fn next_id(&self, name: &str) -> AppResult<i64> {
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO counters (_id, seq) VALUES (?, 1)
            ON CONFLICT(_id) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(seq)
    }

    /// Raises the counter to at least `floor`; never lowers it
    pub async fn advance_to(&self, name: &str, floor: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO counters (_id, seq) VALUES (?, ?)
            ON CONFLICT(_id) DO UPDATE SET seq = MAX(seq, excluded.seq)
            "#,
        )
        .bind(name)
        .bind(floor)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn current(&self, name: &str) -> AppResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT seq FROM counters WHERE _id = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(seq,)| seq))
    }

    /// Drops every counter
    pub async fn reset_all(&self) -> AppResult<()> {
        sqlx::query("DELETE FROM counters").execute(&self.pool).await?;
        Ok(())
    }
}

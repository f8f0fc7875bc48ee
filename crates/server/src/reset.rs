use crate::{document::DocumentStore, error::AppResult, relational::RelationalStore};

/// Child tables first so no foreign key is ever left dangling mid-reset
const RELATIONAL_DELETE_ORDER: [&str; 9] = [
    "WatchHistory",
    "Friendships",
    "Device",
    "Film",
    "Series",
    "Sessions",
    "Media",
    "Users",
    "Family",
];

/// Returns either store to its empty post-schema state
pub struct ResetCoordinator;

impl ResetCoordinator {
    /// Deletes every row and restarts every id at 1, in one transaction
    pub async fn reset_relational(store: &RelationalStore) -> AppResult<()> {
        let mut tx = store.pool().begin().await?;
        for table in RELATIONAL_DELETE_ORDER {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM sqlite_sequence")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Relational store reset");
        Ok(())
    }

    /// Drops every collection and counter, then recreates the empty
    /// collections with their indexes
    pub async fn reset_documents(store: &DocumentStore) -> AppResult<()> {
        store.drop_all().await?;
        store.init().await?;

        tracing::info!("Document store reset");
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use shared::{
    MediaDocument, SessionDocument, SessionMediaSnapshot, SessionUserSnapshot, UserDocument,
    WatchHistoryDocument, WatchMediaSnapshot, WatchUserSnapshot,
};

use super::{Collection, DocumentStore};
use crate::{
    error::{AppError, AppResult},
    relational::{rental_cost, validate_rental_hours},
};

/// Write paths of the document model. Each write copies the current user and
/// media display fields into the new document; later edits to the user or
/// media never reach those copies.
pub struct DocumentRentals<'a> {
    store: &'a DocumentStore,
}

impl<'a> DocumentRentals<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    async fn load_user(&self, user_id: i64) -> AppResult<UserDocument> {
        self.store
            .find_by_id(Collection::Users, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))
    }

    async fn load_media(&self, media_id: i64) -> AppResult<MediaDocument> {
        self.store
            .find_by_id(Collection::Media, media_id)
            .await?
            .ok_or_else(|| AppError::not_found("media", media_id))
    }

    pub async fn rent_media(
        &self,
        user_id: i64,
        media_id: i64,
        duration_hours: i64,
        at: DateTime<Utc>,
    ) -> AppResult<SessionDocument> {
        validate_rental_hours(duration_hours)?;
        let user = self.load_user(user_id).await?;
        let media = self.load_media(media_id).await?;
        let cost = rental_cost(media.cost_per_day, duration_hours)?;

        let session_id = self
            .store
            .sequences()
            .next_id(Collection::Sessions.id_field())
            .await?;
        let session = SessionDocument {
            session_id,
            user: SessionUserSnapshot::from(&user),
            media: SessionMediaSnapshot::from(&media),
            date_of_rent: at,
            cost,
            duration: duration_hours,
        };
        self.store.insert_one(Collection::Sessions, &session).await?;

        tracing::info!(
            "User {} rented media {} for {}h (session document {})",
            user_id,
            media_id,
            duration_hours,
            session_id
        );
        Ok(session)
    }

    pub async fn watch_media(
        &self,
        user_id: i64,
        media_id: i64,
        family_watch: bool,
        at: DateTime<Utc>,
    ) -> AppResult<WatchHistoryDocument> {
        let user = self.load_user(user_id).await?;
        let media = self.load_media(media_id).await?;

        let watch_history_id = self
            .store
            .sequences()
            .next_id(Collection::WatchHistory.id_field())
            .await?;
        let entry = WatchHistoryDocument {
            watch_history_id,
            user: WatchUserSnapshot::from(&user),
            media: WatchMediaSnapshot::from(&media),
            date_of_watch: at,
            family_watch,
        };
        self.store.insert_one(Collection::WatchHistory, &entry).await?;
        Ok(entry)
    }
}

use shared::{
    MediaDocument, MediaListing, RentalHistoryEntry, SessionDocument, UserDocument, UserListing,
};

use super::{Collection, DocumentStore, Filter};
use crate::error::AppResult;

/// Listing reads of the document model
pub struct DocumentCatalog<'a> {
    store: &'a DocumentStore,
}

impl<'a> DocumentCatalog<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    pub async fn list_users(&self) -> AppResult<Vec<UserListing>> {
        let users: Vec<UserDocument> = self.store.find(Collection::Users, &[]).await?;
        let mut listing: Vec<UserListing> = users.iter().map(UserListing::from).collect();
        listing.sort_by(|a, b| (&a.user_name, a.user_id).cmp(&(&b.user_name, b.user_id)));
        Ok(listing)
    }

    pub async fn list_media(&self) -> AppResult<Vec<MediaListing>> {
        let media: Vec<MediaDocument> = self.store.find(Collection::Media, &[]).await?;
        let mut listing: Vec<MediaListing> = media.iter().map(MediaListing::from).collect();
        listing.sort_by(|a, b| (&a.media_name, a.media_id).cmp(&(&b.media_name, b.media_id)));
        Ok(listing)
    }

    /// Sessions of one user through the indexed `user.user_id`, newest first.
    /// Media names come from the snapshots frozen at rent time.
    pub async fn user_rentals(&self, user_id: i64) -> AppResult<Vec<RentalHistoryEntry>> {
        let sessions: Vec<SessionDocument> = self
            .store
            .find(Collection::Sessions, &[Filter::eq("user.user_id", user_id)])
            .await?;
        let mut rentals: Vec<RentalHistoryEntry> =
            sessions.iter().map(RentalHistoryEntry::from).collect();
        rentals.sort_by(|a, b| {
            (b.date_of_rent, b.session_id).cmp(&(a.date_of_rent, a.session_id))
        });
        Ok(rentals)
    }
}

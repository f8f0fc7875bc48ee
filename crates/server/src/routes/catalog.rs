//! Listings read from whichever store is live

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{LiveStore, Listing, MediaListing, RentalHistoryEntry, UserListing};

use crate::{document::DocumentCatalog, error::AppError, state::AppState};

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Listing<UserListing>>, AppError> {
    let live = state.live.read().await;
    let store = *live;
    let items = match store {
        LiveStore::Relational => state.relational.list_users().await?,
        LiveStore::Document => DocumentCatalog::new(&state.documents).list_users().await?,
    };
    Ok(Json(Listing { store, items }))
}

/// GET /api/media
pub async fn list_media(
    State(state): State<AppState>,
) -> Result<Json<Listing<MediaListing>>, AppError> {
    let live = state.live.read().await;
    let store = *live;
    let items = match store {
        LiveStore::Relational => state.relational.list_media().await?,
        LiveStore::Document => DocumentCatalog::new(&state.documents).list_media().await?,
    };
    Ok(Json(Listing { store, items }))
}

/// GET /api/users/:user_id/rentals
pub async fn user_rentals(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Listing<RentalHistoryEntry>>, AppError> {
    let live = state.live.read().await;
    let store = *live;
    let items = match store {
        LiveStore::Relational => state.relational.user_rentals(user_id).await?,
        LiveStore::Document => {
            DocumentCatalog::new(&state.documents)
                .user_rentals(user_id)
                .await?
        }
    };
    Ok(Json(Listing { store, items }))
}

//! Rental writes, routed to whichever store is live

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use shared::{LiveStore, RentRequest, RentalReceipt, WatchReceipt, WatchRequest};

use crate::{
    document::DocumentRentals, error::AppError, relational::NewWatchHistory, state::AppState,
};

/// POST /api/rentals
pub async fn rent(
    State(state): State<AppState>,
    Json(req): Json<RentRequest>,
) -> Result<(StatusCode, Json<RentalReceipt>), AppError> {
    let live = state.live.read().await;
    let now = Utc::now();

    let receipt = match *live {
        LiveStore::Relational => {
            let session = state
                .relational
                .rent_media(req.user_id, req.media_id, req.duration_hours, now)
                .await?;
            RentalReceipt {
                store: LiveStore::Relational,
                session_id: session.session_id,
                user_id: session.user_id,
                media_id: session.media_id,
                date_of_rent: session.date_of_rent,
                duration_hours: session.duration,
                cost: session.cost,
            }
        }
        LiveStore::Document => {
            let session = DocumentRentals::new(&state.documents)
                .rent_media(req.user_id, req.media_id, req.duration_hours, now)
                .await?;
            RentalReceipt {
                store: LiveStore::Document,
                session_id: session.session_id,
                user_id: session.user.user_id,
                media_id: session.media.media_id,
                date_of_rent: session.date_of_rent,
                duration_hours: session.duration,
                cost: session.cost,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /api/watch
pub async fn watch(
    State(state): State<AppState>,
    Json(req): Json<WatchRequest>,
) -> Result<(StatusCode, Json<WatchReceipt>), AppError> {
    let live = state.live.read().await;
    let now = Utc::now();

    let receipt = match *live {
        LiveStore::Relational => {
            let entry = state
                .relational
                .insert_watch_history(&NewWatchHistory {
                    user_id: req.user_id,
                    media_id: req.media_id,
                    date_of_watch: now,
                    family_watch: req.family_watch,
                })
                .await?;
            WatchReceipt {
                store: LiveStore::Relational,
                watch_history_id: entry.watch_history_id,
                user_id: entry.user_id,
                media_id: entry.media_id,
                date_of_watch: entry.date_of_watch,
                family_watch: entry.family_watch,
            }
        }
        LiveStore::Document => {
            let entry = DocumentRentals::new(&state.documents)
                .watch_media(req.user_id, req.media_id, req.family_watch, now)
                .await?;
            WatchReceipt {
                store: LiveStore::Document,
                watch_history_id: entry.watch_history_id,
                user_id: entry.user.user_id,
                media_id: entry.media.media_id,
                date_of_watch: entry.date_of_watch,
                family_watch: entry.family_watch,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(receipt)))
}

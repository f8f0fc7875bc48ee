use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use shared::{FamilyMediaResponse, FamilyOverviewEntry, WindowStrategy};
use std::collections::BTreeMap;

use crate::{error::AppError, rental_window::RentalWindowEvaluator, state::AppState};

#[derive(Debug, Deserialize)]
pub struct StrategyQuery {
    pub strategy: Option<WindowStrategy>,
}

async fn pick_strategy(state: &AppState, query: &StrategyQuery) -> WindowStrategy {
    match query.strategy {
        Some(strategy) => strategy,
        None => state.live_store().await.default_strategy(),
    }
}

/// Media a user can watch through their family's active rentals
/// GET /api/users/:user_id/family-media?strategy=joined|referenced|embedded
pub async fn family_media(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<StrategyQuery>,
) -> Result<Json<FamilyMediaResponse>, AppError> {
    let strategy = pick_strategy(&state, &query).await;
    let available_media = RentalWindowEvaluator::new(&state.relational, &state.documents)
        .shared_media(user_id, strategy, Utc::now())
        .await?;

    Ok(Json(FamilyMediaResponse {
        user_id,
        strategy,
        available_media,
    }))
}

/// GET /api/family-media
pub async fn family_overview(
    State(state): State<AppState>,
    Query(query): Query<StrategyQuery>,
) -> Result<Json<BTreeMap<i64, FamilyOverviewEntry>>, AppError> {
    let strategy = pick_strategy(&state, &query).await;
    let overview = RentalWindowEvaluator::new(&state.relational, &state.documents)
        .family_overview(strategy, Utc::now())
        .await?;
    Ok(Json(overview))
}

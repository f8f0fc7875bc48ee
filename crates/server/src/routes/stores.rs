//! Store lifecycle endpoints: migration, switching and resets

use axum::{extract::State, Json};
use shared::{LiveStore, StatsResponse, SwitchResponse};

use crate::{
    error::AppError, migration::MigrationOrchestrator, reset::ResetCoordinator, state::AppState,
};

async fn stats_for(state: &AppState, live_store: LiveStore) -> Result<StatsResponse, AppError> {
    Ok(StatsResponse {
        live_store,
        relational: state.relational.table_counts().await?,
        documents: state.documents.stats().await?,
    })
}

/// Migrate the relational data into the document store and make it live
/// POST /api/migrate
pub async fn migrate(State(state): State<AppState>) -> Result<Json<SwitchResponse>, AppError> {
    let mut live = state.live.write().await;

    match MigrationOrchestrator::new(&state.relational, &state.documents)
        .run()
        .await
    {
        Ok(summary) => {
            *live = LiveStore::Document;
            tracing::info!("Document store is live");
            Ok(Json(SwitchResponse {
                live_store: *live,
                migrated: Some(summary),
            }))
        }
        Err(e) => {
            // A partial document store must never serve reads
            *live = LiveStore::Relational;
            Err(e)
        }
    }
}

/// Clear the document store and serve from the relational store again
/// POST /api/switch/relational
pub async fn switch_to_relational(
    State(state): State<AppState>,
) -> Result<Json<SwitchResponse>, AppError> {
    let mut live = state.live.write().await;
    ResetCoordinator::reset_documents(&state.documents).await?;
    *live = LiveStore::Relational;
    tracing::info!("Relational store is live");

    Ok(Json(SwitchResponse {
        live_store: *live,
        migrated: None,
    }))
}

/// POST /api/reset/documents
pub async fn reset_documents(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let mut live = state.live.write().await;
    ResetCoordinator::reset_documents(&state.documents).await?;
    *live = LiveStore::Relational;
    Ok(Json(stats_for(&state, *live).await?))
}

/// POST /api/reset/relational
pub async fn reset_relational(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let live = state.live.write().await;
    ResetCoordinator::reset_relational(&state.relational).await?;
    Ok(Json(stats_for(&state, *live).await?))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let live = state.live_store().await;
    Ok(Json(stats_for(&state, live).await?))
}

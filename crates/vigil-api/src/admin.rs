use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};

use vigil_types::api::{ListRecordsResponse, SetLimitRequest};

use crate::state::AppState;

/// Snapshot of every watch-time record. The live view is the admin
/// gateway connection; this endpoint serves the initial read.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let records = tokio::task::spawn_blocking(move || store.list_records())
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("listing watch records failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let users = records.into_iter().map(|r| (r.username.clone(), r)).collect();
    Ok(Json(ListRecordsResponse { users }))
}

/// Overwrite one record's daily limit. No validation beyond the
/// positive-number constraint; 404 when the record has never existed.
pub async fn set_limit(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<SetLimitRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.minutes == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let store = state.store.clone();
    let name = username.clone();
    let updated = tokio::task::spawn_blocking(move || store.set_time_limit(&name, req.minutes))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("setting limit for {} failed: {}", username, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match updated {
        Some(record) => {
            info!("{} limit set to {} minutes", record.username, req.minutes);
            Ok(Json(record))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Zero one record's watch time. `last_active`/`last_reset` are left
/// untouched so an admin reset stays distinguishable from a policy reset.
pub async fn reset_watch_time(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let name = username.clone();
    let updated = tokio::task::spawn_blocking(move || store.reset_watch_time(&name))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("resetting watch time for {} failed: {}", username, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match updated {
        Some(record) => {
            info!("{} watch time reset", record.username);
            Ok(Json(record))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

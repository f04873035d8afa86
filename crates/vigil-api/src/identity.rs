use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};

use vigil_types::api::{ElevateRequest, ElevateResponse, ResolveRequest, ResolveResponse};

use crate::state::AppState;

/// Resolve a display name to a role. An empty name blocks entry to any
/// view, so it is a 400 here.
pub async fn resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let role = state
        .resolver
        .resolve(&req.username)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let username = req.username.trim().to_string();
    info!("{} resolved as {:?}", username, role);

    Ok(Json(ResolveResponse { username, role }))
}

/// Check the shared secret for elevated access. The grant itself is
/// client-local; the server only vouches for the key and advertises the
/// TTL the client should apply.
pub async fn elevate(
    State(state): State<AppState>,
    Json(req): Json<ElevateRequest>,
) -> Json<ElevateResponse> {
    let valid = state.resolver.verify_access_key(&req.key);
    if !valid {
        warn!("elevation rejected: invalid access key");
    }

    Json(ElevateResponse {
        valid,
        expires_in_secs: valid.then_some(state.grant_ttl_secs),
    })
}

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use vigil_engine::IdentityResolver;
use vigil_types::Role;

use crate::state::AppState;

pub const USER_HEADER: &str = "x-vigil-user";
pub const ACCESS_KEY_HEADER: &str = "x-vigil-access-key";

/// Gate for admin control: the request carries the administrator's display
/// name or a valid access key. Everything else is 403 — access is never
/// granted silently.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = req
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok());
    let key = req
        .headers()
        .get(ACCESS_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if is_authorized(&state.resolver, user, key) {
        Ok(next.run(req).await)
    } else {
        warn!("admin request rejected (user header: {:?})", user);
        Err(StatusCode::FORBIDDEN)
    }
}

fn is_authorized(resolver: &IdentityResolver, user: Option<&str>, key: Option<&str>) -> bool {
    let by_name = user.is_some_and(|name| matches!(resolver.resolve(name), Ok(Role::Administrator)));
    by_name || key.is_some_and(|candidate| resolver.verify_access_key(candidate))
}

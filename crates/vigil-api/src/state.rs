use std::sync::Arc;

use vigil_engine::IdentityResolver;
use vigil_store::WatchStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: WatchStore,
    pub resolver: IdentityResolver,
    /// Seconds an elevated-access grant stays valid.
    pub grant_ttl_secs: u64,
    /// Upstream comment API key. Absent means the comments endpoint is
    /// unavailable, nothing else.
    pub comment_api_key: Option<String>,
    pub http: reqwest::Client,
}

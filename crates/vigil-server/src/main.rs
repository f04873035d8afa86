mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vigil_api::middleware::require_admin;
use vigil_api::{AppState, AppStateInner, admin, comments, identity};
use vigil_engine::{EngineConfig, IdentityResolver};
use vigil_gateway::{GatewayContext, connection};
use vigil_store::WatchStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vigil_server=debug,vigil_gateway=debug,vigil_api=debug,vigil_store=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.admin_access_key.is_none() {
        warn!("VIGIL_ADMIN_ACCESS_KEY is not set; elevated access is disabled");
    }

    // Init database and store
    let db = vigil_store::Database::open(&config.db_path)?;
    let store = WatchStore::new(db);

    let resolver = IdentityResolver::new(
        config.admin_username.clone(),
        config.admin_access_key.as_deref(),
    );

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        store: store.clone(),
        resolver: resolver.clone(),
        grant_ttl_secs: config.grant_ttl_secs,
        comment_api_key: config.comment_api_key.clone(),
        http: reqwest::Client::new(),
    });

    let gateway = GatewayContext {
        store,
        resolver,
        engine_config: EngineConfig {
            tick_secs: config.tick_secs,
            reset_hour_utc: config.reset_hour_utc,
        },
        grant_ttl_secs: config.grant_ttl_secs,
    };

    // Routes
    let public_routes = Router::new()
        .route("/identity/resolve", post(identity::resolve))
        .route("/identity/elevate", post(identity::elevate))
        .route("/videos/{video_id}/comments", get(comments::get_comments))
        .route("/health", get(health))
        .with_state(app_state.clone());

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{username}/limit", put(admin::set_limit))
        .route("/admin/users/{username}/reset", post(admin::reset_watch_time))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_admin))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway);

    let app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Vigil server listening on {}", addr);
    info!(
        "Accrual tick: {}s, reset boundary: {:02}:00 UTC",
        config.tick_secs, config.reset_hour_utc
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn ws_upgrade(
    State(ctx): State<GatewayContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, ctx))
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

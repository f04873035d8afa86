use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_engine::accrual::Observation;
use vigil_engine::{AccrualEngine, ElevatedGrant, EngineConfig, IdentityResolver, video};
use vigil_store::{StoreEvent, WatchStore};
use vigil_types::events::{GatewayCommand, GatewayEvent, View};
use vigil_types::{Role, UserRecord};

/// How long a client gets to identify before the connection is dropped.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a connection needs, shared across all connections.
#[derive(Clone)]
pub struct GatewayContext {
    pub store: WatchStore,
    pub resolver: IdentityResolver,
    pub engine_config: EngineConfig,
    pub grant_ttl_secs: u64,
}

/// Where a connection goes after the Identify handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Standard viewer: record subscription, accrual, access decision.
    TrackedViewer,
    /// Administrators are exempt from accrual and blocking; no record
    /// subscription is established and no engine runs.
    UntrackedViewer,
    /// Straight to the live all-records view, no deadline.
    Admin,
    /// Admin view with a standard name: a valid access key comes first.
    ElevationRequired,
}

pub fn route_for(role: Role, view: View) -> Route {
    match (view, role) {
        (View::Viewer, Role::Standard) => Route::TrackedViewer,
        (View::Viewer, Role::Administrator) => Route::UntrackedViewer,
        (View::Admin, Role::Administrator) => Route::Admin,
        (View::Admin, Role::Standard) => Route::ElevationRequired,
    }
}

/// Handle a single WebSocket connection: Identify handshake, role
/// resolution, then the loop for whichever surface the client asked for.
pub async fn handle_connection(socket: WebSocket, ctx: GatewayContext) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    let (raw_username, view) = match wait_for_identify(&mut receiver).await {
        Some(identify) => identify,
        None => {
            warn!("connection {} failed to identify, closing", conn_id);
            return;
        }
    };

    let role = match ctx.resolver.resolve(&raw_username) {
        Ok(role) => role,
        Err(e) => {
            let _ = send_event(&mut sender, &GatewayEvent::Error { message: e.to_string() }).await;
            return;
        }
    };
    let username = raw_username.trim().to_string();

    info!(
        "{} connected to gateway as {:?} ({:?} view, conn {})",
        username, role, view, conn_id
    );

    let ready = GatewayEvent::Ready {
        username: username.clone(),
        role,
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    match route_for(role, view) {
        Route::TrackedViewer => tracked_viewer_loop(sender, receiver, &ctx, &username).await,
        Route::UntrackedViewer => untracked_viewer_loop(sender, receiver, &username).await,
        Route::Admin => admin_loop(sender, receiver, &ctx, &username, None).await,
        Route::ElevationRequired => elevation_gate(sender, receiver, &ctx, &username).await,
    }

    info!("{} disconnected from gateway (conn {})", username, conn_id);
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>) -> Option<(String, View)> {
    let identify = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { username, view }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return Some((username, view));
                }
            }
        }
        None
    });

    identify.await.ok().flatten()
}

/// The viewer loop for a standard user: one client context in the
/// accounting sense. Record corrections and accrual ticks both run on
/// this task, so a stale correction can never silently drop an accrual
/// issued here.
async fn tracked_viewer_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    ctx: &GatewayContext,
    username: &str,
) {
    // Subscribe before the initial read so no write can land unseen
    // between snapshot and stream.
    let mut updates = ctx.store.subscribe();

    let record = match ctx.store.load_or_init(username, Utc::now().timestamp_millis()) {
        Ok(record) => record,
        Err(e) => {
            warn!("loading record for {} failed: {}", username, e);
            let message = "could not load your watch record".to_string();
            let _ = send_event(&mut sender, &GatewayEvent::Error { message }).await;
            return;
        }
    };

    let mut engine = AccrualEngine::new(record.clone(), ctx.engine_config);
    let mut was_blocked = false;

    // The loaded record may itself predate the reset boundary.
    if apply_update(&mut engine, record, ctx, &mut sender, &mut was_blocked)
        .await
        .is_err()
    {
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(ctx.engine_config.tick_secs));

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    _ => break,
                };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(GatewayCommand::OpenVideo { url }) => {
                            if handle_open_video(&mut engine, &url, ctx, &mut interval, &mut sender)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(GatewayCommand::Identify { .. }) => {} // already identified
                        Ok(GatewayCommand::Elevate { .. }) => {
                            let message = "elevation is only available in the admin view".to_string();
                            if send_event(&mut sender, &GatewayEvent::Error { message }).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("{} bad command: {} -- raw: {}", username, e, &text[..text.len().min(200)]);
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            _ = interval.tick() => {
                if let Some(next) = engine.tick(Utc::now()) {
                    if let Err(e) = ctx.store.put_record(&next) {
                        // The next tick implicitly retries; no queue.
                        warn!("accrual write failed for {}: {}", username, e);
                    }
                }
            }

            event = updates.recv() => {
                match event {
                    Ok(StoreEvent::RecordChanged(record)) => {
                        if record.username != username {
                            continue;
                        }
                        if apply_update(&mut engine, record, ctx, &mut sender, &mut was_blocked)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("store subscription lagged by {} events, resyncing {}", n, username);
                        match ctx.store.get_record(username) {
                            Ok(Some(record)) => {
                                if apply_update(&mut engine, record, ctx, &mut sender, &mut was_blocked)
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Ok(None) => {} // records are never deleted in normal operation
                            Err(e) => warn!("resync read for {} failed: {}", username, e),
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

/// A submitted URL either resolves to a video or is rejected before any
/// state change. The first accepted URL arms accrual, with the first tick
/// issued immediately.
async fn handle_open_video(
    engine: &mut AccrualEngine,
    url: &str,
    ctx: &GatewayContext,
    interval: &mut tokio::time::Interval,
    sender: &mut SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    if engine.blocked() {
        let message = "the daily watch limit has been reached".to_string();
        return send_event(sender, &GatewayEvent::Error { message }).await;
    }

    let Some(video_id) = video::extract_video_id(url) else {
        let message = "not a recognized video url".to_string();
        return send_event(sender, &GatewayEvent::Error { message }).await;
    };

    let opened = GatewayEvent::VideoOpened {
        embed_url: video::no_cookie_embed_url(&video_id),
        video_id,
    };
    send_event(sender, &opened).await?;

    if engine.start_watching() {
        debug!("{} started watching", engine.record().username);
        if let Some(next) = engine.tick(Utc::now()) {
            if let Err(e) = ctx.store.put_record(&next) {
                warn!("accrual write failed for {}: {}", engine.record().username, e);
            }
        }
        // The periodic schedule starts counting from the immediate tick.
        interval.reset();
    }

    Ok(())
}

/// Feed one observed record through the engine's reset check, then push
/// the accepted view (and any blocked transition) to the client. A stale
/// record triggers a correction write instead; the view catches up when
/// the confirmed write echoes back through the subscription.
async fn apply_update(
    engine: &mut AccrualEngine,
    record: UserRecord,
    ctx: &GatewayContext,
    sender: &mut SplitSink<WebSocket, Message>,
    was_blocked: &mut bool,
) -> Result<(), axum::Error> {
    match engine.observe(record, Utc::now()) {
        Observation::Stale(correction) => {
            debug!("correcting stale record for {}", correction.username);
            if let Err(e) = ctx.store.put_record(&correction) {
                warn!("reset correction write failed for {}: {}", correction.username, e);
            }
        }
        Observation::Current => {
            let update = GatewayEvent::RecordUpdate {
                record: engine.record().clone(),
            };
            send_event(sender, &update).await?;

            let blocked = engine.blocked();
            if blocked && !*was_blocked {
                info!("{} reached the daily limit", engine.record().username);
                send_event(sender, &GatewayEvent::LimitReached {}).await?;
            }
            *was_blocked = blocked;
        }
    }
    Ok(())
}

/// Viewer loop for administrators: no subscription, no engine, never
/// blocked.
async fn untracked_viewer_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    username: &str,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                Ok(GatewayCommand::OpenVideo { url }) => {
                    let event = match video::extract_video_id(&url) {
                        Some(video_id) => GatewayEvent::VideoOpened {
                            embed_url: video::no_cookie_embed_url(&video_id),
                            video_id,
                        },
                        None => GatewayEvent::Error {
                            message: "not a recognized video url".to_string(),
                        },
                    };
                    if send_event(&mut sender, &event).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("{} bad command: {} -- raw: {}", username, e, &text[..text.len().min(200)]);
                }
            },
            Message::Close(_) => return,
            _ => {}
        }
    }
}

/// A standard name in the admin view: wait for a valid access key. An
/// invalid key is a denial and the connection closes — access is never
/// granted silently.
async fn elevation_gate(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    ctx: &GatewayContext,
    username: &str,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                Ok(GatewayCommand::Elevate { key }) => {
                    if !ctx.resolver.verify_access_key(&key) {
                        warn!("{} failed elevation", username);
                        let denied = GatewayEvent::AccessDenied {
                            message: "invalid access key".to_string(),
                        };
                        let _ = send_event(&mut sender, &denied).await;
                        return;
                    }

                    let grant = ElevatedGrant::new(Utc::now(), ctx.grant_ttl_secs);
                    info!("{} elevated for {} seconds", username, ctx.grant_ttl_secs);
                    let elevated = GatewayEvent::Elevated {
                        expires_in_secs: ctx.grant_ttl_secs,
                    };
                    if send_event(&mut sender, &elevated).await.is_err() {
                        return;
                    }
                    admin_loop(sender, receiver, ctx, username, Some(grant)).await;
                    return;
                }
                Ok(_) => {
                    let denied = GatewayEvent::AccessDenied {
                        message: "an access key is required for the admin view".to_string(),
                    };
                    if send_event(&mut sender, &denied).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("{} bad command: {} -- raw: {}", username, e, &text[..text.len().min(200)]);
                }
            },
            Message::Close(_) => return,
            _ => {}
        }
    }
}

/// The live all-records view. With a grant, a deadline timer forces
/// `ElevationExpired` and closes the connection; the user re-authenticates.
/// The timer dies with this task on teardown.
async fn admin_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    ctx: &GatewayContext,
    username: &str,
    grant: Option<ElevatedGrant>,
) {
    let mut updates = ctx.store.subscribe();

    if send_all_records(&ctx.store, &mut sender).await.is_err() {
        return;
    }

    let expires_in = grant.map(|g| g.remaining_secs(Utc::now()));
    let deadline = async move {
        match expires_in {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("elevated grant expired for {}", username);
                let _ = send_event(&mut sender, &GatewayEvent::ElevationExpired {}).await;
                return;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    _ => {} // the admin surface is read-only over the gateway
                }
            }

            event = updates.recv() => {
                match event {
                    Ok(StoreEvent::RecordChanged(record)) => {
                        let update = GatewayEvent::RecordUpdate { record };
                        if send_event(&mut sender, &update).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("admin subscription lagged by {} events, resyncing", n);
                        if send_all_records(&ctx.store, &mut sender).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }
}

async fn send_all_records(
    store: &WatchStore,
    sender: &mut SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    match store.list_records() {
        Ok(records) => send_event(sender, &GatewayEvent::AllRecords { records }).await,
        Err(e) => {
            warn!("listing records failed: {}", e);
            let message = "could not load watch records".to_string();
            send_event(sender, &GatewayEvent::Error { message }).await
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).expect("gateway events serialize");
    sender.send(Message::Text(text.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use vigil_store::Database;

    #[test]
    fn test_routing_after_identify() {
        // Administrators bypass tracking in both views.
        assert_eq!(route_for(Role::Administrator, View::Viewer), Route::UntrackedViewer);
        assert_eq!(route_for(Role::Administrator, View::Admin), Route::Admin);

        assert_eq!(route_for(Role::Standard, View::Viewer), Route::TrackedViewer);
        assert_eq!(route_for(Role::Standard, View::Admin), Route::ElevationRequired);
    }

    /// The correction path as the viewer loop drives it: a stale record is
    /// never trusted directly, and the engine's view only moves once the
    /// correction write echoes back through the subscription.
    #[tokio::test]
    async fn test_correction_round_trips_through_the_store() {
        let store = WatchStore::new(Database::open_in_memory().unwrap());
        let now = Utc::now();
        let yesterday = now - ChronoDuration::days(2);

        let stale = UserRecord {
            username: "mika".to_string(),
            watch_time: 900,
            last_active: yesterday.timestamp_millis(),
            time_limit: Some(30),
            last_reset: None,
        };
        store.put_record(&stale).unwrap();

        let mut updates = store.subscribe();
        let mut engine = AccrualEngine::new(stale.clone(), EngineConfig::default());

        let Observation::Stale(correction) = engine.observe(stale, now) else {
            panic!("two-day-old record must be stale");
        };
        store.put_record(&correction).unwrap();

        // The confirmed write comes back over the subscription and is
        // accepted on the second pass.
        let StoreEvent::RecordChanged(echoed) = updates.recv().await.unwrap();
        assert_eq!(engine.observe(echoed, now), Observation::Current);
        assert_eq!(engine.record().watch_time, 0);
        assert_eq!(engine.record().time_limit, Some(30));
        assert_eq!(engine.record().last_reset, Some(now.timestamp_millis()));
    }

    /// Applying the same correction from two racing observers is
    /// idempotent under last-write-wins.
    #[tokio::test]
    async fn test_racing_corrections_are_idempotent() {
        let store = WatchStore::new(Database::open_in_memory().unwrap());
        let now = Utc::now();
        let yesterday = now - ChronoDuration::days(2);

        let stale = UserRecord {
            username: "mika".to_string(),
            watch_time: 900,
            last_active: yesterday.timestamp_millis(),
            time_limit: None,
            last_reset: None,
        };
        store.put_record(&stale).unwrap();

        let mut tab_a = AccrualEngine::new(stale.clone(), EngineConfig::default());
        let mut tab_b = AccrualEngine::new(stale.clone(), EngineConfig::default());

        let Observation::Stale(fix_a) = tab_a.observe(stale.clone(), now) else {
            panic!("expected stale");
        };
        let Observation::Stale(fix_b) = tab_b.observe(stale, now) else {
            panic!("expected stale");
        };

        store.put_record(&fix_a).unwrap();
        store.put_record(&fix_b).unwrap();

        let settled = store.get_record("mika").unwrap().unwrap();
        assert_eq!(settled, fix_a);
        assert_eq!(settled, fix_b);
    }
}

//! tourney-clock server entry point.
//!
//! Wires storage, the subscriber registry and the change-feed bridge, then
//! serves the REST API until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tourney_clock::api;
use tourney_clock::app_state::AppState;
use tourney_clock::config::ClockConfig;
use tourney_clock::domain::defaults::{default_structure, demo_tournament};
use tourney_clock::domain::{BuiltinPaytables, BuiltinSounds, Mutator, SystemClock};
use tourney_clock::notify::{
    BroadcastChangeFeed, ChangeConsumer, ChangeFeed, ChangeFeedBridge, PgChangeFeed,
    PublishingStore, SubscriberRegistry, TournamentChangeDispatcher,
};
use tourney_clock::persistence::{CachingStore, MemoryStore, PostgresStore, TournamentStore};
use tourney_clock::service::TournamentService;

/// Storage backend plus where its change feed comes from.
enum Backend {
    Postgres(PostgresStore),
    Memory(MemoryStore, broadcast::Receiver<String>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config =
        ClockConfig::from_env().map_err(|e| anyhow::anyhow!("loading configuration: {e}"))?;
    tracing::info!(addr = %config.listen_addr, persistence = config.persistence_enabled, "starting tourney-clock");

    // Storage
    let backend = if config.persistence_enabled {
        let store = PostgresStore::connect(&config)
            .await
            .context("connecting to postgres")?;
        store.migrate().await.context("running migrations")?;
        Backend::Postgres(store)
    } else {
        let (tx, rx) = broadcast::channel(config.change_feed_capacity);
        let store = MemoryStore::with_change_feed(tx);
        seed(&store).await.context("seeding in-memory store")?;
        Backend::Memory(store, rx)
    };
    let backing: Arc<dyn TournamentStore> = match &backend {
        Backend::Postgres(store) => Arc::new(store.clone()),
        Backend::Memory(store, _) => Arc::new(store.clone()),
    };

    // Domain and notification layer
    let mutator = Mutator::new(
        Arc::new(SystemClock),
        Arc::new(BuiltinPaytables::new()),
        Arc::new(BuiltinSounds::new()),
    );
    let cache = CachingStore::new(backing, config.cache_capacity);
    let cached: Arc<dyn TournamentStore> = Arc::new(cache.clone());
    let registry = Arc::new(SubscriberRegistry::new(
        Arc::clone(&cached),
        mutator.clone(),
    ));
    let dispatcher: Arc<dyn ChangeConsumer> = Arc::new(TournamentChangeDispatcher::new(
        Some(cache),
        Arc::clone(&cached),
        Arc::clone(&registry),
    ));
    let bridge = ChangeFeedBridge::new(vec![dispatcher], config.change_feed_backoff())?;

    let feed: Box<dyn ChangeFeed> = match backend {
        Backend::Postgres(store) => Box::new(
            PgChangeFeed::connect(store.pool(), &bridge.channels())
                .await
                .context("listening for database changes")?,
        ),
        Backend::Memory(_, rx) => Box::new(BroadcastChangeFeed::new(rx)),
    };
    let cancel = CancellationToken::new();
    let bridge_task = tokio::spawn(bridge.run(feed, cancel.clone()));

    // Service layer
    let store = Arc::new(PublishingStore::new(cached, Arc::clone(&registry)));
    let service = Arc::new(TournamentService::new(store, registry, mutator));

    let app_state = AppState {
        service,
        listen_timeout: config.listen_timeout(),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("binding server")?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    cancel.cancel();
    if let Err(e) = bridge_task.await {
        tracing::warn!(error = %e, "change feed bridge ended abnormally");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Stores the default structure and a demo tournament on it.
async fn seed(store: &MemoryStore) -> anyhow::Result<()> {
    let structure_id = store.create_structure(default_structure()).await?;
    let structure = store.fetch_structure(structure_id).await?;
    let id = store.create_tournament(demo_tournament(structure)).await?;
    tracing::info!(tournament_id = %id, %structure_id, "seeded demo tournament");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
}

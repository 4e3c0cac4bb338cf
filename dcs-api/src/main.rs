use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dcs_api::{app, worker, AppState};
use dcs_checkin::CheckinDesk;
use dcs_core::{Connectivity, DocumentStore, LocalCache, RemoteRepository, TimestampIdGenerator};
use dcs_store::{MemoryLocalCache, PgDocumentStore, RedisLocalCache};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcs_api=debug,dcs_checkin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = dcs_store::app_config::Config::load()?;
    tracing::info!("Starting DCS desk on port {}", config.server.port);

    // Remote store; the pool connects lazily so the desk can start offline
    let pg = PgDocumentStore::connect_lazy(&config.database.url, config.database.max_connections)?;
    if let Err(e) = pg.migrate().await {
        tracing::warn!("Migrations not applied, remote store unreachable: {}", e);
    }
    let store: Arc<dyn DocumentStore> = Arc::new(pg);

    // Local cache
    let cache: Arc<dyn LocalCache> = match &config.redis {
        Some(redis) => Arc::new(RedisLocalCache::new(&redis.url, &redis.namespace)?),
        None => {
            tracing::warn!("No local cache configured, offline state will not survive a restart");
            Arc::new(MemoryLocalCache::new())
        }
    };

    let connectivity = match store.ping().await {
        Ok(()) => Connectivity::Online,
        Err(e) => {
            tracing::warn!("Starting offline: {}", e);
            Connectivity::Offline
        }
    };

    let desk = CheckinDesk::open(
        store.clone(),
        cache,
        Arc::new(TimestampIdGenerator::new()),
        config.checkin.clone(),
        connectivity,
    )
    .await?;

    let state = AppState::new(desk, RemoteRepository::new(store));

    tokio::spawn(worker::start_connectivity_worker(
        state.clone(),
        Duration::from_secs(config.sync.probe_interval_seconds),
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

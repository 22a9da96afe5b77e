use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use games_engine::{
    config::Config,
    domain::GameKind,
    events::EventListener,
    indexer_client::IndexerClient,
    round_watcher::{RoundCache, RoundWatcher},
    rpc_client::RpcClientPool,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging with JSON formatting (configurable via env)
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "games_engine=info".into());

    if use_json {
        // JSON structured logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        // Human-readable logging for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "games-engine",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting games engine"
    );

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        refresh_interval_ms = config.engine.refresh_interval_ms,
        spin_timeout_secs = config.engine.spin_timeout_secs,
        rpc_count = config.rpc.urls.len(),
        "Configuration loaded"
    );

    // Initialize the RPC client pool shared by every watcher
    let rpc_pool = Arc::new(RpcClientPool::new(
        &config.rpc,
        config.engine.max_read_retries,
    )?);
    tracing::info!(rpc_count = config.rpc.urls.len(), "RPC pool initialized");

    // Indexer client is constructed here so configuration errors fail fast;
    // statistics surfaces query it on demand.
    let _indexer = IndexerClient::new(&config.indexer)?;
    tracing::info!(indexer_url = %config.indexer.graphql_url, "Indexer client initialized");

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();
    let mut caches: HashMap<GameKind, RoundCache> = HashMap::new();

    // One event listener and one round watcher per game
    for game in GameKind::ALL {
        let contract = config.games.contract_address(game).to_string();
        let (event_tx, event_rx) = mpsc::channel(256);

        let listener = EventListener::new(
            rpc_pool.clone(),
            game,
            contract.clone(),
            event_tx,
            Duration::from_millis(config.engine.event_poll_interval_ms),
            shutdown.clone(),
        );
        handles.push(tokio::spawn(listener.run()));

        let cache: RoundCache = Arc::new(RwLock::new(HashMap::new()));
        caches.insert(game, cache.clone());

        let watcher = RoundWatcher::new(
            game,
            contract,
            rpc_pool.clone(),
            config.engine.clone(),
            cache,
            event_rx,
            shutdown.clone(),
        );
        handles.push(tokio::spawn(watcher.run()));

        info!(game = %game, "Watcher and listener spawned");
    }
    info!(games = caches.len(), "Round caches initialized");

    // Start metrics server
    let metrics_handle = tokio::spawn(start_metrics_server(config.metrics_port));

    tracing::info!("Games engine running");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    // Graceful shutdown
    shutdown.cancel();
    futures::future::join_all(handles).await;
    metrics_handle.abort();

    tracing::info!("Games engine stopped");

    Ok(())
}

async fn start_metrics_server(port: u16) -> Result<()> {
    use axum::{routing::get, Router};
    use std::net::SocketAddr;

    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder.install_recorder()?;

    let app = Router::new().route("/metrics", get(|| async move { handle.render() }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Engine metrics listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

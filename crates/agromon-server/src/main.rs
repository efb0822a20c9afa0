use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::signal;
use tokio::time::interval;
use tracing_subscriber::EnvFilter;

use agromon_alert::engine::AlertEngine;
use agromon_provider::open_meteo::OpenMeteoClient;
use agromon_provider::ForecastProvider;
use agromon_storage::engine::SqliteForecastStore;
use agromon_storage::ForecastStore;

use agromon_server::app;
use agromon_server::cache::ResponseCache;
use agromon_server::config::ServerConfig;
use agromon_server::farm_seed;
use agromon_server::identity::{HttpIdentityProvider, IdentityProvider};
use agromon_server::ingest::IngestWorker;
use agromon_server::rate_limit::RateLimiter;
use agromon_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  agromon-server [config.toml]                          Start the server");
    eprintln!("  agromon-server ingest <config.toml>                   Run one fan-out ingestion pass");
    eprintln!("  agromon-server init-farms <config.toml> <seed.json>   Initialize farms from seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    agromon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("agromon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("ingest") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("ingest requires a <config.toml> argument")
            })?;
            run_ingest_once(config_path).await
        }
        Some("init-farms") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-farms requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-farms requires a <seed.json> argument")
            })?;
            run_init_farms(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn build_provider(config: &ServerConfig) -> Result<Arc<dyn ForecastProvider>> {
    let client = OpenMeteoClient::new(
        &config.provider.base_url,
        Duration::from_secs(config.provider.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        provider = %config.provider.base_url,
        "agromon-server starting"
    );

    // Build components
    let store: Arc<dyn ForecastStore> =
        Arc::new(SqliteForecastStore::new(Path::new(&config.data_dir))?);
    let provider = build_provider(&config)?;
    let identity: Option<Arc<dyn IdentityProvider>> = match &config.identity.base_url {
        Some(base_url) => Some(Arc::new(HttpIdentityProvider::new(
            base_url,
            Duration::from_secs(config.identity.request_timeout_secs),
        )?)),
        None => {
            tracing::info!("No identity service configured; farm queries are not ownership-gated");
            None
        }
    };
    let cache = Arc::new(ResponseCache::new(config.cache.ttl_secs));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window_secs,
    ));

    let state = AppState {
        store: store.clone(),
        provider: provider.clone(),
        identity,
        alert_engine: Arc::new(AlertEngine::with_default_rules()),
        cache: cache.clone(),
        rate_limiter: rate_limiter.clone(),
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    // Periodic sweep of expired cache entries and idle rate windows
    let sweep_cache = cache.clone();
    let sweep_limiter = rate_limiter.clone();
    let sweep_secs = config.cache.sweep_interval_secs.max(1);
    let sweep_handle = tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(sweep_secs));
        loop {
            tick.tick().await;
            let now = Utc::now();
            let expired = sweep_cache.sweep(now);
            let idle = sweep_limiter.sweep(now);
            if expired > 0 || idle > 0 {
                tracing::debug!(expired, idle, "Swept expired cache entries and rate windows");
            }
        }
    });

    // Ingestion scheduler
    let ingest_handle = if config.ingest.enabled {
        let worker = IngestWorker::new(store.clone(), provider.clone(), &config.ingest);
        let interval_secs = config.ingest.interval_secs;
        Some(tokio::spawn(async move {
            worker.run(interval_secs).await;
        }))
    } else {
        tracing::info!("Ingestion scheduler disabled");
        None
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let app = app::build_http_app(state);

    tracing::info!(http = %http_addr, "Server started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        signal::ctrl_c().await.ok();
    })
    .await?;

    sweep_handle.abort();
    if let Some(handle) = ingest_handle {
        handle.abort();
    }
    cache.clear();
    rate_limiter.clear();
    tracing::info!("Server stopped");

    Ok(())
}

/// Run a single fan-out ingestion pass and exit, mirroring the scheduler's
/// per-tick work. Suitable for cron.
async fn run_ingest_once(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store: Arc<dyn ForecastStore> =
        Arc::new(SqliteForecastStore::new(Path::new(&config.data_dir))?);
    let provider = build_provider(&config)?;

    let worker = IngestWorker::new(store, provider, &config.ingest);
    let summary = worker.run_once().await;

    if summary.farms_failed > 0 || summary.batches_failed > 0 {
        tracing::warn!(
            farms_failed = summary.farms_failed,
            batches_failed = summary.batches_failed,
            "Ingestion finished with partial failures"
        );
    }
    Ok(())
}

/// Initialize farms from a JSON seed file.
fn run_init_farms(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = SqliteForecastStore::new(Path::new(&config.data_dir))?;
    farm_seed::init_from_seed_file(&store, seed_path)
}

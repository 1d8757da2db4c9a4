//! CoinPulse Server
//!
//! Market statistics service for a fixed catalogue of crypto assets: a worker
//! process publishes scheduled refresh triggers and an api process consumes
//! them, stores price points and serves read queries.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::{Parser, Subcommand};
use coinpulse_core::catalog::AssetCatalog;
use coinpulse_core::channel::{EventChannel, NatsTransport, ReconnectPolicy};
use coinpulse_core::events::{TriggerEvent, UPDATE_TOPIC};
use coinpulse_core::processors::{Refresher, Scheduler, UpdateConsumer};
use coinpulse_core::provider::CoinGeckoProvider;
use coinpulse_core::stats::StatsQueryService;
use coinpulse_core::store::PgPriceStore;
use config::file::FileConfig;
use config::{ConfigLoader, get_database_url};
use server::{build_health_router, build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// CoinPulse - crypto market statistics service
#[derive(Parser, Debug)]
#[command(name = "coinpulse-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./coinpulse.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the api process: query endpoints, trigger subscription, refresh pipeline
    Api {
        /// Override the listen address (e.g., 0.0.0.0:3000)
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Run database migrations on startup
        #[arg(long, default_value = "false")]
        migrate: bool,
    },
    /// Run the worker process: cron-driven refresh trigger publisher
    Worker {
        /// Override the listen address (e.g., 0.0.0.0:3001)
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting coinpulse-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config);
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    match args.mode {
        Mode::Api { listen, migrate } => run_api(config, listen, migrate).await,
        Mode::Worker { listen } => run_worker(config, listen).await,
    }
}

/// The consumer process: HTTP query surface, trigger-event subscription,
/// refresh pipeline, persistence.
async fn run_api(
    config: FileConfig,
    listen_override: Option<SocketAddr>,
    migrate: bool,
) -> anyhow::Result<()> {
    let listen_addr = listen_override.unwrap_or(config.api.listen);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Build the shared services
    let catalog = AssetCatalog::new(config.assets.tracked.clone())?;
    let store = Arc::new(PgPriceStore::new(db_pool.clone()));
    let provider = Arc::new(CoinGeckoProvider::new(config.provider.base_url.clone()));
    let refresher = Arc::new(Refresher::new(catalog.clone(), provider, store.clone()));
    let stats = Arc::new(StatsQueryService::new(catalog, store));

    // Bring up the event channel and the trigger subscription
    let channel = build_channel(&config);
    spawn_background_connect(&channel);
    UpdateConsumer::new(refresher.clone()).start(&channel).await?;

    // Initial data fetch so a fresh deployment serves data immediately
    let initial = refresher.clone();
    tokio::spawn(async move {
        match initial.refresh_all().await {
            Ok(report) => {
                tracing::info!(inserted = report.inserted, "Initial refresh completed");
            }
            Err(e) => tracing::error!(error = %e, "Initial refresh failed"),
        }
    });

    // Build the router and run the server
    let state = AppState::new(stats, refresher);
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Drain the bus connection before releasing the pool
    if let Err(e) = channel.close().await {
        tracing::warn!(error = %e, "Bus drain failed during shutdown");
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// The producer process: cron-driven scheduler publishing refresh triggers,
/// plus a health endpoint.
async fn run_worker(config: FileConfig, listen_override: Option<SocketAddr>) -> anyhow::Result<()> {
    let listen_addr = listen_override.unwrap_or(config.worker.listen);

    let channel = build_channel(&config);
    spawn_background_connect(&channel);

    // Arm the refresh trigger job
    let mut scheduler = Scheduler::new(channel.clone());
    scheduler.initialize(&config.schedule.cron);

    // One immediate trigger so consumers do not wait out the first period
    let initial_channel = channel.clone();
    tokio::spawn(async move {
        let event = TriggerEvent::update_now();
        if let Err(e) = initial_channel.publish(UPDATE_TOPIC, &event).await {
            tracing::error!(error = %e, "Initial trigger publish failed");
        }
    });

    let router = build_health_router();
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop timers first, then drain the bus
    scheduler.stop_all().await;
    if let Err(e) = channel.close().await {
        tracing::warn!(error = %e, "Bus drain failed during shutdown");
    }
    tracing::info!("Worker shutdown complete");

    result.map_err(Into::into)
}

/// Build the event channel over the configured NATS address.
fn build_channel(config: &FileConfig) -> Arc<EventChannel> {
    Arc::new(EventChannel::new(
        Arc::new(NatsTransport),
        config.bus.url.clone(),
        ReconnectPolicy::with_delay(Duration::from_secs(config.bus.reconnect_delay_secs)),
    ))
}

/// Start the connect retry loop without blocking startup; publishes and
/// subscriptions wait on it internally.
fn spawn_background_connect(channel: &Arc<EventChannel>) {
    let channel = channel.clone();
    tokio::spawn(async move {
        if let Err(e) = channel.connect().await {
            tracing::warn!(error = %e, "Bus connection closed before it was established");
        }
    });
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

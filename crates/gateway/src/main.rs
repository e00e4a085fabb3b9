//! Classroom API Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Lesson join, leave, end, and detail
//! - API key and admin authentication
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod routes;

use anyhow::Context;
use classroom_common::{
    auth::AdminCredentials,
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, LessonStore, MemoryStore, Repository},
    lifecycle::{CoordinatorPolicy, LifecycleCoordinator},
    livekit::{LiveKitTokenIssuer, MediaEndpoint},
    metrics,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use middleware::rate_limit::{self, GlobalRateLimiter};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Database URLs with this scheme run against the in-process store
const MEMORY_STORE_SCHEME: &str = "memory:";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub coordinator: LifecycleCoordinator,
    pub media: MediaEndpoint,
    pub admin: AdminCredentials,
    pub limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn LessonStore>) -> Self {
        let issuer = Arc::new(LiveKitTokenIssuer::from_config(&config.livekit));
        let coordinator =
            LifecycleCoordinator::new(store, issuer, CoordinatorPolicy::from_config(&config));

        Self {
            media: MediaEndpoint::from_config(&config.livekit),
            admin: AdminCredentials::new(&config.auth.admin_username, &config.auth.admin_password),
            limiter: rate_limit::from_config(&config.rate_limit),
            coordinator,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // An explicit file replaces the layered config/ lookup
    let config = match std::env::var("APP_CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path),
        Err(_) => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    init_tracing(&config.observability);
    info!("Starting Classroom API Gateway v{}", classroom_common::VERSION);

    config.validate()?;
    if !config.teacher_role_enabled() {
        warn!("auth.teacher_key is empty, every caller joins as a student");
    }

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    let store = open_store(&config).await?;
    let shutdown_timeout = config.shutdown_timeout();
    let listen_addr = config.listen_addr();

    let app = routes::create_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    info!("Listening on {}", listen_addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    // Stop waiting on in-flight requests once the drain window passes
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => warn!(timeout_secs = shutdown_timeout.as_secs(), "Shutdown timed out, dropping open connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LessonStore>> {
    if config.database.url.starts_with(MEMORY_STORE_SCHEME) {
        warn!("Using the in-memory lesson store, nothing survives a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    Ok(Arc::new(Repository::new(db)))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

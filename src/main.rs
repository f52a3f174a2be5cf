//! Relay Engine
//!
//! Bounded-concurrency conversational relay handling:
//! - Per-user rate limiting with temporary blocking and VIP bypass
//! - Single-flight admission for heavy requests
//! - Capacity-limited image-analysis pipeline with retry and timeout
//! - FIFO-queued upstream completion client with backoff
//! - Deterministic pagination of oversized answers

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use admission::{RateLimiter, RuleSet, SingleFlightGate};
use api::{router, AppState, RelayService, ServiceConfig};
use paginate::{PaginationStore, Paginator};
use pipeline::{ImagePipeline, PipelineConfig, Reconciler, ReconcilerConfig};
use relay_core::{MemoryHistory, UpstreamCaller};
use telemetry::init_tracing_from_env;
use upstream::{UpstreamClient, UpstreamConfig};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    upstream: UpstreamConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    service: ServiceConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: UpstreamConfig::default(),
            pipeline: PipelineConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting Relay Engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = load_config()?;
    if config.service.default_model.is_empty() {
        config.service.default_model = config.upstream.model.clone();
    }

    info!(
        base_url = %config.upstream.base_url,
        model = %config.service.default_model,
        upstream_concurrency = config.upstream.max_concurrency,
        pipeline_capacity = config.pipeline.capacity,
        admins = config.service.admin_ids.len(),
        "Loaded configuration"
    );

    // Upstream completion client
    let upstream_client: Arc<dyn UpstreamCaller> = Arc::new(
        UpstreamClient::new(config.upstream.clone())
            .context("Failed to create upstream client")?,
    );

    // Admission components
    let limiter = Arc::new(RateLimiter::new(RuleSet::default()));
    let gate = SingleFlightGate::default();

    // Image pipeline
    let pipeline = Arc::new(ImagePipeline::new(
        config.pipeline.clone(),
        upstream_client.clone(),
    ));

    // Background reconciliation (gate/window/job sweeps + metrics log)
    let reconciler = Arc::new(Reconciler::new(
        ReconcilerConfig::default(),
        limiter.clone(),
        gate.clone(),
        pipeline.clone(),
    ));
    let _reconciler_handles = reconciler.start();

    // Relay service
    let service = Arc::new(RelayService::new(
        limiter,
        gate,
        pipeline.clone(),
        upstream_client,
        Paginator::default(),
        Arc::new(PaginationStore::new()),
        Arc::new(MemoryHistory::default()),
        config.service.clone(),
    ));

    // Create router
    let state = AppState::new(service.clone());
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Cleanup
    info!("Shutting down...");

    // Drain outstanding image jobs within the grace period
    service.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("RELAY")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested upstream config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(base_url) = std::env::var("RELAY_UPSTREAM_BASE_URL") {
        config.upstream.base_url = base_url;
    }
    if let Ok(api_key) = std::env::var("RELAY_UPSTREAM_API_KEY") {
        config.upstream.api_key = api_key;
    }
    if let Ok(model) = std::env::var("RELAY_UPSTREAM_MODEL") {
        config.upstream.model = model;
    }

    // Admin allowlist as a comma-separated id list
    if let Ok(admins) = std::env::var("RELAY_ADMIN_IDS") {
        config.service.admin_ids = admins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
    }
    if let Ok(prompt) = std::env::var("RELAY_SYSTEM_PROMPT") {
        config.service.system_prompt = Some(prompt.clone());
        config.pipeline.system_prompt = Some(prompt);
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}

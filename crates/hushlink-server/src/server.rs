use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    handlers::{fetch_secret, health, store_secret},
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    /// Base URL advertised in issued links ($HUSHLINK_PUBLIC_URL). Falls
    /// back to per-request Host-header derivation when unset.
    pub public_url: Option<String>,
    pub cors_origins: Option<String>,
    pub sweep_interval: Duration,
    /// How long consumed records linger before the sweep removes them.
    pub retention_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HUSHLINK_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("HUSHLINK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            data_dir: std::env::var("HUSHLINK_DATA_DIR").ok().map(PathBuf::from),
            public_url: std::env::var("HUSHLINK_PUBLIC_URL").ok(),
            cors_origins: std::env::var("HUSHLINK_CORS_ORIGINS").ok(),
            sweep_interval: Duration::from_secs(300),
            retention_secs: std::env::var("HUSHLINK_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
        }
    }
}

/// Resolve the data directory, creating it if needed.
pub fn resolve_data_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(d) => {
            std::fs::create_dir_all(d).context("create data dir")?;
            Ok(d.clone())
        }
        None => crate::dirs::data_dir(),
    }
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let db_path = data_dir.join("hushlink.db");
    let store = crate::store::Store::open(&db_path).context("open store")?;

    // Garbage-collect consumed records in the background.
    store
        .clone()
        .spawn_sweep(cfg.sweep_interval, cfg.retention_secs);

    let state = AppState {
        store,
        public_url: cfg.public_url,
    };

    let app = router(state, cfg.cors_origins.as_deref());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "hushlink server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

/// Build the application router. Public so tests can serve it on an
/// ephemeral listener.
pub fn router(state: AppState, cors_origins: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/store-secret", post(store_secret))
        .route("/secret/{id}", get(fetch_secret))
        .with_state(state)
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}

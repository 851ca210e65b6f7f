//! Shacker Backend Server
//!
//! Authenticates players by password or Ethereum wallet, enforces the daily
//! play limit, records scores and serves the leaderboard.

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use shacker_server::auth::NftChecker;
use shacker_server::config::Config;
use shacker_server::db;
use shacker_server::leaderboard::{JsonBinMirror, ScoreMirror};
use shacker_server::link::MemoryLinkSessions;
use shacker_server::middleware::{self, RateLimiter};
use shacker_server::routes;
use shacker_server::state::{AppState, Backends};
use shacker_server::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting Shacker backend");

    let mirror: Option<Arc<dyn ScoreMirror>> = match &config.mirror {
        Some(mirror_config) => Some(Arc::new(JsonBinMirror::new(
            mirror_config,
            config.rpc_timeout,
        ))),
        None => {
            tracing::info!("JSONBIN_BIN_ID not set, leaderboard mirror disabled");
            None
        }
    };

    let nft = NftChecker::new(config.nft.clone(), config.rpc_timeout);
    if !nft.is_enabled() {
        tracing::info!("ETH_RPC_URL / NFT_CONTRACT_ADDRESS not set, NFT checks disabled");
    }

    let backends = match &config.database_url {
        Some(_) => {
            let pool = db::connect(&config).await.context("Database setup failed")?;
            let store = Arc::new(PgStore::new(pool, config.store_timeout));
            Backends {
                accounts: store.clone(),
                nonces: store,
                link_sessions: Arc::new(MemoryLinkSessions::new()),
                mirror,
                nft,
            }
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, using the in-memory store; data is lost on restart"
            );
            Backends {
                mirror,
                nft,
                ..Backends::in_memory()
            }
        }
    };

    // Create shared app state
    let app_state = AppState::build(&config, backends)
        .await
        .context("Failed to initialize services")?;

    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    rate_limiter.spawn_sweeper(Duration::from_secs(60));

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::api_routes())
        .with_state(app_state);

    let app = middleware::with_security_headers(app, config.environment.is_production())
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit,
        ))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Shacker Game API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /register",
            "POST /login",
            "GET /can-play",
            "GET /scores",
            "POST /scores",
            "GET /profile",
            "POST /wallet/nonce",
            "POST /wallet/verify",
            "POST /wallet/link",
            "POST /wallet/check-nft",
            "POST /wallet/create-session",
            "GET /wallet/check-session",
            "POST /wallet/link-session",
            "GET /wallet/session-status",
            "GET /health"
        ]
    }))
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.accounts.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            "unavailable"
        }
    };

    let status = if database == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.trim().is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

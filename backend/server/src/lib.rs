//! Documentation of the Pipelines job-search tracking backend.
//!
//! Users curate a *pipeline*: the ordered list of places they applied to or
//! worked at (company, title, date). Other users look pipelines up by company.
//!
//!
//!
//! # General Infrastructure
//! - React client talks JSON to this server
//! - Profiles live in Redis, one hash per profile holding a JSON document and a version
//! - Meilisearch holds a copy of every profile keyed by the companies it mentions
//! - Redis is the source of truth, Meilisearch is refreshed after every change and on startup
//! - Session tokens are checked upstream, this server only reads them
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path                                   | Body                                  |
//! |--------|----------------------------------------|---------------------------------------|
//! | GET    | `/api/pipeline/{id}`                   |                                       |
//! | POST   | `/api/pipeline/add/{id}`               | `{index?, company, title, date}`      |
//! | POST   | `/api/pipeline/remove/{id}`            | `{index}`                             |
//! | GET    | `/api/pipeline/search/company/{query}` |                                       |
//!
//! Errors are always `{"error": "..."}`. Unknown or malformed ids are `404 No such Profile.`
//!
//!
//!
//! # Notes
//!
//! ## Lost Updates
//! The first version read a profile, spliced the array and wrote it back. Two edits at
//! once meant one silently vanished. Writes now carry the version they read and Redis
//! refuses the write if the version moved, see [`pipeline`].
//!
//! ## Legacy Mode
//! `PIPELINE_COMPAT=legacy` keeps the old `index: 0` and remove behaviour for clients
//! that depend on it. Default is `corrected`.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally without Redis or Meilisearch.
//! ```sh
//! STORE_BACKEND=memory SEED_FILE=profiles.json RUST_LOG=info cargo run
//! ```
//!
//!
//!
//! # Environment
//!
//! | Variable          | Default                   |
//! |-------------------|---------------------------|
//! | `RUST_PORT`       | `4000`                    |
//! | `STORE_BACKEND`   | `redis`                   |
//! | `REDIS_URL`       | `redis://redis:6379`      |
//! | `MEILI_URL`       | `http://meilisearch:7700` |
//! | `PIPELINE_COMPAT` | `corrected`               |
//! | `REQUIRE_SESSION` | `false`                   |
//! | `ALLOWED_ORIGIN`  | `http://localhost:3000`   |
//! | `SEED_FILE`       | unset                     |
//!
//! Secrets are read from `/run/secrets`: `MEILI_ADMIN_KEY`.
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod search;
pub mod session;
pub mod state;
pub mod utils;

use config::Config;
use routes::{add_handler, pipeline_handler, remove_handler, search_handler};
use state::AppState;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!(
        "Starting server in {} mode...",
        state.pipelines.compatibility()
    );

    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/pipeline/{id}", get(pipeline_handler))
        .route("/api/pipeline/add/{id}", post(add_handler))
        .route("/api/pipeline/remove/{id}", post(remove_handler))
        .route("/api/pipeline/search/company/{query}", get(search_handler))
        .layer(cors(&state.config.allowed_origin))
        .with_state(state)
}

fn cors(allowed_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            warn!("Invalid ALLOWED_ORIGIN {allowed_origin}: {e}, cross-origin requests disabled");
            cors
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

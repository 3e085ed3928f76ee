//! Documentation of a volunteer scheduling service.
//!
//! Volunteers are scheduled against hourly slots for a set of named tasks. The client
//! draws a grid: one row per task, one column per hour, colored chips for volunteers.
//!
//!
//!
//! # General Infrastructure
//! - Client talks JSON to this server only
//! - Server keeps tasks and volunteers as documents in Redis
//! - One connection manager is created at startup and shared through [`state::AppState`]
//! - `SCHEDULER_STORE=memory` swaps Redis for an in-process store, handy for local runs
//!
//!
//!
//! # Routes
//!
//! | Method | Path | Body / Query | Success |
//! |--------|------|--------------|---------|
//! | POST | `/tasks` | `{name}` | 201 `{message, task}` |
//! | GET | `/tasks` | `?limit&skip` | 200 `[task]` |
//! | PATCH | `/tasks` | `{taskId, name}` | 200 `{message, task}` |
//! | PATCH | `/tasks` | `{taskId, hourIndex, volunteer, action: add \| remove}` | 200 `{message, task}` |
//! | PATCH | `/tasks` | `{taskId, hourIndex, action: addHour \| removeHour}` | 200 `{message, task}` |
//! | DELETE | `/tasks` | `?id` | 200 `{message}` |
//! | POST | `/volunteers` | `{name, color}` | 201 `{message, volunteer}` |
//! | GET | `/volunteers` | `?limit&skip` | 200 `[volunteer]` |
//! | DELETE | `/volunteers` | `?name` | 200 `{message}` |
//!
//! Failures come back as `{error}` with 400 (bad input), 404 (unknown task, slot or volunteer),
//! 429 (rate limited) or 500 (store failure, details only in the server log).
//!
//!
//!
//! # Client Contract
//!
//! Task
//! ```json
//! {
//!   "id": "5d6c...",
//!   "name": "Setup",
//!   "hourIndex": [{ "index": 0, "volunteers": [{ "id": "9a1f...", "name": "Ava", "color": "#AABBCC" }] }],
//!   "createdAt": "2025-01-01T08:00:00Z",
//!   "updatedAt": "2025-01-01T08:00:00Z"
//! }
//! ```
//!
//! Volunteer
//! ```json
//! { "id": "9a1f...", "name": "Ava", "color": "#AABBCC" }
//! ```
//!
//! - `volunteer` in a PATCH is either the id string or an object with `id` (or `_id`)
//! - Removing by `{name}` alone still works for older clients
//! - Hour `index` is the column, the client decides what clock time it maps to
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=info cargo run -p scheduler
//! ```
//!
//! Run without Redis.
//! ```sh
//! SCHEDULER_STORE=memory RUST_LOG=debug cargo run -p scheduler
//! ```
//!
//! Redis-backed tests.
//! ```sh
//! cargo test -p server --features redis-tests
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    middleware,
    routing::get,
};

use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod limiter;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;
pub mod volunteers;

use config::Config;
use limiter::rate_limit;
use routes::{
    create_task_handler, create_volunteer_handler, delete_task_handler, delete_volunteer_handler,
    list_tasks_handler, list_volunteers_handler, patch_task_handler,
};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/tasks",
            get(list_tasks_handler)
                .post(create_task_handler)
                .patch(patch_task_handler)
                .delete(delete_task_handler),
        )
        .route(
            "/volunteers",
            get(list_volunteers_handler)
                .post(create_volunteer_handler)
                .delete(delete_volunteer_handler),
        )
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;
    let _sweeper = state
        .limiter
        .spawn_sweeper(state.config.rate_limit_sweep);

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
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

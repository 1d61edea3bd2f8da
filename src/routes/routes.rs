//! Defines routes for the file gateway.
//!
//! ## Structure
//! - **Probes**
//!   - `GET  /health` — liveness
//!   - `GET  /readyz` — readiness (disk write/read/delete)
//!
//! - **Files**
//!   - `POST /upload`         — multipart upload (`file`, `path`, `filename`)
//!   - `GET  /files/{*path}`  — download a stored file
//!   - `POST /create-folder`  — create a nested folder
//!   - `GET  /list`, `GET /list/{*path}` — list a folder
//!
//! The wildcard `*path` allows nested paths like `user/docs/2025/a.pdf`.

use crate::{
    handlers::{
        file_handlers::{create_folder, get_file, list_path, list_root, upload_file},
        health_handlers::{health, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build and return the router for all gateway routes.
///
/// `max_request_bytes` caps request bodies before any handler runs.
pub fn routes(max_request_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/upload", post(upload_file))
        .route("/files/{*path}", get(get_file))
        .route("/create-folder", post(create_folder))
        .route("/list", get(list_root))
        .route("/list/{*path}", get(list_path))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

//! Health & readiness handlers.
//!
//! - GET /health  -> liveness with service name and local timestamp
//! - GET /readyz  -> readiness that exercises disk I/O under the storage root

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;

pub const SERVICE_NAME: &str = "file-upload-server";

/// `GET /health`
///
/// Liveness probe. Never touches the filesystem.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Local::now(),
        service: SERVICE_NAME,
    })
}

/// `GET /readyz`
///
/// Writes, reads back and removes a scratch file under the storage root.
/// HTTP 200 when the disk check passes, HTTP 503 otherwise.
pub async fn readyz(State(storage): State<StorageService>) -> impl IntoResponse {
    let disk_check = match storage.probe().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => CheckStatus {
            ok: false,
            error: Some(err.to_string()),
        },
    };
    let overall_ok = disk_check.ok;

    let mut checks = HashMap::new();
    checks.insert("disk", disk_check);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Local>,
    service: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

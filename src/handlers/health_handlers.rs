//! Health & readiness handlers.
//!
//! - GET /        -> liveness banner
//! - GET /readyz  -> readiness that checks the storage directory is writable

use crate::{models::image::HealthResponse, services::storage_service::StorageService};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// `GET /`
///
/// Always 200; performs no I/O.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        message: "Image upload API running".into(),
    })
}

/// `GET /readyz`
///
/// Writes, reads back and deletes a scratch file in the staging directory.
/// HTTP 200 when that works, HTTP 503 otherwise.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let disk_check = match service.check_writable().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(err) => {
            warn!("readiness check failed: {}", err);
            CheckStatus {
                ok: false,
                error: Some(err.to_string()),
            }
        }
    };

    let overall_ok = disk_check.ok;
    let mut checks = HashMap::new();
    checks.insert("disk", disk_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
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
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_server, staged_names, stored_names};
    use axum::http::StatusCode;
    use serde_json::Value;
    use tempfile::TempDir;

    #[tokio::test]
    async fn root_reports_running() {
        let dir = TempDir::new().unwrap();
        let server = create_test_server(&dir);

        let response = server.get("/").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["ok"], true);
        assert_eq!(body["message"], "Image upload API running");
    }

    #[tokio::test]
    async fn readyz_ok_when_directory_writable() {
        let dir = TempDir::new().unwrap();
        let server = create_test_server(&dir);

        let response = server.get("/readyz").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["disk"]["ok"], true);
        assert!(stored_names(dir.path()).is_empty());
        assert!(staged_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn readyz_unavailable_when_directory_missing() {
        let dir = TempDir::new().unwrap();
        let server = create_test_server(&dir);
        std::fs::remove_dir(dir.path()).unwrap();

        let response = server.get("/readyz").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["status"], "error");
        assert_eq!(body["checks"]["disk"]["ok"], false);
    }
}

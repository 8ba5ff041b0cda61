//! Shared helpers for HTTP-level tests.

use crate::{
    routes::routes::app,
    services::storage_service::{DEFAULT_MAX_UPLOAD_BYTES, STAGING_DIR, StorageService},
};
use axum_test::TestServer;
use std::path::Path;
use tempfile::TempDir;

/// Serve the full app over `dir` with the default 5 MiB upload cap.
pub fn create_test_server(dir: &TempDir) -> TestServer {
    create_test_server_at(dir.path(), DEFAULT_MAX_UPLOAD_BYTES)
}

/// Serve the full app over an existing directory with a custom upload cap.
pub fn create_test_server_at(path: &Path, max_upload_bytes: u64) -> TestServer {
    let storage = StorageService::new(path, max_upload_bytes);
    TestServer::new(app(storage)).unwrap()
}

/// Names stored directly in `path`, excluding the staging directory.
pub fn stored_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != STAGING_DIR)
        .collect();
    names.sort();
    names
}

/// Names left inside the staging directory; empty when it was never created.
pub fn staged_names(path: &Path) -> Vec<String> {
    match std::fs::read_dir(path.join(STAGING_DIR)) {
        Ok(entries) => entries
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

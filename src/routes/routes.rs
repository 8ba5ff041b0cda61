//! Defines the HTTP surface of the image store.
//!
//! ## Structure
//! - `GET  /`                   — liveness banner
//! - `GET  /readyz`             — storage directory readiness
//! - `POST /upload`             — multipart upload, file field `image`
//! - `GET  /images-list`        — every stored filename with its URL
//! - `GET  /image/{filename}`   — size and modification time of one file
//! - `GET  /images/{filename}`  — raw stored bytes
//!
//! Anything else is a JSON 404.

use crate::{
    handlers::{
        health_handlers::{health, readyz},
        image_handlers::{
            image_metadata, list_images, not_found, serve_image, upload_image,
        },
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Build the routes for the image API.
///
/// The upload route's body limit sits above `max_upload_bytes` so the
/// per-file check in `StorageService` is the one that normally fires.
pub fn routes(max_upload_bytes: u64) -> Router<StorageService> {
    let body_limit = usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(health))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/images-list", get(list_images))
        .route("/image/{filename}", get(image_metadata))
        .route("/images/{filename}", get(serve_image))
        .fallback(not_found)
}

/// Full application: routes, CORS, request tracing, and shared state.
pub fn app(storage: StorageService) -> Router {
    routes(storage.max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(storage)
}

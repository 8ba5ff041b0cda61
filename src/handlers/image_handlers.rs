//! HTTP handlers for uploading, listing, describing and serving images.
//! Upload bodies are streamed straight to disk; storage concerns live in
//! `StorageService`.

use crate::{
    errors::AppError,
    models::image::{ImageListEntry, ImageMetadata, StoredImage, UploadResponse},
    services::{
        naming::generate_filename,
        storage_service::{StorageError, StorageService},
        validation::{FALLBACK_CONTENT_TYPE, ensure_image_content_type},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Request, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io::{self, ErrorKind};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

/// Multipart field carrying the uploaded file.
pub const IMAGE_FIELD: &str = "image";

/// POST `/upload`: store the multipart `image` file under a generated name.
pub async fn upload_image(
    State(service): State<StorageService>,
    headers: HeaderMap,
    uri: Uri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut multipart = multipart?;
    let limit = service.max_upload_bytes;
    let mut stored: Option<StoredImage> = None;

    let received: Result<(), AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| multipart_failure(err, limit))?
        {
            // Parts without a filename are plain form fields.
            let Some(original) = field.file_name().map(str::to_owned) else {
                continue;
            };
            if field.name() != Some(IMAGE_FIELD) || stored.is_some() {
                warn!(field = ?field.name(), "rejecting unexpected file field");
                return Err(StorageError::Validation("Unexpected field".into()).into());
            }

            let content_type = field.content_type().unwrap_or(FALLBACK_CONTENT_TYPE);
            if let Err(err) = ensure_image_content_type(content_type) {
                warn!(content_type, original = %original, "rejecting non-image upload");
                return Err(err.into());
            }

            let filename = generate_filename(Some(&original));
            let body = field.map(|chunk| chunk.map_err(stream_error));
            stored = Some(service.write_upload_stream(&filename, body).await?);
        }
        Ok::<(), AppError>(())
    }
    .await;

    match (received, stored) {
        (Ok(()), Some(image)) => {
            info!(
                filename = %image.filename,
                size_bytes = image.size_bytes,
                "image uploaded"
            );
            let url = image_url(&headers, &uri, &image.filename);
            Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    message: "Image uploaded successfully".into(),
                    filename: image.filename,
                    url,
                }),
            ))
        }
        (Ok(()), None) => Err(AppError::bad_request("No image uploaded")),
        (Err(err), stored) => {
            if let Some(image) = stored {
                if let Err(cleanup) = service.remove_file(&image.filename).await {
                    warn!("failed to remove {} after rejected upload: {}", image.filename, cleanup);
                }
            }
            warn!("upload rejected: {}", err);
            Err(err)
        }
    }
}

/// GET `/images-list`: every stored filename with its public URL.
pub async fn list_images(
    State(service): State<StorageService>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Vec<ImageListEntry>>, AppError> {
    let names = service.list_files().await.inspect_err(|err| {
        warn!("listing {} failed: {}", service.base_path.display(), err);
    })?;

    let entries = names
        .into_iter()
        .map(|filename| ImageListEntry {
            url: image_url(&headers, &uri, &filename),
            filename,
        })
        .collect();
    Ok(Json(entries))
}

/// GET `/image/{filename}`: size and modification time of one stored file.
pub async fn image_metadata(
    State(service): State<StorageService>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<ImageMetadata>, AppError> {
    let image = service.stat_file(&filename).await?;

    Ok(Json(ImageMetadata {
        url: image_url(&headers, &uri, &image.filename),
        filename: image.filename,
        size: image.size_bytes,
        modified_at: image.modified_at,
    }))
}

/// GET/HEAD `/images/{filename}`: the stored bytes.
///
/// `ServeFile` answers byte ranges, `If-Modified-Since` and HEAD; the weak
/// ETag and `If-None-Match` are handled here.
pub async fn serve_image(
    State(service): State<StorageService>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let (image, path) = service.locate_file(&filename).await?;
    let etag = image.etag();

    if if_none_match(request.headers(), &etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = HeaderValue::from_str(&image.http_date()) {
            response.headers_mut().insert(header::LAST_MODIFIED, value);
        }
        set_cache_headers(response.headers_mut(), &etag);
        return Ok(response);
    }

    let mime = mime_guess::from_path(&image.filename).first_or_octet_stream();
    let response = ServeFile::new_with_mime(&path, &mime)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    // Removed between the stat and the open.
    if response.status() == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(filename).into());
    }

    let mut response = response.map(Body::new);
    set_cache_headers(response.headers_mut(), &etag);
    Ok(response)
}

/// Any unrouted request.
pub async fn not_found() -> AppError {
    AppError::not_found("Not found")
}

/// `http://<host>/images/<percent-encoded filename>`.
fn image_url(headers: &HeaderMap, uri: &Uri, filename: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    format!("http://{}/images/{}", host, urlencoding::encode(filename))
}

fn set_cache_headers(headers: &mut HeaderMap, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=0"),
    );
}

/// Weak comparison of `If-None-Match` against the current tag.
fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    let current = etag.trim_start_matches("W/");
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == current)
}

/// Tag body-limit failures so the storage layer reports them as `PayloadTooLarge`.
fn stream_error(err: MultipartError) -> io::Error {
    let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorKind::FileTooLarge
    } else {
        ErrorKind::Other
    };
    io::Error::new(kind, err.body_text())
}

fn multipart_failure(err: MultipartError, limit: u64) -> AppError {
    let err = stream_error(err);
    match err.kind() {
        ErrorKind::FileTooLarge => StorageError::PayloadTooLarge { limit }.into(),
        _ => StorageError::Io(err).into(),
    }
}

//! Upload acceptance rules applied before any byte reaches disk.

use crate::services::storage_service::{STAGING_DIR, StorageError, StorageResult};

/// Content type assumed for a file part that declares none.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const IMAGE_PREFIX: &str = "image/";

/// Accept only declared MIME types beginning with `image/`.
pub fn ensure_image_content_type(content_type: &str) -> StorageResult<()> {
    if content_type.starts_with(IMAGE_PREFIX) {
        Ok(())
    } else {
        Err(StorageError::Validation("Only image files allowed".into()))
    }
}

/// Check that a client-supplied name refers to a single entry of the storage directory.
///
/// Anything that could resolve outside that directory, or into the staging
/// area, is reported as missing.
pub fn ensure_plain_filename(filename: &str) -> StorageResult<()> {
    let unsafe_name = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename == STAGING_DIR
        || filename.contains(['/', '\\', '\0']);

    if unsafe_name {
        Err(StorageError::NotFound(filename.to_string()))
    } else {
        Ok(())
    }
}

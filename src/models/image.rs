//! Represents a stored image file and the JSON bodies built from it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Facts about one stored file, re-derived from the filesystem on every read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredImage {
    /// Generated filename, unique within the storage directory.
    pub filename: String,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Last modification time reported by the filesystem.
    pub modified_at: DateTime<Utc>,
}

impl StoredImage {
    /// Weak validator built from size and modification time.
    pub fn etag(&self) -> String {
        format!(
            "W/\"{:x}-{:x}\"",
            self.size_bytes,
            self.modified_at.timestamp_millis()
        )
    }

    /// `Last-Modified` form of `modified_at`.
    pub fn http_date(&self) -> String {
        self.modified_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}

/// `GET /` body.
#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub ok: bool,
    pub message: String,
}

/// `POST /upload` body.
#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub url: String,
}

/// One element of the `GET /images-list` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageListEntry {
    pub filename: String,
    pub url: String,
}

/// `GET /image/{filename}` body.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub filename: String,
    pub size: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub modified_at: DateTime<Utc>,
    pub url: String,
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2024-05-01T10:20:30.123Z`.
fn serialize_millis<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn metadata_uses_camel_case_and_millisecond_timestamps() {
        let modified_at = Utc
            .timestamp_millis_opt(1_714_558_830_123)
            .single()
            .unwrap();
        let body = ImageMetadata {
            filename: "a-1.png".into(),
            size: 10,
            modified_at,
            url: "http://localhost/images/a-1.png".into(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["modifiedAt"], "2024-05-01T10:20:30.123Z");
        assert_eq!(json["size"], 10);
        assert!(json.get("modified_at").is_none());
    }

    #[test]
    fn validators_follow_size_and_mtime() {
        let image = StoredImage {
            filename: "a-1.png".into(),
            size_bytes: 255,
            modified_at: Utc.timestamp_millis_opt(1_714_558_830_123).single().unwrap(),
        };

        assert_eq!(image.etag(), "W/\"ff-18f33ab862b\"");
        assert_eq!(image.http_date(), "Wed, 01 May 2024 10:20:30 GMT");

        let grown = StoredImage { size_bytes: 256, ..image.clone() };
        assert_ne!(grown.etag(), image.etag());
    }
}

//! Data shapes of the image store.
//!
//! `StoredImage` is what the filesystem tells us about one stored file; the
//! remaining types are the JSON bodies returned by the HTTP routes.

pub mod image;

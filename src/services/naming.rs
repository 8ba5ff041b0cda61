//! Generated filenames for stored uploads.
//!
//! A generated name has the form `<base>-<millis><ext>` where `base` is the
//! client's original filename without directory components or extension and
//! with whitespace runs collapsed to `-`, `millis` is the current Unix time in
//! milliseconds, and `ext` is the original extension (`.png` when absent).

use chrono::Utc;

const DEFAULT_BASE: &str = "image";
const DEFAULT_EXTENSION: &str = ".png";

/// Generate a storage name for an upload using the current time.
pub fn generate_filename(original: Option<&str>) -> String {
    generate_filename_at(original, Utc::now().timestamp_millis())
}

/// Generate a storage name for an upload stamped with `millis`.
pub fn generate_filename_at(original: Option<&str>, millis: i64) -> String {
    let original = original.filter(|name| !name.is_empty());

    let (base, ext) = match original {
        Some(name) => {
            let segment = final_segment(name);
            let ext = extension(segment);
            let base = &segment[..segment.len() - ext.len()];
            (base, ext)
        }
        None => (DEFAULT_BASE, ""),
    };

    let ext = if ext.is_empty() { DEFAULT_EXTENSION } else { ext };
    format!("{}-{}{}", collapse_whitespace(base), millis, ext)
}

/// Last path segment of a client-supplied name. Trailing separators are ignored.
fn final_segment(name: &str) -> &str {
    let trimmed = name.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Extension including the dot, or `""`. A dot that opens the segment never starts one.
fn extension(segment: &str) -> &str {
    match segment.rfind('.') {
        None | Some(0) => "",
        Some(_) if segment == ".." => "",
        Some(idx) => &segment[idx..],
    }
}

fn collapse_whitespace(base: &str) -> String {
    let mut out = String::with_capacity(base.len());
    let mut in_space = false;
    for ch in base.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

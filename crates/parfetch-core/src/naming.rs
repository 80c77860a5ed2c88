//! Local filename derivation from the URL path.
//!
//! The filename is the last non-empty path segment of the parsed URL (query
//! and fragment stripped), sanitized for Linux filesystems. A URL with no
//! usable segment is rejected before any network I/O happens.

use crate::error::FetchError;

/// Derives the output filename for `url`.
///
/// # Examples
///
/// - `derive_filename("https://example.com/pics/cat.jpg")` → `"cat.jpg"`
/// - `derive_filename("https://example.com/file.zip?token=abc")` → `"file.zip"`
/// - `derive_filename("https://example.com/")` → `Err(InvalidFilename)`
pub fn derive_filename(url: &str) -> Result<String, FetchError> {
    let raw = last_path_segment(url)
        .ok_or_else(|| FetchError::InvalidFilename(url.to_string()))?;
    let sanitized = sanitize_filename(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(FetchError::InvalidFilename(url.to_string()));
    }
    Ok(sanitized)
}

/// Extracts the last non-empty path segment, or `None` if the URL cannot be
/// parsed or its path is empty/root.
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Sanitizes a candidate filename for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, whitespace, and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces, dots, and underscores
/// - Limits length to 255 bytes (NAME_MAX)
fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for c in name.chars() {
        let replaced = matches!(c, '\0' | '/' | '\\' | ' ' | '\t') || c.is_control();
        if replaced {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

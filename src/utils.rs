//! Utility functions for file naming and directory creation
//!
//! Every folder segment and file name derived from remote data goes through
//! one of the sanitizers here before it touches the file system.

use crate::error::Result;
use std::path::Path;

/// Replacement for characters that are not valid in file or folder names
const REPLACEMENT: char = '_';

/// Fallback name for media URLs without a usable last path segment
const DEFAULT_MEDIA_NAME: &str = "media";

fn is_invalid_name_char(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

/// Replace characters that are invalid in a file name with `_`
///
/// # Examples
///
/// ```
/// use content_export::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("Q&A: what/why?"), "Q&A_ what_why_");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_invalid_name_char(c) { REPLACEMENT } else { c })
        .collect()
}

/// Sanitize a single folder segment.
///
/// Uses the file name rules so a segment can never introduce a separator,
/// and additionally neutralizes `.`/`..` and trailing dots or spaces which
/// some platforms silently strip.
pub fn sanitize_path_segment(segment: &str) -> String {
    let sanitized = sanitize_file_name(segment.trim());
    match sanitized.as_str() {
        "" => String::new(),
        "." | ".." => sanitized.replace('.', "_"),
        _ => {
            let kept = sanitized.trim_end_matches(['.', ' ']);
            let stripped = sanitized.len() - kept.len();
            let mut out = kept.to_string();
            out.extend(std::iter::repeat_n(REPLACEMENT, stripped));
            out
        }
    }
}

/// Truncate `name` to at most `max_chars` characters
pub fn truncate_file_name(name: &str, max_chars: usize) -> &str {
    match name.char_indices().nth(max_chars) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

/// Derive a local file name from a media URL.
///
/// Takes the last non-empty path segment (percent-decoded and sanitized),
/// ignoring any query string or fragment. Relative URLs are accepted.
///
/// # Examples
///
/// ```
/// use content_export::utils::media_file_name;
///
/// assert_eq!(media_file_name("https://cdn.example.com/m/42/team%20photo.jpg?w=200"), "team photo.jpg");
/// assert_eq!(media_file_name("/media/7/logo.png"), "logo.png");
/// ```
pub fn media_file_name(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let last_segment = path.rsplit('/').find(|segment| !segment.is_empty());

    let name = match last_segment {
        Some(segment) => match urlencoding::decode(segment) {
            Ok(decoded) => sanitize_file_name(&decoded),
            Err(_) => sanitize_file_name(segment),
        },
        None => return DEFAULT_MEDIA_NAME.to_string(),
    };

    match name.trim() {
        "" | "." | ".." => DEFAULT_MEDIA_NAME.to_string(),
        _ => name,
    }
}

/// Create a directory and all its parents; succeeds if it already exists
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

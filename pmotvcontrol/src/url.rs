//! URL inspection: validation, decoder family, embedded start offset.

use crate::errors::{ControllerError, Result};
use crate::model::BackendKind;

const STREAM_SCHEMES: &[&str] = &["rtsp://", "rtsps://", "rtmp://", "rtmps://", "rtspt://"];
const STREAM_EXTENSIONS: &[&str] = &[".m3u8", ".m3u", ".mpd"];
const PROGRESSIVE_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mkv", ".mov", ".m4v", ".avi", ".mp3", ".ogg"];
const LIVESTREAM_HOSTS: &[&str] = &[
    "twitch.tv",
    "youtube.com/live",
    "vrcdn.live",
    "vrcdn.video",
    "stream.vrcdn",
    "topaz.chat",
];
const LONG_FORM_PATTERNS: &[&str] = &["youtube.com/", "youtu.be/", "/watch?"];
const OFFSET_KEYS: &[&str] = &["?t=", "&t=", "?start=", "&start="];

/// Rejects blank URLs and anything without a `scheme://` prefix.
pub fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ControllerError::EmptyUrl);
    }
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return Err(ControllerError::MalformedUrl(url.to_string()));
    };
    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok || rest.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(ControllerError::MalformedUrl(url.to_string()));
    }
    Ok(())
}

/// Path part of the URL, lowercased, without query or fragment.
fn lowercase_path(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_ascii_lowercase()
}

/// Decoder family implied by the URL pattern, or `None` when nothing is
/// recognized.
pub fn infer_backend_kind(url: &str) -> Option<BackendKind> {
    let lower = url.trim().to_ascii_lowercase();
    let path = lowercase_path(url.trim());

    if STREAM_SCHEMES.iter().any(|s| lower.starts_with(s))
        || STREAM_EXTENSIONS.iter().any(|e| path.ends_with(e))
        || LIVESTREAM_HOSTS.iter().any(|h| lower.contains(h))
    {
        return Some(BackendKind::Stream);
    }
    if PROGRESSIVE_EXTENSIONS.iter().any(|e| path.ends_with(e)) {
        return Some(BackendKind::Progressive);
    }
    None
}

/// Decoder family to load `url` with, and whether it was auto-selected.
///
/// A session override wins; otherwise the URL pattern decides, defaulting to
/// [`BackendKind::Progressive`].
pub fn resolve_backend_kind(url: &str, session_override: Option<BackendKind>) -> (BackendKind, bool) {
    match session_override {
        Some(kind) => (kind, false),
        None => (infer_backend_kind(url).unwrap_or_default(), true),
    }
}

/// Start offset (seconds) embedded in a long-form video URL.
///
/// The first key found among `?t=`, `&t=`, `?start=`, `&start=` (in that
/// order) is read; digits are taken up to the first non-digit. Anything
/// else yields 0.
pub fn parse_start_offset(url: &str) -> u64 {
    let lower = url.to_ascii_lowercase();
    if !LONG_FORM_PATTERNS.iter().any(|p| lower.contains(p)) {
        return 0;
    }
    for key in OFFSET_KEYS {
        if let Some(pos) = lower.find(key) {
            let digits: String = lower[pos + key.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            return digits.parse().unwrap_or(0);
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_parsing() {
        assert_eq!(parse_start_offset("https://www.youtube.com/watch?v=abc&t=90"), 90);
        assert_eq!(parse_start_offset("https://www.youtube.com/watch?v=abc"), 0);
        assert_eq!(parse_start_offset("https://www.youtube.com/watch?v=abc&start=12s"), 12);
        assert_eq!(parse_start_offset("https://youtu.be/abc?t=7"), 7);
        assert_eq!(parse_start_offset("https://youtu.be/abc?t=x"), 0);
        // Not a long-form pattern.
        assert_eq!(parse_start_offset("https://example.com/v.mp4?t=30"), 0);
    }

    #[test]
    fn test_offset_key_order() {
        assert_eq!(parse_start_offset("https://example.com/watch?start=5&x=1"), 5);
        // `&t=` is checked before `?start=`, whatever their position.
        assert_eq!(parse_start_offset("https://example.com/watch?start=5&t=9"), 9);
    }

    #[test]
    fn test_backend_kind_inference() {
        assert_eq!(infer_backend_kind("rtsp://cam.example.com/1"), Some(BackendKind::Stream));
        assert_eq!(
            infer_backend_kind("https://cdn.example.com/live/index.m3u8?token=1"),
            Some(BackendKind::Stream)
        );
        assert_eq!(infer_backend_kind("https://www.twitch.tv/someone"), Some(BackendKind::Stream));
        assert_eq!(
            infer_backend_kind("https://example.com/movie.MP4"),
            Some(BackendKind::Progressive)
        );
        assert_eq!(infer_backend_kind("https://example.com/page"), None);
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(
            resolve_backend_kind("https://example.com/a.mp4", Some(BackendKind::Stream)),
            (BackendKind::Stream, false)
        );
        assert_eq!(
            resolve_backend_kind("https://example.com/page", None),
            (BackendKind::Progressive, true)
        );
    }

    #[test]
    fn test_validation() {
        assert!(matches!(validate_url("  "), Err(ControllerError::EmptyUrl)));
        assert!(matches!(validate_url("not a url"), Err(ControllerError::MalformedUrl(_))));
        assert!(matches!(validate_url("https://"), Err(ControllerError::MalformedUrl(_))));
        assert!(validate_url("https://example.com/a.mp4").is_ok());
        assert!(validate_url("rtsp://cam/1").is_ok());
    }
}

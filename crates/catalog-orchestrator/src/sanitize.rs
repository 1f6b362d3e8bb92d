//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Media refs are usually pre-signed URLs; the query string carries the
//! signature and the path can identify the artisan. Spans only ever see the
//! redacted form produced here.

use reqwest::Url;

/// Keeps the scheme, host and final path segment of a media ref.
///
/// - `https://cdn.example.com/t/a7/photo.jpg?X-Sig=abc` → `https://cdn.example.com/…/photo.jpg`
/// - `https://user:pw@cdn.example.com/photo.jpg` → `https://cdn.example.com/…/photo.jpg`
/// - `uploads/a7/voice.ogg` → `…/voice.ogg`
pub fn redact_media_ref(media_ref: &str) -> String {
    match Url::parse(media_ref) {
        Ok(url) => {
            let last = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .unwrap_or("<root>");
            match url.host_str() {
                Some(host) => format!("{}://{}/…/{}", url.scheme(), host, last),
                None => format!("{}:…/{}", url.scheme(), last),
            }
        }
        Err(_) => {
            let without_query = media_ref.split(['?', '#']).next().unwrap_or_default();
            match without_query.rsplit('/').next().filter(|s| !s.is_empty()) {
                Some(last) => format!("…/{}", last),
                None => "<unknown>".to_string(),
            }
        }
    }
}

/// Optional variant for span fields.
pub fn redact_optional(media_ref: Option<&str>) -> String {
    media_ref
        .map(redact_media_ref)
        .unwrap_or_else(|| "-".to_string())
}

//! Origin classification of network responses.
//!
//! ### Rules
//! - Final URL on the application origin: `basic`
//! - Cross-origin with an `Access-Control-Allow-Origin` header granting the
//!   application origin (or `*`): `cors`
//! - Any other cross-origin response: `opaque`

use pwa_cache_core::ResponseType;
use pwa_cache_core::url::same_origin;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap};
use url::Url;

/// Classify a response served from `final_url` for a page on `origin`.
pub fn classify(origin: &Url, final_url: &Url, headers: &HeaderMap) -> ResponseType {
    if same_origin(origin, final_url) {
        return ResponseType::Basic;
    }

    let allowed = headers
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match allowed {
        Some("*") => ResponseType::Cors,
        Some(value) if value.trim_end_matches('/') == origin.origin().ascii_serialization() => ResponseType::Cors,
        _ => ResponseType::Opaque,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_same_origin_is_basic() {
        let url = Url::parse("http://localhost:8080/static/sw.js").unwrap();
        assert_eq!(classify(&origin(), &url, &HeaderMap::new()), ResponseType::Basic);
    }

    #[test]
    fn test_cross_origin_without_cors_is_opaque() {
        let url = Url::parse("https://cdn.jsdelivr.net/npm/bootstrap.min.css").unwrap();
        assert_eq!(classify(&origin(), &url, &HeaderMap::new()), ResponseType::Opaque);
    }

    #[test]
    fn test_cross_origin_wildcard_is_cors() {
        let url = Url::parse("https://cdnjs.cloudflare.com/all.min.css").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        assert_eq!(classify(&origin(), &url, &headers), ResponseType::Cors);
    }

    #[test]
    fn test_cross_origin_matching_grant_is_cors() {
        let url = Url::parse("https://api.example.com/rate").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("http://localhost:8080"));
        assert_eq!(classify(&origin(), &url, &headers), ResponseType::Cors);

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://elsewhere.example"));
        assert_eq!(classify(&origin(), &url, &headers), ResponseType::Opaque);
    }

    #[test]
    fn test_different_port_is_cross_origin() {
        let url = Url::parse("http://localhost:9090/").unwrap();
        assert_eq!(classify(&origin(), &url, &HeaderMap::new()), ResponseType::Opaque);
    }
}

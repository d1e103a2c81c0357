use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

const DEFAULT_ORIGINS: &str = "http://localhost:3000";

/// Build a CORS layer from the `METEOTRIP_CORS_ORIGINS` env var.
///
/// - Origins: comma-separated list (default: `http://localhost:3000`)
/// - Methods: GET, POST, DELETE, OPTIONS
/// - Headers: Authorization, Content-Type
/// - Max age: 3600s
pub fn build_cors_layer() -> CorsLayer {
    let origins_str =
        std::env::var("METEOTRIP_CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_ORIGINS.to_string());

    CorsLayer::new()
        .allow_origin(parse_origins(&origins_str))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

fn parse_origins(origins: &str) -> Vec<HeaderValue> {
    let mut seen: Vec<String> = Vec::new();
    for origin in origins.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let origin = origin.trim_end_matches('/');
        if !seen.iter().any(|existing| existing.eq_ignore_ascii_case(origin)) {
            seen.push(origin.to_string());
        }
    }
    seen.into_iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
}

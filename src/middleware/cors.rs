use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer. Credentials are only enabled for a single explicit
/// origin; a wildcard cannot be combined with credentials.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let wildcard = origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");
    let layer = CorsLayer::new().allow_methods(ALLOWED_METHODS);

    if wildcard {
        return layer.allow_origin(Any).allow_headers(Any);
    }

    let layer = layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT_LANGUAGE]);

    if config.allow_credentials() {
        layer.allow_credentials(true)
    } else {
        layer
    }
}

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::time::Instant;

const BODY_BUFFER_LIMIT: usize = 1024 * 1024;
const BODY_LOG_LIMIT: usize = 10 * 1024;
const MASK: &str = "***";
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "key", "credential"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogSettings {
    pub body_logging: bool,
}

/// Access log: one line per request, level chosen by response status.
///
/// With body logging enabled the request and response bodies are buffered
/// (up to 1MB), sensitive JSON fields masked and the logged text truncated.
pub async fn logging_middleware(
    State(settings): State<AccessLogSettings>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    if !settings.body_logging {
        let response = next.run(request).await;
        log_access(
            &request_id,
            &method,
            &uri,
            response.status(),
            start,
            None,
            None,
        );
        return response;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, BODY_BUFFER_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read request body: {}", e);
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };
    let request_body = loggable_body(&bytes);
    let request = Request::from_parts(parts, Body::from(bytes));

    let response = next.run(request).await;
    let status = response.status();
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, BODY_BUFFER_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
            Bytes::new()
        }
    };
    let response_body = loggable_body(&bytes);

    log_access(
        &request_id,
        &method,
        &uri,
        status,
        start,
        Some(&request_body),
        Some(&response_body),
    );

    Response::from_parts(parts, Body::from(bytes))
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

fn log_access(
    request_id: &str,
    method: &axum::http::Method,
    uri: &axum::http::Uri,
    status: StatusCode,
    start: Instant,
    request_body: Option<&str>,
    response_body: Option<&str>,
) {
    let latency_ms = start.elapsed().as_millis();
    let status = status.as_u16();
    let request_body = request_body.unwrap_or_default();
    let response_body = response_body.unwrap_or_default();

    macro_rules! access {
        ($level:ident) => {
            tracing::$level!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status,
                latency_ms = %latency_ms,
                request_body = %request_body,
                response_body = %response_body,
                "access"
            )
        };
    }

    match status {
        400.. => access!(error),
        300..=399 => access!(warn),
        _ => access!(info),
    }
}

/// Mask sensitive fields when the body is JSON, then truncate.
fn loggable_body(bytes: &Bytes) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let text = match serde_json::from_slice::<Value>(bytes) {
        Ok(mut json) => {
            mask_sensitive(&mut json);
            json.to_string()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };
    truncate_body(&text, BODY_LOG_LIMIT)
}

fn mask_sensitive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                let lower = key.to_lowercase();
                if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                    *value = Value::String(MASK.to_string());
                } else {
                    mask_sensitive(value);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_sensitive),
        _ => {}
    }
}

/// Truncate body for logging, adding ellipsis if truncated
fn truncate_body(body: &str, max_len: usize) -> String {
    let body = body.trim();
    if body.len() <= max_len {
        return body.to_string();
    }
    let mut end = max_len;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated, {} bytes total]", &body[..end], body.len())
}

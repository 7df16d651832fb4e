use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::any::Any;

use crate::{error::RenderedError, models::common::ErrorResponse};

const INTERNAL_MESSAGE: &str = "An internal error occurred";
const REJECTION_BODY_LIMIT: usize = 64 * 1024;

/// Wrap error responses that did not come from an `ApiError` (unknown routes,
/// wrong methods, extractor rejections) in the error envelope.
pub async fn render_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if status.as_u16() < 400 || response.extensions().get::<RenderedError>().is_some() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let message = if status.is_server_error() {
        INTERNAL_MESSAGE.to_string()
    } else {
        let text = to_bytes(body, REJECTION_BODY_LIMIT)
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            default_message(status)
        } else {
            text
        }
    };

    let envelope = ErrorResponse::new(status, code_for(status), message, None);
    let bytes = match serde_json::to_vec(&envelope) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("failed to encode error envelope: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    parts.extensions.insert(RenderedError);
    Response::from_parts(parts, Body::from(bytes))
}

/// Panic handler for `CatchPanicLayer::custom`: log the payload, answer with a generic 500.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "handler panicked");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let envelope = ErrorResponse::new(status, code_for(status), INTERNAL_MESSAGE, None);
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response.extensions_mut().insert(RenderedError);
    response
}

fn code_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "bad_request",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::METHOD_NOT_ALLOWED => "method_not_allowed",
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        StatusCode::UNPROCESSABLE_ENTITY => "validation_failed",
        StatusCode::SERVICE_UNAVAILABLE => "service_unavailable",
        s if s.is_server_error() => "internal_server_error",
        _ => "error",
    }
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::{sync::Arc, time::Instant};

use crate::telemetry::{Telemetry, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Count requests and observe latency, labelled by status class.
pub async fn metrics_middleware(
    State(telemetry): State<Arc<dyn Telemetry>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    let labels = [("status", status_class(response.status()).to_string())];
    telemetry.increment(HTTP_REQUESTS_TOTAL, &labels);
    telemetry.record_duration(
        HTTP_REQUEST_DURATION_SECONDS,
        start.elapsed().as_secs_f64(),
        &labels,
    );

    response
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(StatusCode::CREATED), "2xx");
        assert_eq!(status_class(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_class(StatusCode::SERVICE_UNAVAILABLE), "5xx");
    }
}

use serde::Serialize;
use time::OffsetDateTime;

/// Body of the liveness and readiness probes
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HealthStatus {
    pub fn new(status: &'static str, message: &'static str) -> Self {
        Self {
            status,
            message,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

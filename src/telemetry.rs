//! Metrics façade.
//!
//! Call sites always hold an `Arc<dyn Telemetry>`. When metrics are disabled the
//! [`NoopTelemetry`] implementation is installed, so nothing downstream branches
//! on configuration.

use metrics::{Counter, Histogram, Key, Label, Level, Metadata, Recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use crate::{config::TelemetryConfig, error::ApiError};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const ERRORS_TOTAL: &str = "errors_total";

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

pub trait Telemetry: Send + Sync {
    /// Add one to the counter `name` with the given labels.
    fn increment(&self, name: &str, labels: &[(&'static str, String)]);

    /// Observe a duration, in seconds, on the histogram `name`.
    fn record_duration(&self, name: &str, seconds: f64, labels: &[(&'static str, String)]);

    /// Count an error against an operation.
    fn record_error(&self, operation: &str, error: &(dyn std::error::Error + 'static)) {
        tracing::debug!(operation, error = %error, "recording error");
        self.increment(ERRORS_TOTAL, &[("operation", operation.to_string())]);
    }

    /// Prometheus text exposition, or `None` when metrics are disabled.
    fn render_metrics(&self) -> Option<String>;
}

/// Pick the implementation once, from configuration.
pub fn build(config: &TelemetryConfig) -> Arc<dyn Telemetry> {
    if config.metrics_active() {
        Arc::new(PrometheusTelemetry::new())
    } else {
        Arc::new(NoopTelemetry)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn increment(&self, _name: &str, _labels: &[(&'static str, String)]) {}

    fn record_duration(&self, _name: &str, _seconds: f64, _labels: &[(&'static str, String)]) {}

    fn render_metrics(&self) -> Option<String> {
        None
    }
}

/// Prometheus-backed telemetry with a lazily filled handle cache.
///
/// The recorder is owned locally rather than installed globally, so several
/// instances can coexist (tests build one per router).
pub struct PrometheusTelemetry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    counters: Mutex<HashMap<Key, Counter>>,
    histograms: Mutex<HashMap<Key, Histogram>>,
}

impl PrometheusTelemetry {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let telemetry = Self {
            recorder,
            handle,
            counters: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        };

        // Pre-seed the request metrics every route touches
        for status in ["2xx", "4xx", "5xx"] {
            let labels = [("status", status.to_string())];
            telemetry.counter(HTTP_REQUESTS_TOTAL, &labels);
            telemetry.histogram(HTTP_REQUEST_DURATION_SECONDS, &labels);
        }

        telemetry
    }

    fn key(name: &str, labels: &[(&'static str, String)]) -> Key {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(k, v)| Label::new(*k, v.clone()))
            .collect();
        Key::from_parts(name.to_string(), labels)
    }

    fn counter(&self, name: &str, labels: &[(&'static str, String)]) -> Counter {
        let key = Self::key(name, labels);
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(key)
            .or_insert_with_key(|key| self.recorder.register_counter(key, &METADATA))
            .clone()
    }

    fn histogram(&self, name: &str, labels: &[(&'static str, String)]) -> Histogram {
        let key = Self::key(name, labels);
        let mut histograms = self
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        histograms
            .entry(key)
            .or_insert_with_key(|key| self.recorder.register_histogram(key, &METADATA))
            .clone()
    }
}

impl Default for PrometheusTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry for PrometheusTelemetry {
    fn increment(&self, name: &str, labels: &[(&'static str, String)]) {
        self.counter(name, labels).increment(1);
    }

    fn record_duration(&self, name: &str, seconds: f64, labels: &[(&'static str, String)]) {
        self.histogram(name, labels).record(seconds);
    }

    fn render_metrics(&self) -> Option<String> {
        Some(self.handle.render())
    }
}

/// Result class of a service operation, used as the `status` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFound,
    Forbidden,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NotFound => "not_found",
            Outcome::Forbidden => "forbidden",
            Outcome::Error => "error",
        }
    }

    pub fn of<T>(result: &Result<T, ApiError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(ApiError::NotFound(_)) => Outcome::NotFound,
            Err(ApiError::Forbidden(_)) => Outcome::Forbidden,
            Err(_) => Outcome::Error,
        }
    }
}

/// Times one service operation and records `<name>_total` and
/// `<name>_duration_seconds` when it finishes.
pub struct Operation<'a> {
    telemetry: &'a dyn Telemetry,
    name: &'static str,
    started: Instant,
}

impl<'a> Operation<'a> {
    pub fn start(telemetry: &'a dyn Telemetry, name: &'static str) -> Self {
        Self {
            telemetry,
            name,
            started: Instant::now(),
        }
    }

    /// Record the outcome of `result` and hand it back unchanged.
    pub fn finish<T>(self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        let outcome = Outcome::of(&result);
        let labels = [("status", outcome.as_str().to_string())];

        self.telemetry
            .increment(&format!("{}_total", self.name), &labels);
        self.telemetry.record_duration(
            &format!("{}_duration_seconds", self.name),
            self.started.elapsed().as_secs_f64(),
            &labels,
        );
        if let (Outcome::Error, Err(e)) = (outcome, &result) {
            self.telemetry.record_error(self.name, e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_renders_nothing() {
        let telemetry = NoopTelemetry;
        telemetry.increment("anything_total", &[]);
        assert!(telemetry.render_metrics().is_none());
    }

    #[test]
    fn test_counters_are_created_once_and_reused() {
        let telemetry = PrometheusTelemetry::new();
        let labels = [("status", "success".to_string())];

        telemetry.increment("task_get_total", &labels);
        telemetry.increment("task_get_total", &labels);

        assert_eq!(
            telemetry.counters.lock().unwrap().keys().filter(|k| k.name() == "task_get_total").count(),
            1
        );
        let rendered = telemetry.render_metrics().unwrap();
        assert!(rendered.contains("task_get_total{status=\"success\"} 2"));
    }

    #[test]
    fn test_http_metrics_are_preseeded() {
        let telemetry = PrometheusTelemetry::new();
        let rendered = telemetry.render_metrics().unwrap();
        assert!(rendered.contains(HTTP_REQUESTS_TOTAL));
    }

    #[test]
    fn test_operation_labels_outcome() {
        let telemetry = PrometheusTelemetry::new();

        let op = Operation::start(&telemetry, "task_delete");
        let result: Result<(), ApiError> = op.finish(Err(ApiError::Forbidden("nope".into())));
        assert!(result.is_err());

        let op = Operation::start(&telemetry, "task_delete");
        let _ = op.finish(Ok(()));

        let rendered = telemetry.render_metrics().unwrap();
        assert!(rendered.contains("task_delete_total{status=\"forbidden\"} 1"));
        assert!(rendered.contains("task_delete_total{status=\"success\"} 1"));
        assert!(rendered.contains("task_delete_duration_seconds"));
    }

    #[test]
    fn test_internal_errors_are_counted() {
        let telemetry = PrometheusTelemetry::new();

        let op = Operation::start(&telemetry, "todo_create");
        let _ = op.finish::<()>(Err(ApiError::Internal(anyhow::anyhow!("boom"))));

        let rendered = telemetry.render_metrics().unwrap();
        assert!(rendered.contains("errors_total{operation=\"todo_create\"} 1"));
    }
}

//! Tracing subscriber setup, with optional OTLP span export.

use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer as _};

use crate::config::TelemetryConfig;

/// Log output format, selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            other => {
                eprintln!("WARNING: unknown LOG_FORMAT={other:?}, falling back to pretty");
                Self::Pretty
            }
        }
    }

    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(val) => Self::parse(&val),
            Err(_) => Self::default(),
        }
    }
}

/// Keeps the tracer provider alive; flushes pending spans on drop.
#[must_use]
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` controls the filter (default `info,service_template=debug`).
/// Spans are exported over OTLP/HTTP only when telemetry and tracing are both
/// enabled and an endpoint is configured.
pub fn init_tracing(format: LogFormat, telemetry: Option<&TelemetryConfig>) -> TracingGuard {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,service_template=debug".into());

    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    let provider = telemetry
        .filter(|t| t.tracing_active())
        .and_then(|t| match tracer_provider(t) {
            Ok(provider) => Some((provider, t.service_name.clone())),
            Err(e) => {
                eprintln!("WARNING: OTLP exporter disabled: {e:#}");
                None
            }
        });

    let otel_layer = provider
        .as_ref()
        .map(|(provider, name)| tracing_opentelemetry::layer().with_tracer(provider.tracer(name.clone())));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(fmt_layer)
        .init();

    TracingGuard {
        provider: provider.map(|(provider, _)| provider),
    }
}

fn tracer_provider(config: &TelemetryConfig) -> anyhow::Result<SdkTracerProvider> {
    let endpoint = config
        .otlp_endpoint
        .as_deref()
        .map(traces_endpoint)
        .ok_or_else(|| anyhow::anyhow!("OTEL_EXPORTER_OTLP_ENDPOINT is not set"))?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Normalize `host:port` or a bare collector URL to the OTLP/HTTP traces path.
fn traces_endpoint(raw: &str) -> String {
    let base = if raw.contains("://") {
        raw.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", raw.trim_end_matches('/'))
    };

    if base.ends_with("/v1/traces") {
        base
    } else {
        format!("{base}/v1/traces")
    }
}

use crate::{Environment, logging};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Owns the OTLP tracer and meter providers; flushes and shuts them down on drop.
///
/// Must be created inside a Tokio runtime (the exporters are async) and the
/// runtime must outlive the guard.
///
/// # Example
/// ```ignore
/// let _telemetry = TelemetryGuard::init("alpr-node", "http://localhost:4317", Environment::Production)?;
/// ```
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Export traces and metrics to `endpoint`, then install the log subscriber
    /// with `tracing` spans bridged into the tracer.
    pub fn init(
        service_name: &str,
        endpoint: &str,
        environment: Environment,
    ) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = service_resource(service_name, environment);

        let tracer_provider = tracer_provider(endpoint, resource.clone())?;
        global::set_tracer_provider(tracer_provider.clone());

        let meter_provider = meter_provider(endpoint, resource)?;
        global::set_meter_provider(meter_provider.clone());

        let tracer = global::tracer(service_name.to_string());
        logging::install(environment, tracing_opentelemetry::layer().with_tracer(tracer));

        tracing::info!(
            endpoint,
            export_interval_s = METRIC_EXPORT_INTERVAL.as_secs(),
            "OTLP telemetry enabled"
        );

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

fn service_resource(service_name: &str, environment: Environment) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, service_name.to_string()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new("deployment.environment", environment.as_str()),
        ])
        .build()
}

fn tracer_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_batch_exporter(exporter)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // The subscriber may already be gone here, so report on stderr.
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Tracer provider shutdown failed: {e:?}");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("Meter provider shutdown failed: {e:?}");
        }
    }
}

/// Enters an info-level span; extra `tracing` fields may follow the name.
#[macro_export]
macro_rules! span {
    ($name:literal $(, $($fields:tt)+)?) => {
        tracing::info_span!($name $(, $($fields)+)?).entered()
    };
}

/// Enters a debug-level span; extra `tracing` fields may follow the name.
#[macro_export]
macro_rules! span_debug {
    ($name:literal $(, $($fields:tt)+)?) => {
        tracing::debug_span!($name $(, $($fields)+)?).entered()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_carries_service_identity() {
        let resource = service_resource("alpr-node", Environment::Production);

        let value = |key: &str| {
            resource
                .iter()
                .find(|(k, _)| k.as_str() == key)
                .map(|(_, v)| v.to_string())
        };

        assert_eq!(value(SERVICE_NAME).as_deref(), Some("alpr-node"));
        assert_eq!(
            value("deployment.environment").as_deref(),
            Some("production")
        );
    }

    #[test]
    fn test_span_macros_accept_fields() {
        let sequence = 7u64;
        let _plain = crate::span!("plain");
        let _with_fields = crate::span_debug!("with_fields", sequence, kind = "test");
    }
}

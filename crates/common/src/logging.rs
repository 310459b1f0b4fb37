use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Subscriber stack every binary shares, below the OpenTelemetry layer.
pub(crate) type BaseSubscriber = Layered<EnvFilter, Registry>;

/// Initialize tracing with pretty output in development and JSON in production.
///
/// Filtering comes from `RUST_LOG` (defaults to "info"). The OpenTelemetry
/// layer is always installed; it is a no-op until a global tracer provider
/// exists (see [`crate::TelemetryGuard`]).
pub fn setup_logging(environment: Environment) {
    install(environment, tracing_opentelemetry::layer());
}

pub(crate) fn install<L>(environment: Environment, otel_layer: L)
where
    L: Layer<BaseSubscriber> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    let result = match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_target(false),
            )
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

use alpr::{
    AlprConfig, AlprService, Pipeline, PreviewWindow, ResultPublisher,
    backend::ort::OrtAlprBackend, logging::setup_logging,
};
use anyhow::Context;
use bus::MqttBus;
use common::TelemetryGuard;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let config = AlprConfig::from_env()?;

    // TelemetryGuard requires a Tokio runtime for async OTLP exporters; keep it
    // alive until the guard has flushed. Without telemetry, plain logging.
    let (_telemetry, _runtime) = if let Some(endpoint) = config.otel_endpoint.as_ref() {
        let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        let guard =
            rt.block_on(async { TelemetryGuard::init("alpr-node", endpoint, config.environment) })?;
        (Some(guard), Some(rt))
    } else {
        setup_logging(&config);
        (None, None)
    };

    tracing::info!(config = ?config, "Loaded configuration");

    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    tracing::info!("Loading ALPR models");
    let backend = OrtAlprBackend::load(&config.model)
        .context("Failed to load ALPR models - check MODEL_DIR")?;
    tracing::info!("Models loaded successfully");

    let preview = if config.preview.enabled {
        Some(PreviewWindow::open(&config.preview).context("Failed to open preview window")?)
    } else {
        tracing::info!("Preview disabled");
        None
    };

    let (bus, inbound) = MqttBus::connect(&config.bus, &config.image_topic, config.queue_depth)
        .context("Failed to create MQTT client")?;
    let bus = Arc::new(bus);

    let publisher = ResultPublisher::new(Arc::clone(&bus), config.plate_topic.clone());
    let pipeline = Pipeline::new(backend, preview, publisher);
    let mut service = AlprService::new(pipeline, &config);

    let result = service.run(inbound, &shutdown);

    bus.disconnect();
    drop(service);

    match result {
        Ok(stats) => {
            tracing::info!(stats = ?stats, "Shutting down");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "ALPR service failed");
            Err(e)
        }
    }
}

use crate::{
    adapter::Predictor,
    config::AlprConfig,
    pipeline::{PassOutcome, Pipeline},
    preview::Previewer,
};
use bus::{InboundMessage, Publish};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
    },
    time::{Duration, Instant},
};

const STATUS_EVERY_FRAMES: u64 = 30;

/// Totals over the lifetime of a service run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub frames_received: u64,
    pub frames_skipped: u64,
    pub inference_failures: u64,
    pub plates_published: u64,
    pub preview_failures: u64,
}

struct Metrics {
    pass_duration: Histogram<f64>,
    frames: Counter<u64>,
    skipped: Counter<u64>,
    inference_failures: Counter<u64>,
    plates_published: Counter<u64>,
    preview_failures: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> Metrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0, 2.0,
    ];

    Metrics {
        pass_duration: meter
            .f64_histogram("alpr_pass_duration_seconds")
            .with_description("Time to process a single frame (decode to display)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        frames: meter
            .u64_counter("alpr_frames_total")
            .with_description("Total frames received")
            .build(),
        skipped: meter
            .u64_counter("alpr_frames_skipped_total")
            .with_description("Total frames skipped because they could not be decoded")
            .build(),
        inference_failures: meter
            .u64_counter("alpr_inference_failures_total")
            .with_description("Total passes where the model failed")
            .build(),
        plates_published: meter
            .u64_counter("alpr_plates_published_total")
            .with_description("Total plate texts handed to the transport")
            .build(),
        preview_failures: meter
            .u64_counter("alpr_preview_failures_total")
            .with_description("Total frames the preview could not show")
            .build(),
    }
}

/// Drains the inbound queue on the calling thread, one pass per message.
pub struct AlprService<P, V, T> {
    pipeline: Pipeline<P, V, T>,
    poll_interval: Duration,
}

impl<P, V, T> AlprService<P, V, T>
where
    P: Predictor,
    V: Previewer,
    T: Publish,
{
    pub fn new(pipeline: Pipeline<P, V, T>, config: &AlprConfig) -> Self {
        Self {
            pipeline,
            poll_interval: config.poll_interval(),
        }
    }

    /// Runs until `shutdown` is raised or every sender of `inbound` is gone.
    pub fn run(
        &mut self,
        inbound: Receiver<InboundMessage>,
        shutdown: &AtomicBool,
    ) -> anyhow::Result<ServiceStats> {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "ALPR service starting"
        );

        let metrics = init_metrics("alpr");
        let mut stats = ServiceStats::default();

        while !shutdown.load(Ordering::Relaxed) {
            let message = match inbound.recv_timeout(self.poll_interval) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Inbound queue closed");
                    break;
                }
            };

            let start = Instant::now();
            let outcome = self.pipeline.process(message.sequence, &message.payload);
            metrics
                .pass_duration
                .record(start.elapsed().as_secs_f64(), &[]);

            stats.frames_received += 1;
            metrics.frames.add(1, &[]);
            record(&outcome, &mut stats, &metrics);

            if stats.frames_received.is_multiple_of(STATUS_EVERY_FRAMES) {
                tracing::debug!(
                    last_sequence = outcome.sequence(),
                    frames_received = stats.frames_received,
                    frames_skipped = stats.frames_skipped,
                    inference_failures = stats.inference_failures,
                    plates_published = stats.plates_published,
                    preview_failures = stats.preview_failures,
                    "Service status"
                );
            }
        }

        tracing::info!(
            frames_received = stats.frames_received,
            plates_published = stats.plates_published,
            "ALPR service stopped"
        );

        Ok(stats)
    }
}

fn record(outcome: &PassOutcome, stats: &mut ServiceStats, metrics: &Metrics) {
    match outcome {
        PassOutcome::Skipped { .. } => {
            stats.frames_skipped += 1;
            metrics.skipped.add(1, &[]);
        }
        PassOutcome::Completed(report) => {
            if report.inference_failed {
                stats.inference_failures += 1;
                metrics.inference_failures.add(1, &[]);
            }
            if report.published.is_some() {
                stats.plates_published += 1;
                metrics.plates_published.add(1, &[]);
            }
            if report.preview_failed {
                stats.preview_failures += 1;
                metrics.preview_failures.add(1, &[]);
            }
        }
    }
}

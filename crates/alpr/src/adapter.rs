use crate::{
    detection::{BoundingBox, Detection},
    error::InferenceError,
    frame::Frame,
};
use common::span;
use std::panic::{self, AssertUnwindSafe};

/// A license plate recognizer: plate detector plus OCR, taken as one unit.
///
/// Implementations return candidates best first. Regions and confidences are
/// normalized by [`InferenceAdapter`], so implementations may return raw
/// model coordinates.
pub trait Predictor {
    fn predict(&mut self, frame: &Frame) -> anyhow::Result<Vec<Detection>>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&mut self, frame: &Frame) -> anyhow::Result<Vec<Detection>> {
        (**self).predict(frame)
    }
}

/// Calls the predictor and turns its output into well-formed detections.
///
/// Model errors and panics are both reported as [`InferenceError`], so a
/// misbehaving model cannot take the node down.
pub struct InferenceAdapter<P> {
    predictor: P,
}

impl<P: Predictor> InferenceAdapter<P> {
    pub fn new(predictor: P) -> Self {
        Self { predictor }
    }

    pub fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        let _s = span!("predict", sequence = frame.sequence);

        let predictor = &mut self.predictor;
        let raw = panic::catch_unwind(AssertUnwindSafe(|| predictor.predict(frame)))
            .map_err(|payload| InferenceError::Panicked(panic_message(payload.as_ref())))?
            .map_err(InferenceError::Model)?;

        let (width, height) = (frame.width(), frame.height());
        let detections = raw
            .into_iter()
            .map(|d| normalize(d, width, height))
            .collect::<Vec<_>>();

        tracing::debug!(
            sequence = frame.sequence,
            count = detections.len(),
            "Inference complete"
        );

        Ok(detections)
    }
}

fn normalize(detection: Detection, width: u32, height: u32) -> Detection {
    let r = detection.region;
    let region = BoundingBox::new(r.x1, r.y1, r.x2, r.y2).clamp_to(width, height);
    let confidence = detection
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0));

    Detection {
        text: detection.text,
        confidence,
        region,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

use crate::{
    adapter::{InferenceAdapter, Predictor},
    annotator::annotate,
    decoder::decode_payload,
    detection::Detection,
    error::DecodeError,
    preview::Previewer,
    publisher::ResultPublisher,
};
use bus::Publish;
use common::span;

/// Where a pass is. `Done` is terminal; a decode failure jumps straight to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Received,
    Decoded,
    Inferred,
    Annotated,
    Published,
    Displayed,
    Done,
}

impl PassState {
    pub fn can_advance_to(self, next: PassState) -> bool {
        use PassState::*;
        matches!(
            (self, next),
            (Received, Decoded)
                | (Received, Done)
                | (Decoded, Inferred)
                | (Inferred, Annotated)
                | (Annotated, Published)
                | (Published, Displayed)
                | (Displayed, Done)
        )
    }

    fn advance(&mut self, next: PassState) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid pass transition {:?} -> {:?}",
            self,
            next
        );
        *self = next;
    }
}

/// What one pass did.
#[derive(Debug)]
pub enum PassOutcome {
    /// The message could not be decoded; nothing else ran.
    Skipped { sequence: u64, error: DecodeError },
    Completed(PassReport),
}

impl PassOutcome {
    pub fn sequence(&self) -> u64 {
        match self {
            PassOutcome::Skipped { sequence, .. } => *sequence,
            PassOutcome::Completed(report) => report.sequence,
        }
    }

    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
    /// Text handed to the transport, if any.
    pub published: Option<String>,
    pub inference_failed: bool,
    pub preview_failed: bool,
}

/// Runs one pass per inbound message: decode, predict, annotate, publish,
/// show. No failure inside a pass escapes it.
pub struct Pipeline<P, V, T> {
    adapter: InferenceAdapter<P>,
    previewer: V,
    publisher: ResultPublisher<T>,
}

impl<P, V, T> Pipeline<P, V, T>
where
    P: Predictor,
    V: Previewer,
    T: Publish,
{
    pub fn new(predictor: P, previewer: V, publisher: ResultPublisher<T>) -> Self {
        Self {
            adapter: InferenceAdapter::new(predictor),
            previewer,
            publisher,
        }
    }

    pub fn process(&mut self, sequence: u64, payload: &[u8]) -> PassOutcome {
        let _s = span!("pass", sequence);
        let mut state = PassState::Received;
        tracing::info!(sequence, bytes = payload.len(), "Received an image frame");

        let frame = match decode_payload(sequence, payload) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(sequence, error = %error, "Failed to decode frame, skipping");
                state.advance(PassState::Done);
                return PassOutcome::Skipped { sequence, error };
            }
        };
        state.advance(PassState::Decoded);

        let (detections, inference_failed) = match self.adapter.predict(&frame) {
            Ok(detections) => (detections, false),
            Err(e) => {
                tracing::error!(
                    sequence,
                    frame_id = %frame.frame_id,
                    error = %e,
                    "Inference failed, continuing without detections"
                );
                (Vec::new(), true)
            }
        };
        state.advance(PassState::Inferred);

        let annotated = annotate(&frame, &detections);
        state.advance(PassState::Annotated);

        let published = self.publisher.publish(&detections).map(str::to_string);
        state.advance(PassState::Published);

        let preview_failed = match self.previewer.show(&annotated) {
            Ok(()) => false,
            Err(e) => {
                tracing::warn!(sequence, error = %e, "Failed to show preview frame");
                true
            }
        };
        state.advance(PassState::Displayed);

        state.advance(PassState::Done);

        PassOutcome::Completed(PassReport {
            sequence,
            width: frame.width(),
            height: frame.height(),
            detections,
            published,
            inference_failed,
            preview_failed,
        })
    }
}

use crate::detection::Detection;
use bus::Publish;

/// Forwards the best plate of each pass to the outbound topic.
pub struct ResultPublisher<T> {
    transport: T,
    topic: String,
}

impl<T: Publish> ResultPublisher<T> {
    pub fn new(transport: T, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    /// Publish `detections[0].text`, if any. Transport failures are logged and
    /// swallowed; returns the text only when it was handed to the transport.
    pub fn publish<'a>(&self, detections: &'a [Detection]) -> Option<&'a str> {
        let best = detections.first()?;

        match self.transport.publish(&self.topic, best.text.as_bytes()) {
            Ok(()) => {
                tracing::info!(
                    plate = %best.text,
                    confidence = ?best.confidence,
                    "Detected license plate"
                );
                Some(best.text.as_str())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    topic = %self.topic,
                    plate = %best.text,
                    "Failed to publish plate"
                );
                None
            }
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

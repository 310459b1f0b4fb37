pub mod errors;
pub mod message;
pub mod mqtt;

pub use errors::BusError;
pub use message::{Header, ImageMessage, InboundMessage, Stamp};
pub use mqtt::{BusConfig, MqttBus, validate_topic};

/// Outbound half of the messaging bus.
///
/// Implementations hand the payload to the transport and return; delivery is
/// the transport's concern.
pub trait Publish {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;
}

impl<T: Publish + ?Sized> Publish for std::sync::Arc<T> {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        (**self).publish(topic, payload)
    }
}

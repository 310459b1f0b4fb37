use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("Inbound queue depth must be at least 1")]
    ZeroQueueDepth,

    #[error("Failed to start MQTT event loop: {0}")]
    EventLoop(#[from] std::io::Error),
}

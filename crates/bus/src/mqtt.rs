use crate::{BusError, InboundMessage, Publish};
use opentelemetry::{global, metrics::Counter};
use rumqttc::{Client, Connection, ConnectionError, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::time::Duration;

/// Request channel capacity between the client handle and its event loop.
const CLIENT_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// Upper bound for a single MQTT packet in either direction. Raw frames
    /// are large, so this has to be well above the MQTT default.
    pub max_packet_bytes: usize,
    pub keep_alive: Duration,
}

/// MQTT connection with a single image subscription feeding a bounded queue.
///
/// The event loop runs on its own thread and only enqueues raw payloads; when
/// the queue is full the newest message is dropped.
pub struct MqttBus {
    client: Client,
    subscription: String,
    connected: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl MqttBus {
    pub fn connect(
        config: &BusConfig,
        subscription: &str,
        queue_depth: usize,
    ) -> Result<(Self, Receiver<InboundMessage>), BusError> {
        validate_topic(subscription)?;
        if queue_depth == 0 {
            return Err(BusError::ZeroQueueDepth);
        }

        let mut mqtt_options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        mqtt_options.set_keep_alive(config.keep_alive);
        mqtt_options.set_clean_session(true);
        mqtt_options.set_max_packet_size(config.max_packet_bytes, config.max_packet_bytes);

        let (client, connection) = Client::new(mqtt_options, CLIENT_CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::sync_channel(queue_depth);

        let bus = Self {
            client,
            subscription: subscription.to_string(),
            connected: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let event_loop = EventLoop {
            client: bus.client.clone(),
            subscription: bus.subscription.clone(),
            connected: Arc::clone(&bus.connected),
            stopped: Arc::clone(&bus.stopped),
            queue: InboundQueue::new(tx, Arc::clone(&bus.dropped)),
        };

        std::thread::Builder::new()
            .name("mqtt-event-loop".to_string())
            .spawn(move || event_loop.run(connection))?;

        tracing::info!(
            broker = %format!("{}:{}", config.broker_host, config.broker_port),
            subscription,
            queue_depth,
            "MQTT bus initialized"
        );

        Ok((bus, rx))
    }

    /// Returns true if currently connected to the MQTT broker
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Inbound messages discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Unsubscribe and close the connection. Idempotent.
    pub fn disconnect(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(e) = self.client.try_unsubscribe(&self.subscription) {
            tracing::debug!(error = %e, "MQTT unsubscribe not sent");
        }
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "MQTT disconnect not sent");
        }

        tracing::info!(
            subscription = %self.subscription,
            was_connected = self.is_connected(),
            dropped = self.dropped(),
            "MQTT bus disconnected"
        );
    }
}

impl Publish for MqttBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        validate_topic(topic)?;
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())?;
        Ok(())
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct EventLoop {
    client: Client,
    subscription: String,
    connected: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    queue: InboundQueue,
}

impl EventLoop {
    fn run(mut self, mut connection: Connection) {
        let mut reconnect_attempts = 0u32;

        while !self.stopped.load(Ordering::Acquire) {
            for notification in connection.iter() {
                if self.stopped.load(Ordering::Acquire) {
                    break;
                }

                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        self.connected.store(true, Ordering::Release);
                        reconnect_attempts = 0;
                        tracing::info!("MQTT connected to broker");

                        // Clean sessions lose subscriptions, so resubscribe on every ConnAck.
                        if let Err(e) = self
                            .client
                            .try_subscribe(&self.subscription, QoS::AtMostOnce)
                        {
                            tracing::error!(
                                error = %e,
                                topic = %self.subscription,
                                "MQTT subscribe failed"
                            );
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        tracing::info!(topic = %self.subscription, "Subscribed");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = publish.payload.to_vec();
                        if self.queue.push(publish.topic, payload) == Enqueued::Closed {
                            tracing::info!("Inbound queue closed, stopping MQTT event loop");
                            return;
                        }
                    }
                    Ok(Event::Incoming(Packet::PingResp)) => {
                        tracing::trace!("MQTT ping response received");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // rumqttc reconnects on the next poll, so every error waits first.
                        self.connected.store(false, Ordering::Release);
                        reconnect_attempts = reconnect_attempts.saturating_add(1);
                        let backoff = calculate_backoff(reconnect_attempts);
                        match &e {
                            ConnectionError::Io(_) | ConnectionError::NetworkTimeout => {
                                tracing::warn!(
                                    error = %e,
                                    attempt = reconnect_attempts,
                                    backoff_ms = backoff.as_millis(),
                                    "MQTT connection lost, reconnecting"
                                );
                            }
                            _ => {
                                tracing::error!(
                                    error = %e,
                                    attempt = reconnect_attempts,
                                    backoff_ms = backoff.as_millis(),
                                    "MQTT error, reconnecting"
                                );
                            }
                        }
                        std::thread::sleep(backoff);
                    }
                }
            }

            if self.stopped.load(Ordering::Acquire) {
                break;
            }

            // Iterator ended on disconnect; iterating again reconnects.
            self.connected.store(false, Ordering::Release);
            reconnect_attempts = reconnect_attempts.saturating_add(1);
            let backoff = calculate_backoff(reconnect_attempts);
            tracing::warn!(
                attempt = reconnect_attempts,
                backoff_ms = backoff.as_millis(),
                "MQTT connection closed, attempting reconnect"
            );
            std::thread::sleep(backoff);
        }

        self.connected.store(false, Ordering::Release);
        tracing::debug!("MQTT event loop stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enqueued {
    Queued,
    Dropped,
    Closed,
}

/// Producer side of the inbound queue. Numbers messages in arrival order and
/// drops the newest one when the consumer is behind.
struct InboundQueue {
    tx: SyncSender<InboundMessage>,
    dropped: Arc<AtomicU64>,
    dropped_counter: Counter<u64>,
    next_sequence: u64,
}

impl InboundQueue {
    fn new(tx: SyncSender<InboundMessage>, dropped: Arc<AtomicU64>) -> Self {
        let dropped_counter = global::meter("bus")
            .u64_counter("bus_inbound_dropped_total")
            .with_description("Inbound messages dropped because the queue was full")
            .build();

        Self {
            tx,
            dropped,
            dropped_counter,
            next_sequence: 0,
        }
    }

    fn push(&mut self, topic: String, payload: Vec<u8>) -> Enqueued {
        let message = InboundMessage {
            sequence: self.next_sequence,
            topic,
            payload,
        };
        self.next_sequence += 1;

        match self.tx.try_send(message) {
            Ok(()) => Enqueued::Queued,
            Err(TrySendError::Full(message)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                self.dropped_counter.add(1, &[]);
                tracing::debug!(
                    sequence = message.sequence,
                    dropped_total = total,
                    "Inbound queue full, dropping message"
                );
                Enqueued::Dropped
            }
            Err(TrySendError::Disconnected(_)) => Enqueued::Closed,
        }
    }
}

/// Topic names used for publishing and subscribing: no wildcards, no NUL,
/// not empty.
pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() || topic.contains(['#', '+', '\0']) {
        return Err(BusError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Calculate exponential backoff with jitter, capped at 30 seconds
fn calculate_backoff(attempt: u32) -> Duration {
    const BASE_MS: u64 = 100;
    const MAX_MS: u64 = 30_000;

    let exp_backoff = BASE_MS.saturating_mul(2u64.saturating_pow(attempt.min(10)));
    let capped = exp_backoff.min(MAX_MS);

    let jitter = (capped / 10).max(1);
    let jittered = capped.saturating_add(fastrand::u64(0..jitter));

    Duration::from_millis(jittered)
}

//! MessageIngestor - MQTT subscription feeding the ordered queue

use std::time::Duration;

use contracts::{TelemetryEvent, TransportConfig};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use task_queue::OrderedTaskQueue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::decode::decode_event;
use crate::error::Result;

/// Pause before polling again after an event loop error
const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

/// Subscribes to device telemetry and enqueues every decodable message
pub struct MessageIngestor {
    config: TransportConfig,
}

impl MessageIngestor {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Build client options from the transport configuration
    pub fn mqtt_options(&self) -> Result<MqttOptions> {
        let (host, port) = self.config.broker_address()?;
        let mut options = MqttOptions::new(self.config.client_id.as_str(), host, port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        options.set_clean_session(true);
        Ok(options)
    }

    /// Run until `shutdown` fires
    ///
    /// The subscription is (re)issued on every ConnAck, since a clean
    /// session drops it on reconnect.
    #[instrument(
        name = "mqtt_ingestor",
        skip_all,
        fields(broker_url = %self.config.broker_url, topic = %self.config.topic)
    )]
    pub async fn run(
        &self,
        queue: &OrderedTaskQueue<TelemetryEvent>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let options = self.mqtt_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, self.config.event_capacity);
        let qos = qos_level(self.config.qos);

        info!(client_id = %self.config.client_id, "Starting MQTT ingestor");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Shutdown signal received");
                    if let Err(e) = client.try_disconnect() {
                        debug!(error = %e, "Disconnect request not sent");
                    }
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handle_publish(queue, &publish.topic, &publish.payload);
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        // Retried on the next ConnAck
                        if let Err(e) = client.try_subscribe(self.config.topic.as_str(), qos) {
                            error!(error = %e, "Failed to request subscription");
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        info!("Subscription acknowledged");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT event loop error");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
                        }
                    }
                }
            }
        }

        info!("MQTT ingestor stopped");
        Ok(())
    }
}

/// Decode one publish and push it onto the queue
///
/// Undecodable payloads are logged, counted and dropped.
///
/// # Returns
/// Whether an event was enqueued
pub fn handle_publish(queue: &OrderedTaskQueue<TelemetryEvent>, topic: &str, payload: &[u8]) -> bool {
    observability::record_message_received();

    match decode_event(payload) {
        Ok(event) => {
            debug!(topic, device_urn = %event.device_urn, "Message enqueued");
            queue.push(event);
            true
        }
        Err(e) => {
            observability::record_decode_failure();
            warn!(topic, payload_size = payload.len(), error = %e, "Dropping undecodable message");
            false
        }
    }
}

fn qos_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

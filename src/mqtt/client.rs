use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::discovery::OutboundMessage;
use crate::discovery::topic::{LWT_SUBSCRIPTION, bridge_status_topic};

use super::InboundMessage;

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttClient {
    pub fn new(config: &Config) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(std::time::Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.mqtt.username, &config.mqtt.password) {
            mqttopts.set_credentials(user, pass);
        }

        let lwt = rumqttc::LastWill::new(
            bridge_status_topic(),
            "offline".as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
        );
        mqttopts.set_last_will(lwt);

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self { client, eventloop }
    }

    /// Run the MQTT event loop. Subscribes to the display LWT topics on connect and
    /// forwards every incoming publish through inbound_tx. Batches received on
    /// outbound_rx are published from a separate task so a full request queue never
    /// stalls polling.
    pub async fn run(
        mut self,
        inbound_tx: mpsc::Sender<InboundMessage>,
        outbound_rx: mpsc::Receiver<OutboundMessage>,
    ) {
        let publisher = tokio::spawn(publish_loop(self.client.clone(), outbound_rx));

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("Connected to MQTT broker");

                    if let Err(e) = self.client.try_publish(
                        bridge_status_topic(),
                        QoS::AtLeastOnce,
                        true,
                        "online",
                    ) {
                        error!("Failed to publish online status: {}", e);
                    }

                    // Resubscribe on every connect; the broker replays retained LWTs,
                    // which re-announces every known display.
                    if let Err(e) = self.client.try_subscribe(LWT_SUBSCRIPTION, QoS::AtLeastOnce) {
                        error!("Failed to subscribe to {}: {}", LWT_SUBSCRIPTION, e);
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    debug!("Received {} ({} bytes)", publish.topic, publish.payload.len());
                    let msg = InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    match inbound_tx.try_send(msg) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(msg)) => {
                            warn!("Inbound queue full, dropping message on {}", msg.topic);
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            warn!("Inbound channel closed, stopping MQTT loop");
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}. Reconnecting...", e);
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }

        publisher.abort();
    }
}

async fn publish_loop(client: AsyncClient, mut outbound_rx: mpsc::Receiver<OutboundMessage>) {
    while let Some(msg) = outbound_rx.recv().await {
        let body = match msg.to_json() {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize payload for {}: {}", msg.topic, e);
                continue;
            }
        };
        debug!("Publishing {} (retain={})", msg.topic, msg.retain);
        if let Err(e) = client
            .publish(&msg.topic, QoS::AtMostOnce, msg.retain, body)
            .await
        {
            warn!("Failed to publish {}: {}", msg.topic, e);
        }
    }
    debug!("Outbound channel closed, publisher stopping");
}

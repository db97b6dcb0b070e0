use tokio::sync::mpsc;
use tracing::{error, info, warn};

use display_discovery::config::Config;
use display_discovery::discovery::{self, OutboundMessage, payload::LwtPayload};
use display_discovery::mqtt::{InboundMessage, client::MqttClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting display-discovery bridge (mqtt={}:{}, manufacturer={}, model={})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.device.manufacturer,
        config.device.model,
    );

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(256);
    let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundMessage>(100);

    let mqtt_client = MqttClient::new(&config);
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(inbound_tx, outbound_rx).await;
    });

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            std::process::exit(1);
        }
    };

    // Main loop: one discovery batch per LWT message + handle shutdown
    loop {
        tokio::select! {
            msg = inbound_rx.recv() => {
                let Some(msg) = msg else {
                    warn!("MQTT loop stopped");
                    break;
                };
                let payload = LwtPayload::from(msg.payload.as_slice());
                let batch = discovery::handle_lwt(
                    &msg.topic,
                    &payload,
                    chrono::Utc::now(),
                    &config.device,
                );
                if batch.is_empty() {
                    continue;
                }
                info!("Announcing {} ({} messages)", msg.topic, batch.len());
                for out in batch {
                    if outbound_tx.send(out).await.is_err() {
                        warn!("Outbound channel closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    mqtt_handle.abort();
    info!("display-discovery bridge stopped");
}

//! Symbion RPC daemon entry point

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, MqttOptions};
use std::time::Duration;
use symbion_rpcd::{dispatch, AgentConfig, Dispatcher, HandlerContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("symbion_rpcd=info")),
        )
        .init();

    info!("Symbion RPC daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load()
        .await
        .context("Failed to load configuration")?;

    let client_id = config.client_id();
    let mut mqtt_options =
        MqttOptions::new(&client_id, &config.mqtt.broker_host, config.mqtt.broker_port);
    mqtt_options.set_keep_alive(Duration::from_secs(u64::from(config.mqtt.keep_alive_secs)));
    mqtt_options.set_clean_session(true);

    let (client, eventloop) = AsyncClient::new(mqtt_options, 10);
    info!(
        "Client {} -> {}:{}",
        client_id, config.mqtt.broker_host, config.mqtt.broker_port
    );

    let dispatcher = Dispatcher::new(HandlerContext::from_config(&config));

    dispatch::serve(&dispatcher, &client, eventloop, &config.mqtt)
        .await
        .context("RPC service stopped")
}

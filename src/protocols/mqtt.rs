use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::settings::Settings;

/// Outbound half of the bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, value: String) -> Result<()>;
}

#[derive(Clone)]
pub struct MqttClient {
    pub client: AsyncClient,
    pub retain: bool,
}

/// The returned event loop must be polled (see
/// [`start_mqtt_events_loop`](crate::mqtt::events::start_mqtt_events_loop))
/// for the client to connect at all.
pub fn mk_mqtt_client(settings: &Settings) -> (MqttClient, EventLoop) {
    let mut options = MqttOptions::new(
        settings.mqtt.id.clone(),
        settings.mqtt.host.clone(),
        settings.mqtt.port,
    );
    options.set_keep_alive(Duration::from_secs(settings.mqtt.keep_alive_secs));

    if let Some(username) = &settings.mqtt.username {
        options.set_credentials(
            username.clone(),
            settings.mqtt.password.clone().unwrap_or_default(),
        );
    }

    let (client, eventloop) = AsyncClient::new(options, 10);

    let mqtt_client = MqttClient {
        client,
        retain: settings.mqtt.retain,
    };

    (mqtt_client, eventloop)
}

#[async_trait]
impl Publisher for MqttClient {
    async fn publish(&self, topic: &str, value: String) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, self.retain, value)
            .await?;

        Ok(())
    }
}

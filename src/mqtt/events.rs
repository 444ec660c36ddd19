use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use log::{debug, error, info};
use rumqttc::{EventLoop, QoS, SubscribeFilter};

use crate::{
    protocols::mqtt::MqttClient,
    unifi::{
        attribute::Attribute, device::DeviceRegistry, queue::CommandQueue, topic::command_topic,
    },
};

/// Topics this bridge listens on: the three `set_*` topics of every device.
pub fn command_subscriptions(registry: &DeviceRegistry) -> Vec<SubscribeFilter> {
    registry
        .devices()
        .flat_map(|device| {
            Attribute::ALL
                .into_iter()
                .map(|attribute| command_topic(&device.name, attribute))
        })
        .map(|topic| SubscribeFilter::new(topic, QoS::AtMostOnce))
        .collect()
}

pub async fn handle_incoming_mqtt_event(
    event: rumqttc::Event,
    mqtt_client: &MqttClient,
    registry: &DeviceRegistry,
    queue: &CommandQueue,
) -> Result<()> {
    match event {
        // Subscriptions do not survive a reconnect with a clean session, so
        // they are renewed on every ConnAck. The request channel is only
        // drained by this loop's next poll, so the subscribe must not be
        // awaited here.
        rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_)) => {
            let subscriptions = command_subscriptions(registry);
            info!(
                "Connected to MQTT broker, subscribing to {} topics",
                subscriptions.len()
            );

            let client = mqtt_client.client.clone();
            tokio::spawn(async move {
                if let Err(e) = client.subscribe_many(subscriptions).await {
                    error!("Failed to subscribe to command topics: {:?}", e);
                }
            });
        }
        rumqttc::Event::Incoming(rumqttc::Packet::Publish(msg)) => {
            debug!("Queueing command on {}", msg.topic);

            queue.push(msg.topic, msg.payload).await;
        }
        _ => {}
    }

    Ok(())
}

pub fn start_mqtt_events_loop(
    mut eventloop: EventLoop,
    mqtt_client: &MqttClient,
    registry: &Arc<DeviceRegistry>,
    queue: &Arc<CommandQueue>,
) -> tokio::task::JoinHandle<()> {
    let mqtt_client = mqtt_client.clone();
    let registry = registry.clone();
    let queue = queue.clone();

    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(event) => {
                    let result =
                        handle_incoming_mqtt_event(event, &mqtt_client, &registry, &queue).await;

                    if let Err(e) = result {
                        error!("Error while handling MQTT event: {:?}", e);
                    }
                }
                Err(e) => {
                    // rumqttc reconnects on the next poll
                    error!("MQTT connection error: {}. Retrying in 5 seconds...", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use rumqttc::{AsyncClient, ConnAck, ConnectReturnCode, MqttOptions, Publish};

    use super::*;
    use crate::unifi::device::test_device;

    fn mqtt_client() -> (MqttClient, EventLoop) {
        let (client, eventloop) =
            AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 10);

        (
            MqttClient {
                client,
                retain: false,
            },
            eventloop,
        )
    }

    #[test]
    fn subscribes_to_every_command_topic() {
        let registry = DeviceRegistry::new([test_device("office"), test_device("hallway")]);

        let topics: Vec<String> = command_subscriptions(&registry)
            .into_iter()
            .map(|filter| filter.path)
            .collect();

        assert_eq!(
            topics,
            vec![
                "unifi/hallway/set_color",
                "unifi/hallway/set_brightness",
                "unifi/hallway/set_power",
                "unifi/office/set_color",
                "unifi/office/set_brightness",
                "unifi/office/set_power",
            ]
        );
    }

    #[tokio::test]
    async fn incoming_publish_is_queued_verbatim() {
        let (client, _eventloop) = mqtt_client();
        let registry = DeviceRegistry::new([test_device("office")]);
        let queue = CommandQueue::default();

        let publish = Publish::new("unifi/office/set_color", QoS::AtMostOnce, "ff0000\n");
        let event = rumqttc::Event::Incoming(rumqttc::Packet::Publish(publish));

        handle_incoming_mqtt_event(event, &client, &registry, &queue)
            .await
            .unwrap();

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].topic, "unifi/office/set_color");
        assert_eq!(drained[0].payload.as_ref(), b"ff0000\n");
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let (client, _eventloop) = mqtt_client();
        let registry = DeviceRegistry::new([test_device("office")]);
        let queue = CommandQueue::default();

        let event = rumqttc::Event::Incoming(rumqttc::Packet::PingResp);

        handle_incoming_mqtt_event(event, &client, &registry, &queue)
            .await
            .unwrap();

        assert!(queue.drain().await.is_empty());
    }

    #[tokio::test]
    async fn conn_ack_with_full_request_channel_does_not_block() {
        let (client, _eventloop) = mqtt_client();
        let registry = DeviceRegistry::new([test_device("office")]);
        let queue = CommandQueue::default();

        // Readings published while the broker was away fill the channel.
        for _ in 0..10 {
            client
                .client
                .try_publish("unifi/office/color", QoS::AtLeastOnce, false, "ff0000")
                .unwrap();
        }
        assert!(client
            .client
            .try_publish("unifi/office/color", QoS::AtLeastOnce, false, "ff0000")
            .is_err());

        let event = rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }));

        let handled = tokio::time::timeout(
            Duration::from_secs(1),
            handle_incoming_mqtt_event(event, &client, &registry, &queue),
        )
        .await;

        assert!(matches!(handled, Ok(Ok(()))));
    }
}

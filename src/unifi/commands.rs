use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use log::{debug, error, info, warn};

use super::{
    attribute::Attribute,
    device::{Device, DeviceRegistry},
    error::DispatchError,
    queue::{CommandQueue, InboundCommand},
    session::SessionPool,
    topic::parse_topic,
};
use crate::scheduler::run_periodic;

/// Turns inbound MQTT commands into LED writes on access points.
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<DeviceRegistry>,
    sessions: SessionPool,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<DeviceRegistry>, sessions: SessionPool) -> CommandDispatcher {
        CommandDispatcher { registry, sessions }
    }

    /// Resolves a command topic to the device and attribute it addresses.
    pub fn resolve(&self, topic: &str) -> Result<(&Device, Attribute), DispatchError> {
        let target = parse_topic(topic)?;

        let device = self
            .registry
            .lookup(target.device)
            .ok_or_else(|| DispatchError::UnknownDevice(target.device.to_string()))?;

        let attribute = Attribute::from_set_suffix(target.suffix).ok_or_else(|| {
            DispatchError::UnknownAttribute {
                device: target.device.to_string(),
                suffix: target.suffix.to_string(),
            }
        })?;

        Ok((device, attribute))
    }

    pub async fn dispatch(&self, command: &InboundCommand) -> Result<(), DispatchError> {
        let (device, attribute) = self.resolve(&command.topic)?;

        debug!(
            "Writing {} to {} on AP {}",
            String::from_utf8_lossy(&command.payload),
            attribute.resource_path(),
            device.name
        );

        self.sessions
            .write_attribute(device, attribute, &command.payload)
            .await?;

        Ok(())
    }

    /// Drains the queue and dispatches whatever the coalescing policy keeps.
    /// Returns the number of commands that were written successfully.
    pub async fn drain_and_dispatch(&self, queue: &CommandQueue) -> usize {
        let commands = queue.drain().await;

        let results = join_all(commands.iter().map(|command| async move {
            let result = self.dispatch(command).await;
            (command, result)
        }))
        .await;

        let mut written = 0;

        for (command, result) in results {
            match result {
                Ok(()) => written += 1,
                Err(e @ DispatchError::Remote(_)) => {
                    error!("Failed to apply command on {}: {}", command.topic, e);
                }
                Err(e) => {
                    warn!("Discarding command on {}: {}", command.topic, e);
                }
            }
        }

        written
    }
}

pub fn start_command_loop(
    dispatcher: &CommandDispatcher,
    queue: &Arc<CommandQueue>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    let dispatcher = dispatcher.clone();
    let queue = queue.clone();

    info!(
        "Dispatching commands every {:?} using the {:?} policy",
        period,
        queue.policy()
    );

    tokio::spawn(run_periodic(period, move || {
        let dispatcher = dispatcher.clone();
        let queue = queue.clone();

        async move {
            dispatcher.drain_and_dispatch(&queue).await;
        }
    }))
}

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use log::{debug, error, info};

use super::{
    attribute::Attribute,
    device::{Device, DeviceRegistry},
    session::SessionPool,
    topic::state_topic,
};
use crate::{protocols::mqtt::Publisher, scheduler::run_periodic};

/// Outcome of a single sweep over all access points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    pub reads: usize,
    pub published: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for PollReport {
    fn add_assign(&mut self, other: PollReport) {
        self.reads += other.reads;
        self.published += other.published;
        self.failed += other.failed;
    }
}

/// Reads LED state from every access point and publishes it to MQTT.
#[derive(Clone)]
pub struct StatePoller {
    registry: Arc<DeviceRegistry>,
    sessions: SessionPool,
    publisher: Arc<dyn Publisher>,
}

impl StatePoller {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        sessions: SessionPool,
        publisher: Arc<dyn Publisher>,
    ) -> StatePoller {
        StatePoller {
            registry,
            sessions,
            publisher,
        }
    }

    /// Devices are polled concurrently. A device that fails to answer only
    /// loses its own readings.
    pub async fn poll_once(&self) -> PollReport {
        let reports = join_all(self.registry.devices().map(|device| self.poll_device(device))).await;

        let mut total = PollReport::default();
        for report in reports {
            total += report;
        }

        total
    }

    async fn poll_device(&self, device: &Device) -> PollReport {
        let mut report = PollReport::default();

        // The session is released before publishing so a stalled bus never
        // holds up writes to this device.
        let mut readings = Vec::with_capacity(Attribute::ALL.len());
        {
            let session = self.sessions.session(device).await;
            for attribute in Attribute::ALL {
                readings.push((attribute, session.read_attribute(attribute).await));
            }
        }

        for (attribute, reading) in readings {
            report.reads += 1;

            let value = match reading {
                Ok(value) => value,
                Err(e) => {
                    error!("Failed to read {} from AP {}: {}", attribute, device.name, e);
                    report.failed += 1;
                    continue;
                }
            };

            debug!("AP: {} {}: {}", device.name, attribute, value.trim_end());

            let topic = state_topic(&device.name, attribute);
            match self.publisher.publish(&topic, value).await {
                Ok(()) => report.published += 1,
                Err(e) => error!("Failed to publish {}: {:?}", topic, e),
            }
        }

        report
    }
}

pub fn start_state_poll_loop(poller: &StatePoller, period: Duration) -> tokio::task::JoinHandle<()> {
    let poller = poller.clone();

    info!("Polling LED state every {:?}", period);

    tokio::spawn(run_periodic(period, move || {
        let poller = poller.clone();

        async move {
            debug!("Reading states from devices..");
            let report = poller.poll_once().await;
            debug!(
                "Poll finished: {} reads, {} published, {} failed",
                report.reads, report.published, report.failed
            );
        }
    }))
}

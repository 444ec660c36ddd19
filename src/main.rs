use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use log::info;
use mqtt::events::start_mqtt_events_loop;
use protocols::{mqtt::mk_mqtt_client, ssh::SshExecutor};
use unifi::{
    commands::{start_command_loop, CommandDispatcher},
    device::DeviceRegistry,
    polling::{start_state_poll_loop, StatePoller},
    queue::CommandQueue,
    session::SessionPool,
};

use crate::settings::read_settings;

mod mqtt;
mod protocols;
mod scheduler;
mod settings;
mod unifi;

fn init_logging() {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filters)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let settings = read_settings()?;
    let registry = Arc::new(DeviceRegistry::from_settings(&settings)?);
    info!("Managing {} access point(s)", registry.len());

    let (mqtt_client, eventloop) = mk_mqtt_client(&settings);
    let executor = Arc::new(SshExecutor::new(&settings.ssh));
    let sessions = SessionPool::new(
        executor,
        &registry,
        Duration::from_millis(settings.bridge.remote_timeout_ms),
    );
    let queue = Arc::new(CommandQueue::new(settings.bridge.coalesce));

    let poller = StatePoller::new(
        registry.clone(),
        sessions.clone(),
        Arc::new(mqtt_client.clone()),
    );
    let dispatcher = CommandDispatcher::new(registry.clone(), sessions);

    start_mqtt_events_loop(eventloop, &mqtt_client, &registry, &queue);
    start_state_poll_loop(
        &poller,
        Duration::from_millis(settings.bridge.read_interval_ms),
    );
    start_command_loop(
        &dispatcher,
        &queue,
        Duration::from_millis(settings.bridge.write_interval_ms),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}

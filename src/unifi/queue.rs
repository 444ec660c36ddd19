use std::collections::HashMap;

use bytes::Bytes;
use log::debug;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::topic::parse_topic;

/// Which buffered commands survive a drain.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoalescePolicy {
    /// Only the most recent command is kept, regardless of which device it
    /// is addressed to.
    #[default]
    Latest,
    /// The most recent command per device and attribute is kept.
    PerTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundCommand {
    pub topic: String,
    pub payload: Bytes,
    pub sequence: u64,
}

#[derive(Default)]
struct QueueInner {
    commands: Vec<InboundCommand>,
    next_sequence: u64,
}

/// Buffer between MQTT delivery and the write schedule.
#[derive(Default)]
pub struct CommandQueue {
    inner: Mutex<QueueInner>,
    policy: CoalescePolicy,
}

impl CommandQueue {
    pub fn new(policy: CoalescePolicy) -> CommandQueue {
        CommandQueue {
            inner: Default::default(),
            policy,
        }
    }

    pub fn policy(&self) -> CoalescePolicy {
        self.policy
    }

    pub async fn push(&self, topic: impl Into<String>, payload: impl Into<Bytes>) {
        let mut inner = self.inner.lock().await;

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        inner.commands.push(InboundCommand {
            topic: topic.into(),
            payload: payload.into(),
            sequence,
        });
    }

    /// Takes everything buffered so far and returns the commands that should
    /// be dispatched, oldest first. Everything else is dropped.
    pub async fn drain(&self) -> Vec<InboundCommand> {
        let commands = std::mem::take(&mut self.inner.lock().await.commands);

        coalesce(commands, self.policy)
    }
}

fn coalesce(commands: Vec<InboundCommand>, policy: CoalescePolicy) -> Vec<InboundCommand> {
    let total = commands.len();

    let kept: Vec<InboundCommand> = match policy {
        CoalescePolicy::Latest => commands
            .into_iter()
            .max_by_key(|command| command.sequence)
            .into_iter()
            .collect(),
        CoalescePolicy::PerTarget => {
            let mut latest: HashMap<(String, String), InboundCommand> = HashMap::new();

            for command in commands {
                let key = match parse_topic(&command.topic) {
                    Ok(target) => (target.device.to_string(), target.suffix.to_string()),
                    // Unparseable topics are only compared with identical ones
                    Err(_) => (command.topic.clone(), String::new()),
                };

                match latest.get(&key) {
                    Some(existing) if existing.sequence > command.sequence => {}
                    _ => {
                        latest.insert(key, command);
                    }
                }
            }

            let mut kept: Vec<InboundCommand> = latest.into_values().collect();
            kept.sort_by_key(|command| command.sequence);
            kept
        }
    };

    if kept.len() < total {
        debug!(
            "Dropping {} superseded command(s), dispatching {}",
            total - kept.len(),
            kept.len()
        );
    }

    kept
}

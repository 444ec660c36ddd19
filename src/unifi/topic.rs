use super::{attribute::Attribute, error::DispatchError};

pub const TOPIC_PREFIX: &str = "unifi";

/// The device and suffix segments of a `unifi/<device>/<suffix>` topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicTarget<'a> {
    pub device: &'a str,
    pub suffix: &'a str,
}

/// Only the first three segments are considered, anything after the suffix
/// is ignored.
pub fn parse_topic(topic: &str) -> Result<TopicTarget<'_>, DispatchError> {
    let mut parts = topic.splitn(4, '/');

    let (Some(TOPIC_PREFIX), Some(device), Some(suffix)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(DispatchError::MalformedTopic(topic.to_string()));
    };

    if device.is_empty() {
        return Err(DispatchError::MalformedTopic(topic.to_string()));
    }

    Ok(TopicTarget { device, suffix })
}

pub fn state_topic(device: &str, attribute: Attribute) -> String {
    format!("{TOPIC_PREFIX}/{device}/{}", attribute.state_suffix())
}

pub fn command_topic(device: &str, attribute: Attribute) -> String {
    format!("{TOPIC_PREFIX}/{device}/{}", attribute.set_suffix())
}

use std::collections::BTreeMap;

use config::ConfigError;
use derive_builder::Builder;

use crate::settings::Settings;

#[derive(Builder, Clone, Default, PartialEq)]
#[builder(setter(into), default)]
pub struct Device {
    pub name: String,
    pub host: String,
    #[builder(default = "22")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

// Keep the password out of logs.
impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Access points known to the bridge, keyed by name. Read-only once built.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Device>,
}

impl DeviceRegistry {
    /// Expects settings that already passed `Settings::validate`.
    pub fn from_settings(settings: &Settings) -> Result<DeviceRegistry, ConfigError> {
        let devices = settings
            .ap
            .iter()
            .map(|ap| {
                DeviceBuilder::default()
                    .name(ap.name.as_str())
                    .host(ap.host.as_str())
                    .port(ap.port)
                    .username(ap.username.as_str())
                    .password(ap.password.as_str())
                    .build()
            })
            .collect::<Result<Vec<Device>, _>>()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(DeviceRegistry::new(devices))
    }

    /// Later entries replace earlier ones with the same name.
    pub fn new(devices: impl IntoIterator<Item = Device>) -> DeviceRegistry {
        let devices = devices
            .into_iter()
            .map(|device| (device.name.clone(), device))
            .collect();

        DeviceRegistry { devices }
    }

    pub fn lookup(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
pub(crate) fn test_device(name: &str) -> Device {
    DeviceBuilder::default()
        .name(name)
        .host(format!("{name}.lan"))
        .username("admin")
        .password("secret")
        .build()
        .unwrap()
}

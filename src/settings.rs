use std::collections::HashSet;

use config::ConfigError;
use serde::Deserialize;

use crate::unifi::queue::CoalescePolicy;

#[derive(Clone, Deserialize, Debug)]
pub struct MqttSettings {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default)]
    pub retain: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub struct BridgeSettings {
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,
    #[serde(default = "default_write_interval_ms")]
    pub write_interval_ms: u64,
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    #[serde(default)]
    pub coalesce: CoalescePolicy,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            read_interval_ms: default_read_interval_ms(),
            write_interval_ms: default_write_interval_ms(),
            remote_timeout_ms: default_remote_timeout_ms(),
            coalesce: CoalescePolicy::default(),
        }
    }
}

/// How the ssh client is invoked. An empty `sshpass` runs `program`
/// directly, which is what you want with key based authentication.
#[derive(Clone, Deserialize, Debug)]
pub struct SshSettings {
    #[serde(default = "default_sshpass")]
    pub sshpass: String,
    #[serde(default = "default_ssh_program")]
    pub program: String,
    #[serde(default = "default_ssh_options")]
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            sshpass: default_sshpass(),
            program: default_ssh_program(),
            options: default_ssh_options(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct ApSettings {
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub mqtt: MqttSettings,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub ssh: SshSettings,
    pub ap: Vec<ApSettings>,
}

fn default_keep_alive_secs() -> u64 {
    5
}

fn default_read_interval_ms() -> u64 {
    30_000
}

fn default_write_interval_ms() -> u64 {
    2_000
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

fn default_sshpass() -> String {
    "sshpass".to_string()
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_ssh_options() -> Vec<String> {
    ["-o", "StrictHostKeyChecking=no", "-o", "ConnectTimeout=5"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_ssh_port() -> u16 {
    22
}

impl Settings {
    /// Rejects configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ap.is_empty() {
            return Err(ConfigError::Message(
                "no access points configured under [[ap]]".to_string(),
            ));
        }

        let mut names = HashSet::new();

        for ap in &self.ap {
            let name = &ap.name;

            // Names become topic levels, so MQTT separators and wildcards are out.
            if name.is_empty() || name.contains(['/', '+', '#']) {
                return Err(ConfigError::Message(format!(
                    "invalid access point name {name:?}"
                )));
            }

            if !names.insert(name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "access point {name} is configured more than once"
                )));
            }

            for (field, value) in [
                ("host", &ap.host),
                ("username", &ap.username),
                ("password", &ap.password),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Message(format!(
                        "access point {name} is missing {field}"
                    )));
                }
            }
        }

        for (field, value) in [
            ("read_interval_ms", self.bridge.read_interval_ms),
            ("write_interval_ms", self.bridge.write_interval_ms),
            ("remote_timeout_ms", self.bridge.remote_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "bridge.{field} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

pub fn read_settings() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("Settings"))
        .add_source(
            config::Environment::with_prefix("UNIFI_LED")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Settings>()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    const VALID: &str = r#"
        [mqtt]
        id = "unifi-led"
        host = "localhost"
        port = 1883

        [[ap]]
        name = "office"
        host = "10.0.0.2"
        username = "admin"
        password = "hunter2"
    "#;

    #[test]
    fn fills_in_defaults() {
        let settings = parse(VALID).unwrap();

        assert_eq!(settings.bridge.read_interval_ms, 30_000);
        assert_eq!(settings.bridge.write_interval_ms, 2_000);
        assert_eq!(settings.bridge.coalesce, CoalescePolicy::Latest);
        assert_eq!(settings.ap[0].name, "office");
        assert_eq!(settings.ap[0].port, 22);
        assert_eq!(settings.ssh.sshpass, "sshpass");
        assert!(!settings.mqtt.retain);
    }

    #[test]
    fn reads_coalesce_policy() {
        let toml = format!("{VALID}\n[bridge]\ncoalesce = \"per_target\"\n");
        let settings = parse(&toml).unwrap();

        assert_eq!(settings.bridge.coalesce, CoalescePolicy::PerTarget);
    }

    #[test]
    fn rejects_missing_password() {
        let toml = r#"
            [mqtt]
            id = "unifi-led"
            host = "localhost"
            port = 1883

            [[ap]]
            name = "office"
            host = "10.0.0.2"
            username = "admin"
        "#;

        assert!(parse(toml).is_err());
    }

    #[test]
    fn rejects_blank_host() {
        let toml = VALID.replace("10.0.0.2", " ");
        let err = parse(&toml).unwrap_err();

        assert!(err.to_string().contains("missing host"));
    }

    #[test]
    fn rejects_zero_interval() {
        let toml = format!("{VALID}\n[bridge]\nwrite_interval_ms = 0\n");

        assert!(parse(&toml).is_err());
    }

    fn with_extra_ap(name: &str) -> String {
        format!(
            "{VALID}\n[[ap]]\nname = \"{name}\"\nhost = \"10.0.0.3\"\nusername = \"admin\"\npassword = \"hunter2\"\n"
        )
    }

    #[test]
    fn keeps_name_case_verbatim() {
        let settings = parse(&with_extra_ap("OfficeAP")).unwrap();
        let names: Vec<&str> = settings.ap.iter().map(|ap| ap.name.as_str()).collect();

        assert_eq!(names, vec!["office", "OfficeAP"]);
    }

    #[test]
    fn names_differing_only_in_case_are_distinct() {
        assert!(parse(&with_extra_ap("Office")).is_ok());
    }

    #[test]
    fn rejects_duplicate_name() {
        let err = parse(&with_extra_ap("office")).unwrap_err();

        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_topic_wildcards_in_name() {
        for name in ["office/1", "office+", "#", ""] {
            let err = parse(&with_extra_ap(name)).unwrap_err();

            assert!(
                err.to_string().contains("invalid access point name"),
                "{name:?} was accepted"
            );
        }
    }
}

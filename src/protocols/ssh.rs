use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    settings::SshSettings,
    unifi::{device::Device, error::RemoteError, session::RemoteExecutor},
};

/// Runs commands on access points through the system ssh client.
///
/// Every call spawns a fresh `ssh` process. Password authentication goes
/// through `sshpass -e`, which reads the password from the `SSHPASS`
/// environment variable so that it never shows up in the process list.
#[derive(Clone, Debug)]
pub struct SshExecutor {
    settings: SshSettings,
}

impl SshExecutor {
    pub fn new(settings: &SshSettings) -> SshExecutor {
        SshExecutor {
            settings: settings.clone(),
        }
    }

    fn command(&self, device: &Device, remote_command: &str) -> Command {
        let mut command = if self.settings.sshpass.is_empty() {
            Command::new(&self.settings.program)
        } else {
            let mut command = Command::new(&self.settings.sshpass);
            command
                .arg("-e")
                .arg(&self.settings.program)
                .env("SSHPASS", &device.password);
            command
        };

        command
            .arg("-p")
            .arg(device.port.to_string())
            .args(&self.settings.options)
            .arg(format!("{}@{}", device.username, device.host))
            .arg(remote_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        device: &Device,
        remote_command: &str,
        input: Option<&[u8]>,
    ) -> Result<String, RemoteError> {
        let io_error = |source| RemoteError::Io {
            host: device.host.clone(),
            source,
        };

        let mut command = self.command(device, remote_command);
        command.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn().map_err(|source| RemoteError::Spawn {
            host: device.host.clone(),
            source,
        })?;

        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input).await.map_err(io_error)?;
                // Closing stdin ends the remote `cat`
                drop(stdin);
            }
        }

        let output = child.wait_with_output().await.map_err(io_error)?;

        if !output.status.success() {
            return Err(RemoteError::ExitStatus {
                host: device.host.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

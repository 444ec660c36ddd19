use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    attribute::Attribute,
    device::{Device, DeviceRegistry},
    error::RemoteError,
};

/// Runs a single shell command on an access point.
///
/// `input`, when present, is fed to the command's stdin. The command's stdout
/// is returned.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        device: &Device,
        command: &str,
        input: Option<&[u8]>,
    ) -> Result<String, RemoteError>;
}

/// Hands out exclusive per-device sessions on top of a [`RemoteExecutor`].
///
/// Access points expose their LEDs through plain files with no locking of
/// their own, so at most one session per device may be active at a time.
/// Different devices never wait on each other.
#[derive(Clone)]
pub struct SessionPool {
    executor: Arc<dyn RemoteExecutor>,
    locks: Arc<HashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl SessionPool {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        registry: &DeviceRegistry,
        timeout: Duration,
    ) -> SessionPool {
        let locks = registry
            .devices()
            .map(|device| (device.name.clone(), Arc::new(Mutex::new(()))))
            .collect();

        SessionPool {
            executor,
            locks: Arc::new(locks),
            timeout,
        }
    }

    /// Waits until no other session is open on `device`. The session is
    /// released when the returned value is dropped.
    pub async fn session<'a>(&self, device: &'a Device) -> DeviceSession<'a> {
        let lock = match self.locks.get(&device.name) {
            Some(lock) => lock.clone(),
            // Not part of the registry this pool was built from
            None => Arc::new(Mutex::new(())),
        };

        DeviceSession {
            device,
            executor: self.executor.clone(),
            timeout: self.timeout,
            _guard: lock.lock_owned().await,
        }
    }

    pub async fn write_attribute(
        &self,
        device: &Device,
        attribute: Attribute,
        payload: &[u8],
    ) -> Result<(), RemoteError> {
        self.session(device)
            .await
            .write_attribute(attribute, payload)
            .await
    }
}

pub struct DeviceSession<'a> {
    device: &'a Device,
    executor: Arc<dyn RemoteExecutor>,
    timeout: Duration,
    _guard: OwnedMutexGuard<()>,
}

impl DeviceSession<'_> {
    /// Returns the resource contents exactly as printed by the device.
    pub async fn read_attribute(&self, attribute: Attribute) -> Result<String, RemoteError> {
        self.run(&attribute.read_command(), None).await
    }

    pub async fn write_attribute(
        &self,
        attribute: Attribute,
        payload: &[u8],
    ) -> Result<(), RemoteError> {
        self.run(&attribute.write_command(), Some(payload))
            .await
            .map(|_| ())
    }

    async fn run(&self, command: &str, input: Option<&[u8]>) -> Result<String, RemoteError> {
        let execute = self.executor.execute(self.device, command, input);

        match tokio::time::timeout(self.timeout, execute).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                host: self.device.host.clone(),
                timeout: self.timeout,
            }),
        }
    }
}

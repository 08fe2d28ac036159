//! Connection facade exposed to the rest of the application.
//!
//! The `ConnectionService` owns the connector and any background work it
//! started on behalf of callers, and composes pairing with connecting.

use std::sync::Arc;

use {
    parking_lot::Mutex,
    tokio::{sync::watch, task::JoinHandle},
    tracing::{debug, warn},
};

use crate::{
    bluetooth::{
        connector::{ConnectionState, DeviceConnector},
        device::{BondState, RemoteDevice},
    },
    error::{ConnectionError, ErrorReporter},
};

/// Observable connection facade.
pub struct ConnectionService {
    /// Shared with background tasks started by the service.
    connector: Arc<DeviceConnector>,
    /// Background connect tasks, aborted on release.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionService {
    /// Wraps a connector.
    pub fn new(connector: DeviceConnector) -> Self {
        Self {
            connector: Arc::new(connector),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped connector.
    #[must_use]
    pub fn connector(&self) -> &Arc<DeviceConnector> {
        &self.connector
    }

    /// Connection state stream.
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connector.watch_state()
    }

    /// Connected device stream.
    #[must_use]
    pub fn connected_device(&self) -> watch::Receiver<Option<RemoteDevice>> {
        self.connector.watch_device()
    }

    /// Last error stream.
    #[must_use]
    pub fn connection_error(&self) -> watch::Receiver<Option<String>> {
        self.connector.watch_error()
    }

    /// Connects to `device`.
    ///
    /// # Errors
    ///
    /// See [`DeviceConnector::connect`].
    pub async fn connect(&self, device: &RemoteDevice) -> Result<(), ConnectionError> {
        self.connector.connect(device).await
    }

    /// Pairs with `device` if needed, then connects.
    ///
    /// # Errors
    ///
    /// Errors from `pair_device` short-circuit. A device that did not bond is
    /// still connected to, since insecure channels need no bond, unless
    /// `require_bond` is set: then it yields `PairingTimedOut` while the
    /// platform still reports bonding, otherwise `PairingFailed`. Connect
    /// errors as in [`DeviceConnector::connect`].
    pub async fn pair_and_connect(&self, device: &RemoteDevice) -> Result<(), ConnectionError> {
        Self::pair_then_connect(&self.connector, device).await
    }

    /// Starts a connect in the background.
    ///
    /// The outcome is observable through the state and error streams.
    pub fn spawn_connect(&self, device: RemoteDevice) {
        let connector = Arc::clone(&self.connector);
        self.track(tokio::spawn(async move {
            if let Err(e) = connector.connect(&device).await {
                Self::report_background(&e, "background connect");
            }
        }));
    }

    /// Starts a pair-then-connect in the background.
    pub fn spawn_pair_and_connect(&self, device: RemoteDevice) {
        let connector = Arc::clone(&self.connector);
        self.track(tokio::spawn(async move {
            if let Err(e) = Self::pair_then_connect(&connector, &device).await {
                Self::report_background(&e, "background pair and connect");
            }
        }));
    }

    /// Disconnects; never fails.
    pub async fn disconnect(&self) {
        if let Err(e) = self.connector.disconnect().await {
            ErrorReporter::warn(&e, "disconnect");
        }
    }

    /// Whether a channel is connected and open.
    pub async fn is_connected(&self) -> bool {
        self.connector.is_connected().await
    }

    /// Sends bytes to the connected device.
    ///
    /// # Errors
    ///
    /// See [`DeviceConnector::send_data`].
    pub async fn send_data(&self, data: &[u8]) -> Result<(), ConnectionError> {
        self.connector.send_data(data).await
    }

    /// Aborts background work and releases the connector.
    pub async fn release(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        debug!("Releasing connection service, aborting {} tasks", tasks.len());
        for task in tasks {
            task.abort();
        }
        self.connector.release().await;
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Background failures surface through the error stream; preconditions
    /// are logged louder since no attempt was made at all.
    fn report_background(error: &ConnectionError, context: &str) {
        if error.is_precondition() {
            ErrorReporter::warn(error, context);
        } else {
            ErrorReporter::info(error, context);
        }
    }

    async fn pair_then_connect(
        connector: &DeviceConnector,
        device: &RemoteDevice,
    ) -> Result<(), ConnectionError> {
        if !connector.pair_device(device).await? {
            if !connector.config().require_bond {
                warn!("{} did not bond, connecting anyway", device.address);
                return connector.connect(device).await;
            }

            let error = if connector.bond_state(device)? == BondState::Bonding {
                ConnectionError::PairingTimedOut {
                    address: device.address.clone(),
                    polls: connector.config().bond_poll_limit,
                }
            } else {
                ConnectionError::PairingFailed {
                    reason: format!("{} did not bond", device.address),
                }
            };
            warn!("{error}");
            return Err(error);
        }

        connector.connect(device).await
    }
}

impl Drop for ConnectionService {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

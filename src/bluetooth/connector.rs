//! Connection state machine for a single remote device.
//!
//! The `DeviceConnector` owns at most one live channel. A connect request runs
//! the retry protocol: cancel discovery, wait for the radio to settle, then walk
//! the candidate services for a bounded number of rounds, trying every channel
//! creation strategy per service and bounding each connect with a timeout.

use std::{
    io::{Error as IoError, Result as IoResult},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering::SeqCst},
    },
};

use {
    serde::{Deserialize, Serialize},
    tokio::{
        pin, select,
        sync::{Mutex, Notify, watch},
        time::{Duration, error::Elapsed, sleep, timeout},
    },
    tracing::{debug, error, info, warn},
};

use crate::{
    bluetooth::{
        channel::DataChannel,
        device::{BondState, RemoteDevice},
        platform::{Channel, ChannelStrategy, Radio, RemoteEndpoint},
        service_id::{ServiceId, candidate_services},
    },
    config::ConnectionConfig,
    error::{ConnectionError, ErrorReporter},
};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// An attempt is running.
    Connecting,
    /// A channel is open.
    Connected,
    /// Reserved for platforms that report a hard adapter fault.
    Error,
}

/// Connection state machine.
///
/// All operations take `&self`; share the connector behind an `Arc` to issue
/// a `disconnect` while a `connect` is still running.
pub struct DeviceConnector {
    /// Local radio.
    radio: Arc<dyn Radio>,
    /// Retry and timeout policy.
    config: ConnectionConfig,
    /// Published connection state.
    state_tx: watch::Sender<ConnectionState>,
    /// Published connected device.
    device_tx: watch::Sender<Option<RemoteDevice>>,
    /// Published message of the last terminal failure.
    error_tx: watch::Sender<Option<String>>,
    /// The live channel, if any.
    channel: Mutex<Option<DataChannel>>,
    /// Held for the whole duration of a connect attempt.
    attempt_gate: Mutex<()>,
    /// Wakes an in-flight attempt so it can abandon its work.
    cancel: Notify,
    /// Set once `release` has run.
    released: AtomicBool,
}

impl DeviceConnector {
    /// Creates a connector in the `Disconnected` state.
    ///
    /// # Arguments
    ///
    /// * `radio` - Local radio adapter.
    /// * `config` - Retry and timeout policy.
    pub fn new(radio: Arc<dyn Radio>, config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (device_tx, _) = watch::channel(None);
        let (error_tx, _) = watch::channel(None);

        Self {
            radio,
            config,
            state_tx,
            device_tx,
            error_tx,
            channel: Mutex::new(None),
            attempt_gate: Mutex::new(()),
            cancel: Notify::new(),
            released: AtomicBool::new(false),
        }
    }

    /// Retry and timeout policy in use.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Device of the current connection.
    #[must_use]
    pub fn connected_device(&self) -> Option<RemoteDevice> {
        self.device_tx.borrow().clone()
    }

    /// Message of the last terminal failure, cleared when a new attempt starts.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.error_tx.borrow().clone()
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribes to connected device changes.
    #[must_use]
    pub fn watch_device(&self) -> watch::Receiver<Option<RemoteDevice>> {
        self.device_tx.subscribe()
    }

    /// Subscribes to error changes.
    #[must_use]
    pub fn watch_error(&self) -> watch::Receiver<Option<String>> {
        self.error_tx.subscribe()
    }

    /// Connects to `device`, replacing any current connection.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` / `RadioUnavailable` before anything is attempted.
    /// - `AlreadyInProgress` while another attempt runs; nothing is changed.
    /// - `DeviceNotFound` if the radio cannot resolve the address.
    /// - `AllAttemptsExhausted` carrying the last per-candidate failure.
    /// - `Cancelled` if `disconnect` or `release` interrupted the attempt.
    /// - `Released` after `release`.
    pub async fn connect(&self, device: &RemoteDevice) -> Result<(), ConnectionError> {
        if self.released.load(SeqCst) {
            return Err(ConnectionError::Released);
        }
        self.check_preconditions()?;

        let Ok(_attempt) = self.attempt_gate.try_lock() else {
            debug!("Already connecting to a device");
            return Err(ConnectionError::AlreadyInProgress);
        };

        let cancelled = self.cancel.notified();
        pin!(cancelled);
        cancelled.as_mut().enable();

        if self.state() == ConnectionState::Connected {
            debug!("Replacing current connection");
            self.teardown().await;
        }

        self.state_tx.send_replace(ConnectionState::Connecting);
        self.error_tx.send_replace(None);
        info!(
            "Starting connection to {} ({})",
            device.name, device.address
        );

        let outcome = select! {
            biased;
            () = &mut cancelled => Err(ConnectionError::Cancelled),
            result = self.connect_with_retry(device) => result,
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(ConnectionError::Cancelled) => {
                debug!("Connection attempt to {} cancelled", device.address);
                self.state_tx.send_if_modified(|state| {
                    let stale = *state == ConnectionState::Connecting;
                    if stale {
                        *state = ConnectionState::Disconnected;
                    }
                    stale
                });
                Err(ConnectionError::Cancelled)
            }
            Err(e) => {
                ErrorReporter::error(&e, &format!("connecting to {}", device.address));
                self.state_tx.send_replace(ConnectionState::Disconnected);
                self.error_tx
                    .send_replace(Some(ErrorReporter::to_user_message(&e)));
                Err(e)
            }
        }
    }

    /// Closes the connection and cancels any attempt in flight.
    ///
    /// Idempotent. Close failures are reported to the log, never to the caller.
    ///
    /// # Errors
    ///
    /// Currently always succeeds.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        debug!("Disconnecting from device");
        self.cancel.notify_waiters();
        self.teardown().await;
        self.error_tx.send_replace(None);
        Ok(())
    }

    /// Whether the state is `Connected` and the channel reports itself open.
    pub async fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
            && self
                .channel
                .lock()
                .await
                .as_ref()
                .is_some_and(DataChannel::is_open)
    }

    /// Service and strategy of the live channel.
    pub async fn active_channel(&self) -> Option<(ServiceId, ChannelStrategy)> {
        self.channel
            .lock()
            .await
            .as_ref()
            .map(|channel| (channel.service(), channel.strategy()))
    }

    /// Writes `data` to the connected device and flushes it.
    ///
    /// # Errors
    ///
    /// `NotConnected` without an open channel; `Io` when the write fails.
    pub async fn send_data(&self, data: &[u8]) -> Result<(), ConnectionError> {
        let mut slot = self.channel.lock().await;

        match slot.as_ref().map(DataChannel::is_open) {
            Some(true) => {}
            Some(false) => {
                let stale = slot.take();
                drop(slot);
                self.connection_lost(stale);
                return Err(ConnectionError::NotConnected);
            }
            None => return Err(ConnectionError::NotConnected),
        }

        let Some(channel) = slot.as_mut() else {
            return Err(ConnectionError::NotConnected);
        };
        channel.send(data).await.map_err(|e| {
            error!("Failed to send data: {e}");
            ConnectionError::Io(e)
        })
    }

    /// Sends a UTF-8 string.
    ///
    /// # Errors
    ///
    /// See [`DeviceConnector::send_data`].
    pub async fn send_text(&self, text: &str) -> Result<(), ConnectionError> {
        self.send_data(text.as_bytes()).await?;
        debug!("Data sent successfully: {text}");
        Ok(())
    }

    /// Reads the next chunk from the connected device.
    ///
    /// # Errors
    ///
    /// `NotConnected` without an open channel; `Io` when the read fails.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        let mut slot = self.channel.lock().await;
        let Some(channel) = slot.as_mut().filter(|channel| channel.is_open()) else {
            return Err(ConnectionError::NotConnected);
        };
        Ok(channel.receive(buf).await?)
    }

    /// Current bonding state of `device`.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if the radio cannot resolve the address.
    pub fn bond_state(&self, device: &RemoteDevice) -> Result<BondState, ConnectionError> {
        Ok(self.lookup(device)?.bond_state())
    }

    /// Bonds with `device` unless it already is.
    ///
    /// Polls the bond state at the configured interval while bonding is in
    /// progress. Returns whether the device ended up bonded; a device still
    /// bonding when the poll budget is spent yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// `PermissionDenied`, `DeviceNotFound`, or `PairingFailed` when bonding
    /// cannot be initiated.
    pub async fn pair_device(&self, device: &RemoteDevice) -> Result<bool, ConnectionError> {
        if !self.radio.has_connect_permission() {
            return Err(ConnectionError::PermissionDenied);
        }

        let endpoint = self.lookup(device)?;
        if endpoint.bond_state() == BondState::Bonded {
            debug!("Device already paired");
            return Ok(true);
        }

        debug!("Starting pairing process with {}", device.address);
        if !endpoint.create_bond() {
            return Err(ConnectionError::PairingFailed {
                reason: "Failed to initiate pairing".to_string(),
            });
        }

        let mut polls = 0;
        while endpoint.bond_state() == BondState::Bonding && polls < self.config.bond_poll_limit {
            sleep(self.config.bond_poll_interval()).await;
            polls += 1;
        }

        let bonded = endpoint.bond_state() == BondState::Bonded;
        debug!(polls, "Pairing result: {bonded}");
        Ok(bonded)
    }

    /// Disconnects and retires the connector; later connects return `Released`.
    pub async fn release(&self) {
        debug!("Releasing resources");
        self.released.store(true, SeqCst);
        if let Err(e) = self.disconnect().await {
            ErrorReporter::warn(&e, "release");
        }
    }

    /// Fails fast on missing permission or a disabled radio.
    fn check_preconditions(&self) -> Result<(), ConnectionError> {
        if !self.radio.has_connect_permission() {
            return Err(ConnectionError::PermissionDenied);
        }
        if !self.radio.is_enabled() {
            return Err(ConnectionError::RadioUnavailable);
        }
        Ok(())
    }

    fn lookup(&self, device: &RemoteDevice) -> Result<Arc<dyn RemoteEndpoint>, ConnectionError> {
        self.radio
            .lookup(&device.address)
            .ok_or_else(|| ConnectionError::DeviceNotFound {
                address: device.address.clone(),
            })
    }

    /// Runs the rounds over the candidate list until one service connects.
    async fn connect_with_retry(&self, device: &RemoteDevice) -> Result<(), ConnectionError> {
        let endpoint = self.lookup(device)?;

        // Discovery running concurrently degrades connection reliability.
        self.radio.cancel_discovery();
        sleep(self.config.discovery_settle()).await;

        let candidates = candidate_services(&endpoint.advertised_services(), device.device_type);
        debug!("Trying {} services for connection", candidates.len());

        let rounds = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=rounds {
            debug!("Connection attempt {attempt}/{rounds}");

            for (index, service) in candidates.iter().copied().enumerate() {
                debug!("Trying service {}/{}: {service}", index + 1, candidates.len());

                match self.attempt_service(endpoint.as_ref(), service).await {
                    Ok(channel) => {
                        self.establish(device, channel).await;
                        info!("Successfully connected to {}", device.name);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("{e}");
                        last_error = Some(e);
                    }
                }
            }

            if attempt < rounds {
                sleep(self.config.retry_delay()).await;
            }
        }

        Err(ConnectionError::AllAttemptsExhausted {
            rounds,
            last: last_error.map(Box::new),
        })
    }

    /// Creates and connects a channel to one service.
    async fn attempt_service(
        &self,
        endpoint: &dyn RemoteEndpoint,
        service: ServiceId,
    ) -> Result<DataChannel, ConnectionError> {
        let (channel, strategy) = self.create_channel(endpoint, service)?;
        let mut pending = PendingChannel::new(channel, service);

        match pending.connect(self.config.connect_timeout()).await {
            Ok(Ok(())) if pending.is_open() => pending
                .into_connected()
                .map(|channel| DataChannel::new(channel, service, strategy))
                .ok_or(ConnectionError::ChannelNotOpen { service }),
            Ok(Ok(())) => Err(ConnectionError::ChannelNotOpen { service }),
            Ok(Err(source)) => Err(ConnectionError::ConnectFailed { service, source }),
            Err(_) => Err(ConnectionError::AttemptTimedOut {
                service,
                timeout_ms: self.config.connect_timeout_ms,
            }),
        }
    }

    /// Walks the strategy chain until one creates a channel.
    fn create_channel(
        &self,
        endpoint: &dyn RemoteEndpoint,
        service: ServiceId,
    ) -> Result<(Box<dyn Channel>, ChannelStrategy), ConnectionError> {
        let mut last = None;

        for strategy in ChannelStrategy::fallback_chain(self.config.raw_channel_port) {
            debug!("Creating {strategy} channel");
            match endpoint.create_channel(strategy, service) {
                Ok(channel) => return Ok((channel, strategy)),
                Err(e) => {
                    warn!("{strategy} channel failed for {service}: {e}");
                    last = Some(e);
                }
            }
        }

        Err(ConnectionError::ChannelCreationFailed {
            service,
            source: last.unwrap_or_else(|| IoError::other("no channel strategy available")),
        })
    }

    /// Stores a connected channel and publishes `Connected`.
    async fn establish(&self, device: &RemoteDevice, channel: DataChannel) {
        let mut slot = self.channel.lock().await;
        if let Some(stale) = slot.replace(channel) {
            Self::close_reporting(stale);
        }
        self.device_tx.send_replace(Some(device.clone()));
        self.state_tx.send_replace(ConnectionState::Connected);
    }

    /// Closes the channel, clears the device and publishes `Disconnected`.
    async fn teardown(&self) {
        if let Some(channel) = self.channel.lock().await.take() {
            Self::close_reporting(channel);
        }
        self.device_tx.send_replace(None);
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Drops a channel found closed while the state still said `Connected`.
    fn connection_lost(&self, stale: Option<DataChannel>) {
        warn!("Channel closed underneath an active connection");
        if let Some(channel) = stale {
            Self::close_reporting(channel);
        }
        self.device_tx.send_replace(None);
        self.state_tx.send_replace(ConnectionState::Disconnected);
        self.error_tx.send_replace(Some("Connection lost".to_string()));
    }

    fn close_reporting(channel: DataChannel) {
        let service = channel.service();
        if let Err(e) = channel.close() {
            ErrorReporter::warn(&e, &format!("closing channel for {service}"));
        }
    }
}

/// A channel whose connect has not succeeded yet.
///
/// Closed on drop unless handed over with `into_connected`, so failed, timed
/// out and cancelled attempts all release the platform socket.
struct PendingChannel {
    channel: Option<Box<dyn Channel>>,
    service: ServiceId,
}

impl PendingChannel {
    fn new(channel: Box<dyn Channel>, service: ServiceId) -> Self {
        Self {
            channel: Some(channel),
            service,
        }
    }

    async fn connect(&mut self, limit: Duration) -> Result<IoResult<()>, Elapsed> {
        let Some(channel) = self.channel.as_mut() else {
            return Ok(Err(IoError::other("channel already handed over")));
        };
        timeout(limit, channel.connect()).await
    }

    fn is_open(&self) -> bool {
        self.channel.as_ref().is_some_and(|channel| channel.is_open())
    }

    fn into_connected(mut self) -> Option<Box<dyn Channel>> {
        self.channel.take()
    }
}

impl Drop for PendingChannel {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.as_mut()
            && let Err(e) = channel.close()
        {
            ErrorReporter::debug(&e, &format!("closing failed channel for {}", self.service));
        }
    }
}

//! In-memory radio backend.
//!
//! Lets the connection subsystem run without radio hardware: every device,
//! channel and bonding outcome is scripted, and every channel records what
//! happened to it.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    future::pending,
    io::{
        Error,
        ErrorKind::{ConnectionRefused, NotConnected, Unsupported},
        Result as IoResult,
    },
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
    },
};

use {async_trait::async_trait, parking_lot::Mutex, tracing::debug};

use crate::bluetooth::{
    device::BondState,
    platform::{Channel, ChannelStrategy, Radio, RemoteEndpoint},
    service_id::ServiceId,
};

/// What a loopback channel does when connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Connects and reports open.
    Accept,
    /// Fails with `ConnectionRefused`.
    Refuse,
    /// Never completes; only a timeout ends the attempt.
    Hang,
    /// Completes but reports closed.
    OpenClosed,
}

/// How bonding progresses after `create_bond`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondScript {
    /// `create_bond` returns `false`.
    Refuse,
    /// Bonded after the given number of state reads.
    BondAfterReads(u32),
    /// Falls back to `None` after the given number of state reads.
    RejectAfterReads(u32),
    /// Stays `Bonding` forever.
    NeverComplete,
}

/// Shared record of one loopback channel.
#[derive(Debug)]
pub struct ChannelProbe {
    service: ServiceId,
    strategy: ChannelStrategy,
    open: AtomicBool,
    closes: AtomicUsize,
    written: Mutex<Vec<u8>>,
    inbound: Mutex<VecDeque<u8>>,
    stall_reads: AtomicBool,
}

impl ChannelProbe {
    /// Service the channel was created for.
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Strategy the channel was created with.
    #[must_use]
    pub fn strategy(&self) -> ChannelStrategy {
        self.strategy
    }

    /// Whether the channel is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(SeqCst)
    }

    /// How often `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(SeqCst)
    }

    /// Everything written so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    /// Queues bytes for the local side to read.
    pub fn push_inbound(&self, data: &[u8]) {
        self.inbound.lock().extend(data.iter().copied());
    }

    /// Makes reads on an empty inbound queue block instead of returning 0.
    pub fn stall_reads(&self) {
        self.stall_reads.store(true, SeqCst);
    }

    /// Simulates the remote side dropping the link.
    pub fn drop_link(&self) {
        self.open.store(false, SeqCst);
    }
}

struct LoopbackChannel {
    probe: Arc<ChannelProbe>,
    behavior: ConnectBehavior,
}

#[async_trait]
impl Channel for LoopbackChannel {
    async fn connect(&mut self) -> IoResult<()> {
        match self.behavior {
            ConnectBehavior::Accept => {
                self.probe.open.store(true, SeqCst);
                Ok(())
            }
            ConnectBehavior::Refuse => Err(Error::new(
                ConnectionRefused,
                format!("{} refused", self.probe.service),
            )),
            ConnectBehavior::Hang => pending().await,
            ConnectBehavior::OpenClosed => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.probe.is_open()
    }

    async fn write_all(&mut self, data: &[u8]) -> IoResult<()> {
        if !self.probe.is_open() {
            return Err(Error::new(NotConnected, "loopback channel closed"));
        }
        self.probe.written.lock().extend_from_slice(data);
        Ok(())
    }

    async fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if self.probe.stall_reads.load(SeqCst) && self.probe.inbound.lock().is_empty() {
            return pending().await;
        }
        let mut inbound = self.probe.inbound.lock();
        let count = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn close(&mut self) -> IoResult<()> {
        self.probe.open.store(false, SeqCst);
        self.probe.closes.fetch_add(1, SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct BondProgress {
    state: BondState,
    script: BondScript,
    reads: u32,
}

/// A scripted remote device.
#[derive(Debug)]
pub struct LoopbackEndpoint {
    address: String,
    advertised: Vec<ServiceId>,
    default_behavior: Mutex<ConnectBehavior>,
    behaviors: Mutex<HashMap<ServiceId, ConnectBehavior>>,
    failing_strategies: Mutex<HashSet<ChannelStrategy>>,
    bond: Mutex<BondProgress>,
    channels: Mutex<Vec<Arc<ChannelProbe>>>,
}

impl LoopbackEndpoint {
    /// Creates an unbonded endpoint whose channels all accept.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            advertised: Vec::new(),
            default_behavior: Mutex::new(ConnectBehavior::Accept),
            behaviors: Mutex::new(HashMap::new()),
            failing_strategies: Mutex::new(HashSet::new()),
            bond: Mutex::new(BondProgress {
                state: BondState::None,
                script: BondScript::BondAfterReads(1),
                reads: 0,
            }),
            channels: Mutex::new(Vec::new()),
        }
    }

    /// Sets the advertised services.
    #[must_use]
    pub fn with_advertised(mut self, services: Vec<ServiceId>) -> Self {
        self.advertised = services;
        self
    }

    /// Sets how channels behave unless a service override exists.
    #[must_use]
    pub fn with_default_behavior(self, behavior: ConnectBehavior) -> Self {
        self.set_default_behavior(behavior);
        self
    }

    /// Overrides the behaviour for one service.
    #[must_use]
    pub fn with_behavior(self, service: ServiceId, behavior: ConnectBehavior) -> Self {
        self.behaviors.lock().insert(service, behavior);
        self
    }

    /// Makes a creation strategy fail for every service.
    #[must_use]
    pub fn with_failing_strategy(self, strategy: ChannelStrategy) -> Self {
        self.failing_strategies.lock().insert(strategy);
        self
    }

    /// Sets the initial bond state and how bonding proceeds.
    #[must_use]
    pub fn with_bonding(self, state: BondState, script: BondScript) -> Self {
        {
            let mut bond = self.bond.lock();
            bond.state = state;
            bond.script = script;
        }
        self
    }

    /// Changes the default channel behaviour.
    pub fn set_default_behavior(&self, behavior: ConnectBehavior) {
        *self.default_behavior.lock() = behavior;
    }

    /// Every channel created so far, oldest first.
    #[must_use]
    pub fn channels(&self) -> Vec<Arc<ChannelProbe>> {
        self.channels.lock().clone()
    }

    fn behavior_for(&self, service: ServiceId) -> ConnectBehavior {
        self.behaviors
            .lock()
            .get(&service)
            .copied()
            .unwrap_or(*self.default_behavior.lock())
    }
}

impl RemoteEndpoint for LoopbackEndpoint {
    fn address(&self) -> &str {
        &self.address
    }

    fn advertised_services(&self) -> Vec<ServiceId> {
        self.advertised.clone()
    }

    fn bond_state(&self) -> BondState {
        let mut bond = self.bond.lock();
        if bond.state == BondState::Bonding {
            bond.reads += 1;
            let (reads, script) = (bond.reads, bond.script);
            match script {
                BondScript::BondAfterReads(limit) if reads >= limit => {
                    bond.state = BondState::Bonded;
                }
                BondScript::RejectAfterReads(limit) if reads >= limit => {
                    bond.state = BondState::None;
                }
                _ => {}
            }
        }
        bond.state
    }

    fn create_bond(&self) -> bool {
        let mut bond = self.bond.lock();
        if bond.script == BondScript::Refuse {
            return false;
        }
        bond.state = BondState::Bonding;
        bond.reads = 0;
        true
    }

    fn create_channel(
        &self,
        strategy: ChannelStrategy,
        service: ServiceId,
    ) -> IoResult<Box<dyn Channel>> {
        if self.failing_strategies.lock().contains(&strategy) {
            return Err(Error::new(
                Unsupported,
                format!("{strategy} channels unavailable"),
            ));
        }

        let probe = Arc::new(ChannelProbe {
            service,
            strategy,
            open: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            inbound: Mutex::new(VecDeque::new()),
            stall_reads: AtomicBool::new(false),
        });
        self.channels.lock().push(Arc::clone(&probe));
        debug!(address = %self.address, %service, %strategy, "Loopback channel created");

        Ok(Box::new(LoopbackChannel {
            probe,
            behavior: self.behavior_for(service),
        }))
    }
}

/// A scripted local radio.
#[derive(Debug)]
pub struct LoopbackRadio {
    permission: AtomicBool,
    enabled: AtomicBool,
    discovery_cancels: AtomicUsize,
    devices: Mutex<HashMap<String, Arc<LoopbackEndpoint>>>,
}

impl Default for LoopbackRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRadio {
    /// Creates an enabled radio with the connect permission granted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            permission: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
            discovery_cancels: AtomicUsize::new(0),
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Makes a device reachable.
    pub fn add_device(&self, endpoint: Arc<LoopbackEndpoint>) {
        self.devices
            .lock()
            .insert(endpoint.address.clone(), endpoint);
    }

    /// Grants or revokes the connect permission.
    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, SeqCst);
    }

    /// Switches the radio on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, SeqCst);
    }

    /// How often discovery was cancelled.
    #[must_use]
    pub fn discovery_cancels(&self) -> usize {
        self.discovery_cancels.load(SeqCst)
    }
}

impl Radio for LoopbackRadio {
    fn has_connect_permission(&self) -> bool {
        self.permission.load(SeqCst)
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(SeqCst)
    }

    fn cancel_discovery(&self) {
        self.discovery_cancels.fetch_add(1, SeqCst);
    }

    fn lookup(&self, address: &str) -> Option<Arc<dyn RemoteEndpoint>> {
        self.devices
            .lock()
            .get(address)
            .map(|endpoint| Arc::clone(endpoint) as Arc<dyn RemoteEndpoint>)
    }
}

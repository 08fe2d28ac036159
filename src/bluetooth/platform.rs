//! Platform seams of the connection subsystem.
//!
//! A radio stack plugs in by implementing [`Radio`], [`RemoteEndpoint`] and
//! [`Channel`]. The connector never touches platform handles directly.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Result as IoResult,
    sync::Arc,
};

use async_trait::async_trait;

use crate::bluetooth::{device::BondState, service_id::ServiceId};

/// How a channel to a service is created.
///
/// Strategies are tried in order for every candidate service; see
/// [`ChannelStrategy::fallback_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelStrategy {
    /// Authenticated and encrypted channel bound to the service record.
    Secure,
    /// Unauthenticated channel bound to the service record.
    Insecure,
    /// Channel opened directly on a fixed port, bypassing the service lookup.
    RawPort(u8),
}

impl ChannelStrategy {
    /// Creation order for one candidate service.
    #[must_use]
    pub fn fallback_chain(raw_port: u8) -> [Self; 3] {
        [Self::Secure, Self::Insecure, Self::RawPort(raw_port)]
    }
}

impl Display for ChannelStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Secure => write!(f, "secure"),
            Self::Insecure => write!(f, "insecure"),
            Self::RawPort(port) => write!(f, "raw port {port}"),
        }
    }
}

/// A bidirectional byte stream to a remote device.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Establishes the connection. May block for a long time; callers bound it
    /// with a timeout.
    async fn connect(&mut self) -> IoResult<()>;

    /// Whether the channel is connected and usable.
    fn is_open(&self) -> bool;

    /// Writes the whole buffer.
    async fn write_all(&mut self, data: &[u8]) -> IoResult<()>;

    /// Flushes buffered output.
    async fn flush(&mut self) -> IoResult<()>;

    /// Reads into `buf`, returning the number of bytes read.
    async fn read(&mut self, buf: &mut [u8]) -> IoResult<usize>;

    /// Closes the channel. Closing twice is allowed.
    fn close(&mut self) -> IoResult<()>;
}

/// A remote device as seen by the local radio.
pub trait RemoteEndpoint: Send + Sync {
    /// Hardware address.
    fn address(&self) -> &str;

    /// Service identifiers the device advertised, possibly empty.
    fn advertised_services(&self) -> Vec<ServiceId>;

    /// Current bonding state.
    fn bond_state(&self) -> BondState;

    /// Starts bonding. Returns `false` if bonding could not be initiated;
    /// progress is observed through [`RemoteEndpoint::bond_state`].
    fn create_bond(&self) -> bool;

    /// Creates an unconnected channel to `service` using `strategy`.
    ///
    /// # Errors
    ///
    /// Returns the platform error when the strategy is unsupported or fails.
    fn create_channel(
        &self,
        strategy: ChannelStrategy,
        service: ServiceId,
    ) -> IoResult<Box<dyn Channel>>;
}

/// The local radio adapter.
pub trait Radio: Send + Sync {
    /// Whether the process holds the connect permission.
    fn has_connect_permission(&self) -> bool;

    /// Whether the radio is switched on.
    fn is_enabled(&self) -> bool;

    /// Stops any running discovery scan.
    fn cancel_discovery(&self);

    /// Resolves a remote device by address.
    fn lookup(&self, address: &str) -> Option<Arc<dyn RemoteEndpoint>>;
}

#[cfg(test)]
mod tests {
    use crate::bluetooth::platform::ChannelStrategy;

    #[test]
    fn test_fallback_chain_order() {
        assert_eq!(
            ChannelStrategy::fallback_chain(1),
            [
                ChannelStrategy::Secure,
                ChannelStrategy::Insecure,
                ChannelStrategy::RawPort(1),
            ]
        );
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(ChannelStrategy::Secure.to_string(), "secure");
        assert_eq!(ChannelStrategy::RawPort(3).to_string(), "raw port 3");
    }
}

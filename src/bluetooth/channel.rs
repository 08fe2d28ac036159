//! Send/receive wrapper over an established channel.

use std::io::{Error, ErrorKind::NotConnected, Result as IoResult};

use tracing::debug;

use crate::bluetooth::{
    platform::{Channel, ChannelStrategy},
    service_id::ServiceId,
};

/// The live connection owned by the connector.
///
/// Remembers which service and strategy produced the channel so they can be
/// reported; all I/O goes straight to the platform channel.
pub struct DataChannel {
    channel: Box<dyn Channel>,
    service: ServiceId,
    strategy: ChannelStrategy,
}

impl DataChannel {
    /// Wraps a connected channel.
    pub fn new(channel: Box<dyn Channel>, service: ServiceId, strategy: ChannelStrategy) -> Self {
        Self {
            channel,
            service,
            strategy,
        }
    }

    /// Service the channel is bound to.
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Strategy that created the channel.
    #[must_use]
    pub fn strategy(&self) -> ChannelStrategy {
        self.strategy
    }

    /// Whether the underlying channel reports itself open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Writes `data` and flushes it.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` on a closed channel, or the platform write/flush error.
    pub async fn send(&mut self, data: &[u8]) -> IoResult<()> {
        if !self.channel.is_open() {
            return Err(Error::new(NotConnected, "channel is closed"));
        }
        self.channel.write_all(data).await?;
        self.channel.flush().await?;
        debug!(service = %self.service, bytes = data.len(), "Data sent");
        Ok(())
    }

    /// Reads the next chunk into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` on a closed channel, or the platform read error.
    pub async fn receive(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if !self.channel.is_open() {
            return Err(Error::new(NotConnected, "channel is closed"));
        }
        self.channel.read(buf).await
    }

    /// Closes the channel.
    ///
    /// # Errors
    ///
    /// Returns the platform close error.
    pub fn close(mut self) -> IoResult<()> {
        self.channel.close()
    }
}

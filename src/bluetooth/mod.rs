//! Outbound device connections.
//!
//! Provides the connection state machine with retry and service fallback,
//! the data channel wrapper, the observable facade, and an in-memory
//! backend for running without radio hardware.

pub mod channel;
pub mod connector;
pub mod device;
pub mod loopback;
pub mod platform;
pub mod service;
pub mod service_id;


pub use {
    channel::DataChannel,
    connector::{ConnectionState, DeviceConnector},
    device::{BondState, DeviceType, RemoteDevice},
    platform::{Channel, ChannelStrategy, Radio, RemoteEndpoint},
    service::ConnectionService,
    service_id::{ServiceId, candidate_services},
};

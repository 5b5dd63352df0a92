//! Engine interface.
//!
//! A [`Channel`] is one engine session bound to the hub's runtime. Every
//! query method takes a [`Completion`] and returns immediately; the engine
//! delivers the outcome into the completion from its own task. A query that
//! cannot even be started (destroyed channel, unparseable argument) fails
//! synchronously with an [`EngineError`].

use super::params::ChannelParams;
use super::types::{AddressFamily, HostEnt, SockType};
use crate::base::neterror::NetError;
use crate::hub::waiter::Completion;
use crate::hub::Hub;
use std::{fmt, net::SocketAddr, sync::Arc};
use thiserror::Error;

/// Engine status codes, numbered after c-ares.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EngineError {
    #[error("DNS server returned answer with no data")]
    NoData,
    #[error("DNS server claims query was misformatted")]
    FormErr,
    #[error("DNS server returned general failure")]
    ServFail,
    #[error("Domain name not found")]
    NotFound,
    #[error("DNS server does not implement requested operation")]
    NotImp,
    #[error("DNS server refused query")]
    Refused,
    #[error("Misformatted domain name")]
    BadName,
    #[error("Unsupported address family")]
    BadFamily,
    #[error("Could not contact DNS servers")]
    ConnRefused,
    #[error("Timeout while contacting DNS servers")]
    Timeout,
    #[error("Out of memory")]
    NoMem,
    #[error("Channel is being destroyed")]
    Destruction,
    #[error("Invalid flags specified")]
    BadFlags,
    #[error("Given hostname is not numeric")]
    NoName,
    #[error("Invalid hints")]
    BadHints,
    #[error("Query was cancelled")]
    Cancelled,
    #[error("Unknown service")]
    Service,
    #[error("illegal IP address string: {0:?}")]
    InvalidIp(String),
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// The c-ares status number.
    pub fn status(&self) -> i32 {
        match self {
            EngineError::NoData => 1,
            EngineError::FormErr => 2,
            EngineError::ServFail => 3,
            EngineError::NotFound => 4,
            EngineError::NotImp => 5,
            EngineError::Refused => 6,
            EngineError::BadName => 8,
            EngineError::BadFamily => 9,
            EngineError::ConnRefused => 11,
            EngineError::Timeout => 12,
            EngineError::NoMem => 15,
            EngineError::Destruction => 16,
            EngineError::BadFlags => 18,
            EngineError::NoName => 19,
            EngineError::BadHints => 20,
            EngineError::Cancelled => 24,
            EngineError::Service => 25,
            EngineError::InvalidIp(_) | EngineError::Other(_) => -1,
        }
    }
}

/// One address record as the engine reports it. Socket type and protocol
/// are frequently missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAddrInfo {
    pub family: AddressFamily,
    pub socktype: Option<SockType>,
    pub protocol: Option<i32>,
    pub canonname: String,
    pub sockaddr: SocketAddr,
}

/// Name-info answer. The engine leaves `service` empty when it did not
/// produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineNameInfo {
    pub node: String,
    pub service: Option<String>,
}

/// Arguments of an address-info query after input normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrInfoQuery {
    pub host: Vec<u8>,
    pub service: Option<Vec<u8>>,
    pub family: AddressFamily,
    pub socktype: Option<SockType>,
    pub protocol: i32,
    pub flags: i32,
}

/// An engine session.
pub trait Channel: Send + Sync + fmt::Debug {
    fn gethostbyname(
        &self,
        done: Completion<HostEnt>,
        name: &[u8],
        family: AddressFamily,
    ) -> Result<(), EngineError>;

    fn getaddrinfo(
        &self,
        done: Completion<Vec<EngineAddrInfo>>,
        query: AddrInfoQuery,
    ) -> Result<(), EngineError>;

    /// Reverse lookup. `addr` must be an IP literal; anything else fails
    /// synchronously with [`EngineError::InvalidIp`].
    fn gethostbyaddr(&self, done: Completion<HostEnt>, addr: &[u8])
        -> Result<(), EngineError>;

    fn getnameinfo(
        &self,
        done: Completion<EngineNameInfo>,
        addr: SocketAddr,
        flags: i32,
    ) -> Result<(), EngineError>;

    /// Tears the session down. Outstanding queries complete with
    /// [`EngineError::Destruction`] and later calls fail synchronously.
    fn destroy(&self);
}

/// Builds channels from a parameter snapshot.
pub trait ChannelFactory: Send + Sync {
    fn create(&self, hub: &Hub, params: &ChannelParams) -> Result<Arc<dyn Channel>, NetError>;
}

impl<F: ChannelFactory + ?Sized> ChannelFactory for Arc<F> {
    fn create(&self, hub: &Hub, params: &ChannelParams) -> Result<Arc<dyn Channel>, NetError> {
        (**self).create(hub, params)
    }
}

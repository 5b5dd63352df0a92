//! Argument and result types of the resolver operations.

use std::{
    fmt,
    net::{IpAddr, SocketAddr, SocketAddrV6},
};

pub const IPPROTO_TCP: i32 = libc::IPPROTO_TCP;
pub const IPPROTO_UDP: i32 = libc::IPPROTO_UDP;

pub const AI_PASSIVE: i32 = libc::AI_PASSIVE;
pub const AI_CANONNAME: i32 = libc::AI_CANONNAME;
pub const AI_NUMERICHOST: i32 = libc::AI_NUMERICHOST;
pub const AI_NUMERICSERV: i32 = libc::AI_NUMERICSERV;

pub const NI_NUMERICHOST: i32 = libc::NI_NUMERICHOST;
pub const NI_NUMERICSERV: i32 = libc::NI_NUMERICSERV;
pub const NI_NOFQDN: i32 = libc::NI_NOFQDN;
pub const NI_NAMEREQD: i32 = libc::NI_NAMEREQD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    #[default]
    Unspec,
    Inet,
    Inet6,
}

impl AddressFamily {
    pub fn as_raw(self) -> i32 {
        match self {
            AddressFamily::Unspec => libc::AF_UNSPEC,
            AddressFamily::Inet => libc::AF_INET,
            AddressFamily::Inet6 => libc::AF_INET6,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            libc::AF_UNSPEC => Some(AddressFamily::Unspec),
            libc::AF_INET => Some(AddressFamily::Inet),
            libc::AF_INET6 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    /// Whether `addr` belongs to this family; `Unspec` admits both.
    pub fn admits(self, addr: &IpAddr) -> bool {
        self == AddressFamily::Unspec || self == Self::of(addr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SockType {
    Stream,
    Dgram,
    Raw,
}

impl SockType {
    pub fn as_raw(self) -> i32 {
        match self {
            SockType::Stream => libc::SOCK_STREAM,
            SockType::Dgram => libc::SOCK_DGRAM,
            SockType::Raw => libc::SOCK_RAW,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            libc::SOCK_STREAM => Some(SockType::Stream),
            libc::SOCK_DGRAM => Some(SockType::Dgram),
            libc::SOCK_RAW => Some(SockType::Raw),
            _ => None,
        }
    }
}

/// A hostname argument.
///
/// Callers may pass text, raw bytes or nothing; anything else is carried as
/// `Unsupported` with the name of the offending type so the resolver can
/// reject it with a type error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostArg {
    Text(String),
    Bytes(Vec<u8>),
    None,
    Unsupported(&'static str),
}

impl From<&str> for HostArg {
    fn from(value: &str) -> Self {
        HostArg::Text(value.to_string())
    }
}

impl From<String> for HostArg {
    fn from(value: String) -> Self {
        HostArg::Text(value)
    }
}

impl From<&[u8]> for HostArg {
    fn from(value: &[u8]) -> Self {
        HostArg::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for HostArg {
    fn from(value: &[u8; N]) -> Self {
        HostArg::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for HostArg {
    fn from(value: Vec<u8>) -> Self {
        HostArg::Bytes(value)
    }
}

impl From<IpAddr> for HostArg {
    fn from(value: IpAddr) -> Self {
        HostArg::Text(value.to_string())
    }
}

impl<T: Into<HostArg>> From<Option<T>> for HostArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostArg::None, Into::into)
    }
}

/// A port or service argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortArg {
    Int(i64),
    Text(String),
    None,
    Unsupported(&'static str),
}

impl From<u16> for PortArg {
    fn from(value: u16) -> Self {
        PortArg::Int(value.into())
    }
}

impl From<i32> for PortArg {
    fn from(value: i32) -> Self {
        PortArg::Int(value.into())
    }
}

impl From<u32> for PortArg {
    fn from(value: u32) -> Self {
        PortArg::Int(value.into())
    }
}

impl From<i64> for PortArg {
    fn from(value: i64) -> Self {
        PortArg::Int(value)
    }
}

impl From<&str> for PortArg {
    fn from(value: &str) -> Self {
        PortArg::Text(value.to_string())
    }
}

impl From<String> for PortArg {
    fn from(value: String) -> Self {
        PortArg::Text(value)
    }
}

/// Socket address argument of `getnameinfo`: `(host, port)` for IPv4 and
/// `(host, port[, flowinfo[, scope_id]])` for IPv6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfoAddr {
    pub host: HostArg,
    pub port: i64,
    pub flowinfo: Option<u32>,
    pub scope_id: Option<u32>,
}

impl NameInfoAddr {
    /// A two-element `(host, port)` address.
    pub fn new(host: impl Into<HostArg>, port: i64) -> Self {
        Self { host: host.into(), port, flowinfo: None, scope_id: None }
    }

    /// A four-element IPv6 address.
    pub fn v6(host: impl Into<HostArg>, port: i64, flowinfo: u32, scope_id: u32) -> Self {
        Self { host: host.into(), port, flowinfo: Some(flowinfo), scope_id: Some(scope_id) }
    }

    pub fn with_flowinfo(mut self, flowinfo: u32) -> Self {
        self.flowinfo = Some(flowinfo);
        self
    }

    pub fn with_scope_id(mut self, scope_id: u32) -> Self {
        self.flowinfo = Some(self.flowinfo.unwrap_or(0));
        self.scope_id = Some(scope_id);
        self
    }

    /// Number of tuple elements this address carries.
    pub fn len(&self) -> usize {
        2 + usize::from(self.flowinfo.is_some()) + usize::from(self.scope_id.is_some())
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl From<SocketAddr> for NameInfoAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::new(IpAddr::V4(*v4.ip()), v4.port().into()),
            SocketAddr::V6(v6) => {
                Self::v6(IpAddr::V6(*v6.ip()), v6.port().into(), v6.flowinfo(), v6.scope_id())
            }
        }
    }
}

/// Hints for `getaddrinfo`. Unset fields mean "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddrInfoHints {
    pub family: AddressFamily,
    pub socktype: Option<SockType>,
    pub protocol: i32,
    pub flags: i32,
}

impl AddrInfoHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    pub fn socktype(mut self, socktype: SockType) -> Self {
        self.socktype = Some(socktype);
        self
    }

    pub fn protocol(mut self, protocol: i32) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }
}

/// One `getaddrinfo` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrInfo {
    pub family: AddressFamily,
    pub socktype: SockType,
    pub protocol: i32,
    pub canonname: String,
    pub sockaddr: SocketAddr,
}

/// `(hostname, aliaslist, ipaddrlist)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnt {
    pub name: String,
    pub aliases: Vec<String>,
    pub addresses: Vec<IpAddr>,
}

/// `(node, service)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfo {
    pub node: String,
    pub service: String,
}

impl fmt::Display for NameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node, self.service)
    }
}

/// Rebuilds an IPv6 socket address with the caller's flow info and scope id.
pub(crate) fn with_flow(addr: SocketAddr, flowinfo: Option<u32>, scope_id: Option<u32>) -> SocketAddr {
    match addr {
        SocketAddr::V6(v6) => SocketAddr::V6(SocketAddrV6::new(
            *v6.ip(),
            v6.port(),
            flowinfo.unwrap_or(0),
            scope_id.unwrap_or(0),
        )),
        v4 => v4,
    }
}

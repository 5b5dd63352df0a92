//! Argument normalization.
//!
//! Everything the engine receives goes through here first: hostnames become
//! IDNA-encoded bytes, ports become optional ASCII service strings, and
//! name-info socket addresses are range-checked. Names that must be answered
//! exactly like the platform resolver are routed to the native bypass.

use super::types::{HostArg, NameInfoAddr, PortArg, AI_NUMERICHOST};
use crate::base::neterror::NetError;

/// Names `getaddrinfo` hands to the native resolver.
pub const LOCAL_HOSTNAMES: &[&[u8]] = &[b"localhost", b"ip6-localhost"];

/// Names `gethostbyname_ex` hands to the native resolver.
pub const LOCAL_AND_BROADCAST_HOSTNAMES: &[&[u8]] =
    &[b"localhost", b"ip6-localhost", b"255.255.255.255", b"<broadcast>"];

/// Largest flow label an IPv6 sockaddr may carry.
pub const MAX_FLOWINFO: u32 = 0xFFFFF;

const HOST_TYPES: &str = "str, bytes or bytearray";

/// Encodes a hostname for the engine.
///
/// ASCII text is used verbatim (case preserved); other text goes through
/// IDNA.
pub fn encode_hostname(text: &str) -> Result<Vec<u8>, NetError> {
    if text.is_ascii() {
        return Ok(text.as_bytes().to_vec());
    }
    idna::domain_to_ascii(text)
        .map(String::into_bytes)
        .map_err(|_| NetError::Value(format!("encoding with 'idna' codec failed: {:?}", text)))
}

/// Coerces a hostname argument to bytes.
pub fn hostname_to_bytes(host: &HostArg) -> Result<Vec<u8>, NetError> {
    match host {
        HostArg::Text(text) => encode_hostname(text),
        HostArg::Bytes(bytes) => Ok(bytes.clone()),
        HostArg::None => Err(NetError::unsupported_type(HOST_TYPES, "NoneType")),
        HostArg::Unsupported(found) => Err(NetError::unsupported_type(HOST_TYPES, found)),
    }
}

pub fn is_local(host: &[u8]) -> bool {
    LOCAL_HOSTNAMES.contains(&host)
}

pub fn is_local_or_broadcast(host: &[u8]) -> bool {
    LOCAL_AND_BROADCAST_HOSTNAMES.contains(&host)
}

/// Where a `getaddrinfo` request is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddrInfoRoute {
    /// The native resolver answers; no network access is needed.
    Native(Option<Vec<u8>>),
    /// The engine answers.
    Engine(Vec<u8>),
}

/// Decides between the native bypass and the engine for `getaddrinfo`.
pub fn route_addr_info(host: &HostArg, flags: i32) -> Result<AddrInfoRoute, NetError> {
    let host = match host {
        HostArg::None => return Ok(AddrInfoRoute::Native(None)),
        HostArg::Unsupported(found) => {
            return Err(NetError::unsupported_type(HOST_TYPES, found));
        }
        other => hostname_to_bytes(other)?,
    };

    if flags & AI_NUMERICHOST != 0 || is_local(&host) {
        Ok(AddrInfoRoute::Native(Some(host)))
    } else {
        Ok(AddrInfoRoute::Engine(host))
    }
}

/// Coerces a port argument to the engine's service form. Zero means
/// "no service".
pub fn port_to_service(port: &PortArg) -> Result<Option<Vec<u8>>, NetError> {
    match port {
        PortArg::Int(0) | PortArg::None => Ok(None),
        PortArg::Int(n) => Ok(Some(n.to_string().into_bytes())),
        PortArg::Text(text) if text.is_ascii() => Ok(Some(text.as_bytes().to_vec())),
        PortArg::Text(text) => {
            Err(NetError::Value(format!("encoding with 'ascii' codec failed: {:?}", text)))
        }
        PortArg::Unsupported(found) => {
            Err(NetError::unsupported_type("int, str or bytes for port", found))
        }
    }
}

/// Validated `getnameinfo` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfoTarget {
    pub host: Vec<u8>,
    /// Port after clamping; out-of-range ports become 0.
    pub port: u16,
}

/// Validates a `getnameinfo` socket address.
pub fn name_info_target(addr: &NameInfoAddr) -> Result<NameInfoTarget, NetError> {
    let host = hostname_to_bytes(&addr.host)?;

    if addr.port < 0 {
        return Err(NetError::Overflow("getnameinfo(): port must be 0-65535.".to_string()));
    }
    // Platform resolvers disagree on out-of-range ports; 0 behaves like the
    // system resolver on the common platforms.
    let port = u16::try_from(addr.port).unwrap_or(0);

    if addr.flowinfo.is_some_and(|flow| flow > MAX_FLOWINFO) {
        return Err(NetError::Overflow("getnameinfo(): flowinfo must be 0-1048575.".to_string()));
    }

    Ok(NameInfoTarget { host, port })
}

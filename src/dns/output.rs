//! Result normalization.
//!
//! The engine's answers do not have the shape callers of a POSIX resolver
//! expect: address records usually lack socket type and protocol, name-info
//! answers may lack a service, and "not found" surfaces in the wrong error
//! family. These helpers reconcile each of those.

use super::channel::{EngineAddrInfo, EngineNameInfo};
use super::params::ServiceConvention;
use super::types::{
    with_flow, AddrInfo, AddressFamily, HostEnt, NameInfo, NameInfoAddr, SockType, IPPROTO_TCP,
    IPPROTO_UDP,
};
use crate::base::neterror::{NetError, EAI_NONAME, EAI_NONAME_MSG, HOST_NOT_FOUND};
use std::net::SocketAddr;

/// Default protocol for a socket type.
pub fn protocol_for(socktype: SockType) -> i32 {
    if socktype == SockType::Stream {
        IPPROTO_TCP
    } else {
        IPPROTO_UDP
    }
}

/// Default socket type for a protocol.
pub fn socktype_for(protocol: i32) -> SockType {
    if protocol == IPPROTO_TCP {
        SockType::Stream
    } else {
        SockType::Dgram
    }
}

/// The `(socktype, protocol)` pairs used to fill records that carry neither.
pub fn type_proto_pairs(socktype: Option<SockType>, protocol: i32) -> Vec<(SockType, i32)> {
    match socktype {
        Some(socktype) => vec![(socktype, protocol_for(socktype))],
        None if protocol != 0 => vec![(socktype_for(protocol), protocol)],
        None => vec![(SockType::Stream, IPPROTO_TCP), (SockType::Dgram, IPPROTO_UDP)],
    }
}

/// Fills in socket type and protocol.
///
/// A record lacking both is emitted once per pair from
/// [`type_proto_pairs`]; with nothing requested that is one stream/TCP and
/// one datagram/UDP record, the way the system resolver answers when either
/// transport is acceptable. A record lacking one field gets it derived from
/// the other. Records are not de-duplicated.
pub fn backfill(
    records: Vec<EngineAddrInfo>,
    socktype: Option<SockType>,
    protocol: i32,
) -> Vec<AddrInfo> {
    let pairs = type_proto_pairs(socktype, protocol);
    let mut out = Vec::with_capacity(records.len() * pairs.len());

    for record in records {
        let EngineAddrInfo { family, socktype: rtype, protocol: rproto, canonname, sockaddr } = record;
        let make = |socktype: SockType, protocol: i32| AddrInfo {
            family,
            socktype,
            protocol,
            canonname: canonname.clone(),
            sockaddr,
        };

        match (rtype, rproto) {
            (Some(t), Some(p)) => out.push(make(t, p)),
            (Some(t), None) => out.push(make(t, protocol_for(t))),
            (None, Some(p)) => out.push(make(socktype_for(p), p)),
            (None, None) => {
                for &(t, p) in &pairs {
                    out.push(make(t, p));
                }
            }
        }
    }
    out
}

/// An empty answer is a "name not known" error, never an empty list.
pub fn require_records<T>(records: Vec<T>) -> Result<Vec<T>, NetError> {
    if records.is_empty() {
        Err(NetError::name_not_known())
    } else {
        Ok(records)
    }
}

/// A forward answer without addresses is a host error.
pub fn require_addresses(hostent: HostEnt) -> Result<HostEnt, NetError> {
    if hostent.addresses.is_empty() {
        Err(NetError::Host { code: EAI_NONAME, message: EAI_NONAME_MSG.to_string() })
    } else {
        Ok(hostent)
    }
}

/// The engine resolves forward names through an address-info style pass,
/// so an unknown host belongs in the address-info family.
pub fn translate_forward_error(err: NetError) -> NetError {
    match err {
        NetError::Host { code: HOST_NOT_FOUND, .. } => NetError::name_not_known(),
        other => other,
    }
}

/// The single candidate a name-info target must resolve to.
pub fn single_candidate(mut records: Vec<EngineAddrInfo>) -> Result<EngineAddrInfo, NetError> {
    match records.len() {
        1 => Ok(records.remove(0)),
        0 => Err(NetError::Os("sockaddr resolved to no addresses".to_string())),
        _ => Err(NetError::Os("sockaddr resolved to multiple addresses".to_string())),
    }
}

/// The address actually handed to the engine's name-info query.
///
/// An IPv4 candidate requires a two-element caller address; an IPv6
/// candidate keeps its host and port but takes flow info and scope id from
/// the caller.
pub fn name_info_address(
    candidate: &EngineAddrInfo,
    requested: &NameInfoAddr,
) -> Result<SocketAddr, NetError> {
    match candidate.family {
        AddressFamily::Inet if requested.len() != 2 => {
            Err(NetError::Os("IPv4 sockaddr must be 2 tuple".to_string()))
        }
        AddressFamily::Inet6 => {
            Ok(with_flow(candidate.sockaddr, requested.flowinfo, requested.scope_id))
        }
        _ => Ok(candidate.sockaddr),
    }
}

/// Applies the missing-service convention.
pub fn finish_name_info(
    info: EngineNameInfo,
    convention: ServiceConvention,
) -> Result<NameInfo, NetError> {
    match (info.service, convention) {
        (Some(service), _) => Ok(NameInfo { node: info.node, service }),
        (None, ServiceConvention::Modern) => Err(NetError::name_not_known()),
        (None, ServiceConvention::Historical) => {
            Ok(NameInfo { node: info.node, service: "0".to_string() })
        }
    }
}

impl From<AddrInfo> for EngineAddrInfo {
    fn from(info: AddrInfo) -> Self {
        Self {
            family: info.family,
            socktype: Some(info.socktype),
            protocol: Some(info.protocol),
            canonname: info.canonname,
            sockaddr: info.sockaddr,
        }
    }
}

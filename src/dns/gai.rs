//! System resolver bypass using getaddrinfo.
//!
//! Special names (`localhost`, broadcast, numeric hosts, the wildcard) must
//! resolve exactly as the platform resolver resolves them and never need a
//! network round trip, so they skip the engine and are answered here,
//! synchronously, by the operating system's `getaddrinfo`.

use super::types::{AddrInfo, AddrInfoHints, AddressFamily, HostEnt, PortArg, SockType, AI_CANONNAME};
use crate::base::neterror::NetError;
use std::{
    ffi::{CStr, CString},
    io, mem,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    ptr,
};

/// The platform's synchronous resolver.
///
/// Calls are made inline on the task running the resolver operation, so
/// implementations must not block for long. Special names resolve from
/// local configuration; anything that may hit the network belongs on the
/// engine.
pub trait NativeResolver: Send + Sync {
    /// `getaddrinfo(host, port, family, socktype, proto, flags)`.
    fn getaddrinfo(
        &self,
        host: Option<&[u8]>,
        port: &PortArg,
        hints: &AddrInfoHints,
    ) -> Result<Vec<AddrInfo>, NetError>;

    /// `gethostbyname_ex(host)`; IPv4 only.
    fn gethostbyname_ex(&self, host: &[u8]) -> Result<HostEnt, NetError>;
}

/// [`NativeResolver`] backed by libc `getaddrinfo`.
#[derive(Clone, Debug, Default)]
pub struct SystemResolver;

impl SystemResolver {
    /// Creates a new `SystemResolver`.
    pub fn new() -> Self {
        Self
    }
}

impl NativeResolver for SystemResolver {
    fn getaddrinfo(
        &self,
        host: Option<&[u8]>,
        port: &PortArg,
        hints: &AddrInfoHints,
    ) -> Result<Vec<AddrInfo>, NetError> {
        let node = host.map(c_string).transpose()?;
        let service = native_service(port)?;

        tracing::debug!(
            host = ?node,
            service = ?service,
            flags = hints.flags,
            "resolving via getaddrinfo"
        );

        // SAFETY: an all-zero addrinfo is the documented "no hints" value.
        let mut raw_hints: libc::addrinfo = unsafe { mem::zeroed() };
        raw_hints.ai_family = hints.family.as_raw();
        raw_hints.ai_socktype = hints.socktype.map_or(0, SockType::as_raw);
        raw_hints.ai_protocol = hints.protocol;
        raw_hints.ai_flags = hints.flags;

        let mut res: *mut libc::addrinfo = ptr::null_mut();
        // SAFETY: node and service are NUL-terminated and outlive the call;
        // res is only read after a zero return.
        let rc = unsafe {
            libc::getaddrinfo(
                node.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                service.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                &raw_hints,
                &mut res,
            )
        };
        if rc != 0 {
            let err = if rc == libc::EAI_SYSTEM {
                NetError::Os(io::Error::last_os_error().to_string())
            } else {
                NetError::addr_info(rc)
            };
            tracing::debug!(error = %err, "getaddrinfo failed");
            return Err(err);
        }

        // SAFETY: res is the list getaddrinfo just returned; it is freed
        // exactly once, after the records were copied out.
        let records = unsafe {
            let records = collect_records(res);
            libc::freeaddrinfo(res);
            records
        };

        tracing::debug!(count = records.len(), "getaddrinfo complete");
        Ok(records)
    }

    fn gethostbyname_ex(&self, host: &[u8]) -> Result<HostEnt, NetError> {
        let host: &[u8] = if host == b"<broadcast>" { b"255.255.255.255" } else { host };
        let hints = AddrInfoHints::new()
            .family(AddressFamily::Inet)
            .socktype(SockType::Stream)
            .flags(AI_CANONNAME);
        let records = self.getaddrinfo(Some(host), &PortArg::None, &hints)?;

        let name = records
            .iter()
            .map(|r| r.canonname.as_str())
            .find(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(host).into_owned());

        let mut addresses: Vec<IpAddr> = Vec::with_capacity(records.len());
        for ip in records.iter().map(|r| r.sockaddr.ip()) {
            if !addresses.contains(&ip) {
                addresses.push(ip);
            }
        }

        Ok(HostEnt { name, aliases: Vec::new(), addresses })
    }
}

fn c_string(bytes: &[u8]) -> Result<CString, NetError> {
    CString::new(bytes).map_err(|_| NetError::Value("embedded null byte".to_string()))
}

/// The native resolver takes the port as given; zero is the service "0".
fn native_service(port: &PortArg) -> Result<Option<CString>, NetError> {
    match port {
        PortArg::None => Ok(None),
        PortArg::Int(n) => c_string(n.to_string().as_bytes()).map(Some),
        PortArg::Text(text) => c_string(text.as_bytes()).map(Some),
        PortArg::Unsupported(found) => {
            Err(NetError::Type(format!("getaddrinfo() argument 2 must be integer or string, not {}", found)))
        }
    }
}

/// Copies an addrinfo list into owned records, skipping entries whose
/// family or socket type this crate does not model.
///
/// # Safety
///
/// `cur` must be null or the head of a list returned by `getaddrinfo` that
/// has not been freed.
unsafe fn collect_records(mut cur: *const libc::addrinfo) -> Vec<AddrInfo> {
    let mut out = Vec::new();
    while let Some(ai) = cur.as_ref() {
        cur = ai.ai_next as *const libc::addrinfo;

        let (Some(family), Some(socktype), Some(sockaddr)) = (
            AddressFamily::from_raw(ai.ai_family),
            SockType::from_raw(ai.ai_socktype),
            socket_addr(ai.ai_addr),
        ) else {
            continue;
        };

        let canonname = if ai.ai_canonname.is_null() {
            String::new()
        } else {
            CStr::from_ptr(ai.ai_canonname).to_string_lossy().into_owned()
        };

        out.push(AddrInfo { family, socktype, protocol: ai.ai_protocol, canonname, sockaddr });
    }
    out
}

/// # Safety
///
/// `addr` must be null or point to a socket address whose length matches
/// its family.
unsafe fn socket_addr(addr: *const libc::sockaddr) -> Option<SocketAddr> {
    let family = i32::from(addr.as_ref()?.sa_family);
    match family {
        libc::AF_INET => {
            let sin = &*(addr as *const libc::sockaddr_in);
            Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)),
                u16::from_be(sin.sin_port),
            )))
        }
        libc::AF_INET6 => {
            let sin6 = &*(addr as *const libc::sockaddr_in6);
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                u32::from_be(sin6.sin6_flowinfo),
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

//! DNS engine backed by hickory-dns.
//!
//! [`HickoryChannel`] runs every query as its own tokio task on the hub's
//! runtime and delivers the outcome into the query's [`Completion`]. The
//! channel keeps the abort handle of each in-flight task so that
//! [`Channel::destroy`] can tear all of them down at once; the aborted tasks
//! drop their completions, which the waiting flows observe as
//! [`EngineError::Destruction`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hubdns::dns::{ChannelParams, HickoryChannelFactory, Resolver};
//! use hubdns::hub::Hub;
//!
//! let resolver = Resolver::builder(Hub::new())
//!     .factory(HickoryChannelFactory::new())
//!     .params(ChannelParams::new().servers(["9.9.9.9"]))
//!     .build()?;
//! ```

use super::channel::{AddrInfoQuery, Channel, ChannelFactory, EngineAddrInfo, EngineError, EngineNameInfo};
use super::params::ChannelParams;
use super::types::{AddressFamily, HostEnt, AI_CANONNAME, AI_NUMERICSERV, NI_NAMEREQD, NI_NOFQDN, NI_NUMERICHOST, NI_NUMERICSERV};
use crate::base::neterror::NetError;
use crate::hub::waiter::Completion;
use crate::hub::Hub;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use hickory_resolver::{
    config::{LookupIpStrategy, NameServerConfigGroup, ResolverConfig},
    lookup::Lookup,
    name_server::TokioConnectionProvider,
    proto::rr::RData,
    ResolveError, TokioResolver,
};
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use tokio::{runtime::Handle, task::AbortHandle};

/// Well-known services, `(name, port)`. Both transports share a port for
/// every entry.
const SERVICES: &[(&str, u16)] = &[
    ("ftp", 21),
    ("ssh", 22),
    ("telnet", 23),
    ("smtp", 25),
    ("domain", 53),
    ("http", 80),
    ("pop3", 110),
    ("ntp", 123),
    ("imap", 143),
    ("snmp", 161),
    ("ldap", 389),
    ("https", 443),
    ("submission", 587),
    ("imaps", 993),
    ("pop3s", 995),
];

/// Resolves a service string to a port.
fn service_port(service: &[u8], numeric_only: bool) -> Result<u16, EngineError> {
    let text = std::str::from_utf8(service).map_err(|_| EngineError::Service)?;
    if let Ok(port) = text.parse::<u16>() {
        return Ok(port);
    }
    if numeric_only {
        return Err(EngineError::Service);
    }
    SERVICES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
        .map(|&(_, port)| port)
        .ok_or(EngineError::Service)
}

/// Name of the service on `port`, if it is well known.
fn service_name(port: u16) -> Option<&'static str> {
    SERVICES.iter().find(|&&(_, p)| p == port).map(|&(name, _)| name)
}

fn engine_error(err: &ResolveError) -> EngineError {
    if err.is_nx_domain() {
        EngineError::NotFound
    } else if err.is_no_records_found() {
        EngineError::NoData
    } else {
        EngineError::ServFail
    }
}

fn trim_root(name: String) -> String {
    match name.strip_suffix('.') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => name,
    }
}

/// Canonical name and aliases of a forward answer. Each CNAME owner is an
/// alias; the last CNAME target is the canonical name.
fn names_of(lookup: &Lookup, queried: &str) -> (String, Vec<String>) {
    let mut name = queried.to_string();
    let mut aliases = Vec::new();
    for record in lookup.record_iter() {
        if let RData::CNAME(target) = record.data() {
            aliases.push(trim_root(record.name().to_utf8()));
            name = trim_root(target.0.to_utf8());
        }
    }
    (name, aliases)
}

struct Inner {
    resolver: TokioResolver,
    handle: Handle,
    tasks: DashMap<u64, AbortHandle>,
    next_task: AtomicU64,
    destroyed: AtomicBool,
}

/// [`Channel`] over a [`TokioResolver`].
pub struct HickoryChannel {
    inner: Arc<Inner>,
}

impl HickoryChannel {
    /// Builds a channel on the hub's runtime.
    ///
    /// With `servers` set, only those name servers are used; otherwise the
    /// system configuration is read, falling back to hickory's defaults when
    /// it cannot be.
    pub fn new(hub: &Hub, params: &ChannelParams) -> Result<Self, NetError> {
        let _guard = hub.handle().enter();

        let mut builder = match &params.servers {
            Some(servers) => {
                let ips = servers
                    .iter()
                    .map(|server| {
                        server.parse::<IpAddr>().map_err(|_| {
                            NetError::Value(format!("invalid name server address {:?}", server))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let group =
                    NameServerConfigGroup::from_ips_clear(&ips, params.udp_port.unwrap_or(53), true);
                tracing::debug!(servers = ?ips, "using configured name servers");
                TokioResolver::builder_with_config(
                    ResolverConfig::from_parts(None, vec![], group),
                    TokioConnectionProvider::default(),
                )
            }
            None => match TokioResolver::builder_tokio() {
                Ok(builder) => {
                    tracing::debug!("Using system DNS configuration");
                    builder
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to read system DNS config, using defaults"
                    );
                    TokioResolver::builder_with_config(
                        ResolverConfig::default(),
                        TokioConnectionProvider::default(),
                    )
                }
            },
        };

        let options = builder.options_mut();
        // Family filtering happens per query.
        options.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        if let Some(timeout) = params.timeout {
            options.timeout = timeout;
        }
        if let Some(tries) = params.tries {
            options.attempts = tries as usize;
        }
        if let Some(ndots) = params.ndots {
            options.ndots = ndots as usize;
        }
        if let Some(flags) = params.flags {
            tracing::warn!(flags, "engine flags are not supported by hickory-dns, ignoring");
        }
        if let Some(tcp_port) = params.tcp_port {
            if params.servers.is_none() || Some(tcp_port) != params.udp_port {
                tracing::warn!(tcp_port, "separate TCP port is not supported, ignoring");
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                resolver: builder.build(),
                handle: hub.handle().clone(),
                tasks: DashMap::new(),
                next_task: AtomicU64::new(0),
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    /// Number of queries still running.
    pub fn in_flight(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    fn spawn<T>(
        &self,
        done: Completion<T>,
        query: BoxFuture<'static, Result<T, EngineError>>,
    ) -> Result<(), EngineError>
    where
        T: Send + 'static,
    {
        if self.is_destroyed() {
            return Err(EngineError::Destruction);
        }

        let id = self.inner.next_task.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task = self.inner.handle.spawn(async move {
            let result = query.await;
            inner.tasks.remove(&id);
            done.deliver(result);
        });

        self.inner.tasks.insert(id, task.abort_handle());
        if task.is_finished() {
            self.inner.tasks.remove(&id);
        }
        Ok(())
    }
}

impl Channel for HickoryChannel {
    fn gethostbyname(
        &self,
        done: Completion<HostEnt>,
        name: &[u8],
        family: AddressFamily,
    ) -> Result<(), EngineError> {
        let name = std::str::from_utf8(name).map_err(|_| EngineError::BadName)?.to_string();
        let inner = Arc::clone(&self.inner);

        self.spawn(
            done,
            async move {
                tracing::debug!(domain = %name, ?family, "resolving via hickory-dns");
                let lookup = inner.resolver.lookup_ip(name.as_str()).await.map_err(|e| {
                    let err = engine_error(&e);
                    tracing::debug!(domain = %name, error = %e, status = err.status(), "hickory-dns lookup failed");
                    err
                })?;

                let addresses: Vec<IpAddr> = lookup.iter().filter(|ip| family.admits(ip)).collect();
                let (canonical, aliases) = names_of(lookup.as_lookup(), &name);
                tracing::debug!(domain = %name, count = addresses.len(), "hickory-dns resolution complete");
                Ok(HostEnt { name: canonical, aliases, addresses })
            }
            .boxed(),
        )
    }

    fn getaddrinfo(
        &self,
        done: Completion<Vec<EngineAddrInfo>>,
        query: AddrInfoQuery,
    ) -> Result<(), EngineError> {
        let name = std::str::from_utf8(&query.host).map_err(|_| EngineError::BadName)?.to_string();
        let port = match &query.service {
            Some(service) => service_port(service, query.flags & AI_NUMERICSERV != 0)?,
            None => 0,
        };
        let inner = Arc::clone(&self.inner);

        self.spawn(
            done,
            async move {
                tracing::debug!(domain = %name, port, family = ?query.family, "getaddrinfo via hickory-dns");
                let lookup = inner.resolver.lookup_ip(name.as_str()).await.map_err(|e| {
                    let err = engine_error(&e);
                    tracing::debug!(domain = %name, error = %e, status = err.status(), "hickory-dns lookup failed");
                    err
                })?;

                let canonname = if query.flags & AI_CANONNAME != 0 {
                    names_of(lookup.as_lookup(), &name).0
                } else {
                    String::new()
                };

                Ok(lookup
                    .iter()
                    .filter(|ip| query.family.admits(ip))
                    .map(|ip| EngineAddrInfo {
                        family: AddressFamily::of(&ip),
                        socktype: query.socktype,
                        protocol: None,
                        canonname: canonname.clone(),
                        sockaddr: SocketAddr::new(ip, port),
                    })
                    .collect())
            }
            .boxed(),
        )
    }

    fn gethostbyaddr(&self, done: Completion<HostEnt>, addr: &[u8]) -> Result<(), EngineError> {
        let ip = std::str::from_utf8(addr)
            .ok()
            .and_then(|text| text.parse::<IpAddr>().ok())
            .ok_or_else(|| EngineError::InvalidIp(String::from_utf8_lossy(addr).into_owned()))?;
        let inner = Arc::clone(&self.inner);

        self.spawn(
            done,
            async move {
                tracing::debug!(%ip, "reverse lookup via hickory-dns");
                let lookup = inner.resolver.reverse_lookup(ip).await.map_err(|e| {
                    let err = engine_error(&e);
                    tracing::debug!(%ip, error = %e, status = err.status(), "hickory-dns reverse lookup failed");
                    err
                })?;

                let mut names = lookup.iter().map(|ptr| trim_root(ptr.to_string()));
                let name = names.next().ok_or(EngineError::NotFound)?;
                Ok(HostEnt { name, aliases: names.collect(), addresses: vec![ip] })
            }
            .boxed(),
        )
    }

    fn getnameinfo(
        &self,
        done: Completion<EngineNameInfo>,
        addr: SocketAddr,
        flags: i32,
    ) -> Result<(), EngineError> {
        let service = match addr.port() {
            0 if flags & NI_NUMERICSERV == 0 => None,
            port if flags & NI_NUMERICSERV != 0 => Some(port.to_string()),
            port => Some(service_name(port).map_or_else(|| port.to_string(), str::to_string)),
        };
        let inner = Arc::clone(&self.inner);

        self.spawn(
            done,
            async move {
                let ip = addr.ip();
                if flags & NI_NUMERICHOST != 0 {
                    return Ok(EngineNameInfo { node: ip.to_string(), service });
                }

                let node = match inner.resolver.reverse_lookup(ip).await {
                    Ok(lookup) => lookup.iter().next().map(|ptr| trim_root(ptr.to_string())),
                    Err(e) => {
                        tracing::debug!(%ip, error = %e, "hickory-dns reverse lookup failed");
                        None
                    }
                };
                let node = match node {
                    Some(node) if flags & NI_NOFQDN != 0 => {
                        node.split('.').next().unwrap_or_default().to_string()
                    }
                    Some(node) => node,
                    None if flags & NI_NAMEREQD != 0 => return Err(EngineError::NotFound),
                    None => ip.to_string(),
                };
                Ok(EngineNameInfo { node, service })
            }
            .boxed(),
        )
    }

    fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(in_flight = self.inner.tasks.len(), "destroying hickory channel");
        let ids: Vec<u64> = self.inner.tasks.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, task)) = self.inner.tasks.remove(&id) {
                task.abort();
            }
        }
    }
}

impl fmt::Debug for HickoryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryChannel")
            .field("in_flight", &self.in_flight())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Builds [`HickoryChannel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HickoryChannelFactory;

impl HickoryChannelFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ChannelFactory for HickoryChannelFactory {
    fn create(&self, hub: &Hub, params: &ChannelParams) -> Result<Arc<dyn Channel>, NetError> {
        Ok(Arc::new(HickoryChannel::new(hub, params)?))
    }
}

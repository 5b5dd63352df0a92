//! The resolver façade.
//!
//! [`Resolver`] owns one engine channel at a time and answers POSIX-style
//! lookups by issuing engine queries and suspending on a [`Waiter`] until
//! the engine completes them.
//!
//! # Channel lifecycle
//!
//! The channel lives in an atomically swappable slot together with a
//! generation number. After a fork the hub queues the resolver's fork
//! handler, which schedules destruction of the old channel on the hub's
//! callback queue and installs a freshly built one under a new generation.
//! Nothing is ever destroyed inline, so a flow that is between issuing a
//! query and suspending never sees its channel vanish.
//!
//! # Stale answers
//!
//! Every operation remembers the generation it dispatched on. When an
//! operation fails with the error family it natively raises and the
//! generation has moved on in the meantime, the failure is attributed to the
//! torn-down channel and the operation runs again on the live one. Successes
//! are always returned, stale or not.

use super::channel::{AddrInfoQuery, Channel, ChannelFactory, EngineAddrInfo, EngineError};
use super::gai::{NativeResolver, SystemResolver};
use super::hickory::HickoryChannelFactory;
use super::input::{
    hostname_to_bytes, is_local, is_local_or_broadcast, name_info_target, port_to_service,
    route_addr_info, AddrInfoRoute,
};
use super::output::{
    backfill, finish_name_info, name_info_address, require_addresses, require_records,
    single_candidate, translate_forward_error,
};
use super::params::{ChannelParams, ServiceConvention};
use super::types::{
    AddrInfo, AddrInfoHints, AddressFamily, HostArg, HostEnt, NameInfo, NameInfoAddr, PortArg,
    SockType, AI_NUMERICHOST, AI_PASSIVE,
};
use crate::base::context::EngineResultExt;
use crate::base::neterror::{ErrorKind, NetError};
use crate::hub::waiter::{Completion, Waiter};
use crate::hub::{ForkWatcher, Hub};
use arc_swap::ArcSwapOption;
use std::{
    fmt,
    future::Future,
    net::IpAddr,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
};

/// The live channel and its identity.
struct ChannelSlot {
    generation: u64,
    channel: Arc<dyn Channel>,
}

struct ResolverState {
    hub: Hub,
    factory: Arc<dyn ChannelFactory>,
    native: Arc<dyn NativeResolver>,
    params: ChannelParams,
    convention: ServiceConvention,
    slot: ArcSwapOption<ChannelSlot>,
    next_generation: AtomicU64,
    pid: AtomicU32,
    closed: AtomicBool,
}

impl ResolverState {
    fn build_slot(&self) -> Result<Arc<ChannelSlot>, NetError> {
        let channel = self.factory.create(&self.hub, &self.params)?;
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(generation, "channel created");
        Ok(Arc::new(ChannelSlot { generation, channel }))
    }

    /// Generation of the live channel; `None` once closed.
    fn generation(&self) -> Option<u64> {
        self.slot.load().as_deref().map(|slot| slot.generation)
    }

    fn destroy_later(&self, slot: Arc<ChannelSlot>) {
        tracing::debug!(generation = slot.generation, "scheduling channel destruction");
        self.hub.run_callback(move || slot.channel.destroy());
    }

    /// Replaces the channel when the process id changed since it was built.
    fn on_fork(&self) {
        let pid = self.hub.getpid();
        let previous = self.pid.load(Ordering::Acquire);
        if pid == previous || self.closed.load(Ordering::Acquire) {
            return;
        }
        tracing::debug!(previous, pid, "fork detected, rebuilding channel");

        if let Some(old) = self.slot.load_full() {
            self.destroy_later(old);
        }
        match self.build_slot() {
            Ok(slot) => self.slot.store(Some(slot)),
            Err(err) => {
                tracing::error!(error = %err, "failed to rebuild channel after fork");
                self.slot.store(None);
            }
        }
        self.pid.store(pid, Ordering::Release);
    }
}

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    hub: Hub,
    params: ChannelParams,
    use_environ: bool,
    factory: Arc<dyn ChannelFactory>,
    native: Arc<dyn NativeResolver>,
    convention: ServiceConvention,
}

impl ResolverBuilder {
    /// Channel parameters. Unset options are filled from the environment
    /// unless [`use_environ`](Self::use_environ) is turned off.
    pub fn params(mut self, params: ChannelParams) -> Self {
        self.params = params;
        self
    }

    pub fn use_environ(mut self, use_environ: bool) -> Self {
        self.use_environ = use_environ;
        self
    }

    /// Engine used for every channel. Defaults to hickory-dns.
    pub fn factory(mut self, factory: impl ChannelFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Resolver answering special names. Defaults to the system resolver.
    pub fn native(mut self, native: impl NativeResolver + 'static) -> Self {
        self.native = Arc::new(native);
        self
    }

    pub fn service_convention(mut self, convention: ServiceConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Builds the first channel and subscribes to fork notifications.
    pub fn build(self) -> Result<Resolver, NetError> {
        let params =
            if self.use_environ { self.params.with_env_defaults()? } else { self.params };

        let state = Arc::new(ResolverState {
            pid: AtomicU32::new(self.hub.getpid()),
            hub: self.hub,
            factory: self.factory,
            native: self.native,
            params,
            convention: self.convention,
            slot: ArcSwapOption::empty(),
            next_generation: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        });
        state.slot.store(Some(state.build_slot()?));

        let watcher = state.hub.fork();
        let weak = Arc::downgrade(&state);
        watcher.start(move || {
            if let Some(state) = weak.upgrade() {
                state.on_fork();
            }
        });

        Ok(Resolver { state, watcher })
    }
}

impl fmt::Debug for ResolverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverBuilder")
            .field("params", &self.params)
            .field("use_environ", &self.use_environ)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

/// Asynchronous POSIX-style resolver.
///
/// # Example
///
/// ```rust,ignore
/// use hubdns::dns::{AddressFamily, Resolver};
/// use hubdns::hub::Hub;
///
/// let resolver = Resolver::builder(Hub::new()).build()?;
/// let ip = resolver.gethostbyname("example.com", AddressFamily::Inet).await?;
/// ```
pub struct Resolver {
    state: Arc<ResolverState>,
    watcher: ForkWatcher,
}

impl Resolver {
    pub fn builder(hub: Hub) -> ResolverBuilder {
        ResolverBuilder {
            hub,
            params: ChannelParams::default(),
            use_environ: true,
            factory: Arc::new(HickoryChannelFactory::new()),
            native: Arc::new(SystemResolver::new()),
            convention: ServiceConvention::default(),
        }
    }

    /// A resolver with default settings on `hub`.
    pub fn new(hub: Hub) -> Result<Self, NetError> {
        Self::builder(hub).build()
    }

    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// The parameter snapshot every channel is built from.
    pub fn params(&self) -> &ChannelParams {
        &self.state.params
    }

    pub fn is_closed(&self) -> bool {
        self.state.slot.load().is_none()
    }

    /// Schedules destruction of the channel and stops fork monitoring.
    /// Later operations fail with [`NetError::Closed`]. Calling this again
    /// does nothing.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::Release);
        if let Some(slot) = self.state.slot.swap(None) {
            self.state.destroy_later(slot);
        }
        self.watcher.stop();
    }

    /// First address of `host`.
    pub async fn gethostbyname(
        &self,
        host: impl Into<HostArg>,
        family: AddressFamily,
    ) -> Result<IpAddr, NetError> {
        let host = self.resolve_special(host.into(), family)?;
        let hostent = self.gethostbyname_ex(host, family).await?;
        hostent.addresses.first().copied().ok_or_else(NetError::name_not_known)
    }

    /// `(name, aliases, addresses)` of `host`.
    pub async fn gethostbyname_ex(
        &self,
        host: impl Into<HostArg>,
        family: AddressFamily,
    ) -> Result<HostEnt, NetError> {
        let host = hostname_to_bytes(&host.into())?;
        if is_local_or_broadcast(&host) {
            tracing::debug!(host = %String::from_utf8_lossy(&host), "answering from native resolver");
            return self.state.native.gethostbyname_ex(&host);
        }

        let host = host.as_slice();
        self.retry_stale(ErrorKind::Host, "gethostbyname_ex", || {
            self.host_by_name_once(host, family)
        })
        .await
        .map_err(translate_forward_error)
    }

    pub async fn getaddrinfo(
        &self,
        host: impl Into<HostArg>,
        port: impl Into<PortArg>,
        hints: AddrInfoHints,
    ) -> Result<Vec<AddrInfo>, NetError> {
        let port = port.into();
        let host = match route_addr_info(&host.into(), hints.flags)? {
            AddrInfoRoute::Native(host) => {
                tracing::debug!(host = ?host.as_deref().map(String::from_utf8_lossy), "answering from native resolver");
                return self.state.native.getaddrinfo(host.as_deref(), &port, &hints);
            }
            AddrInfoRoute::Engine(host) => host,
        };

        let (host, port, hints) = (host.as_slice(), &port, &hints);
        self.retry_stale(ErrorKind::AddrInfo, "getaddrinfo", || {
            self.addr_info_once(host, port, hints)
        })
        .await
    }

    /// `(name, aliases, addresses)` for an address.
    pub async fn gethostbyaddr(&self, ip: impl Into<HostArg>) -> Result<HostEnt, NetError> {
        let ip = self.resolve_special(ip.into(), AddressFamily::Unspec)?;
        let ip = hostname_to_bytes(&ip)?;

        let ip = ip.as_slice();
        self.retry_stale(ErrorKind::Host, "gethostbyaddr", || self.host_by_addr_once(ip)).await
    }

    /// `(node, service)` for a socket address.
    pub async fn getnameinfo(&self, addr: NameInfoAddr, flags: i32) -> Result<NameInfo, NetError> {
        let target = name_info_target(&addr)?;

        let (host, port, addr) = (target.host.as_slice(), target.port, &addr);
        self.retry_stale(ErrorKind::AddrInfo, "getnameinfo", || {
            self.name_info_once(host, port, addr, flags)
        })
        .await
    }

    /// Runs `attempt` until it succeeds, fails for a reason other than a
    /// stale channel, or fails on the channel that is still live.
    async fn retry_stale<T, F, Fut>(
        &self,
        family: ErrorKind,
        op: &'static str,
        mut attempt: F,
    ) -> Result<T, NetError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetError>>,
    {
        loop {
            let generation = self.state.generation();
            match attempt().await {
                Err(err) if err.kind() == family && self.state.generation() != generation => {
                    tracing::debug!(op, error = %err, "channel replaced while waiting, retrying");
                }
                result => return result,
            }
        }
    }

    /// Issues one engine query on the live channel and waits for it.
    ///
    /// A query the engine refuses to start reports the same way as one that
    /// fails later.
    async fn dispatch<T, F>(&self, issue: F) -> Result<Result<T, EngineError>, NetError>
    where
        F: FnOnce(&dyn Channel, Completion<T>) -> Result<(), EngineError>,
    {
        let slot = self.state.slot.load_full().ok_or(NetError::Closed)?;
        let (done, waiter) = Waiter::pair();
        let issued = issue(slot.channel.as_ref(), done);
        drop(slot);

        match issued {
            Ok(()) => Ok(waiter.get().await),
            Err(err) => Ok(Err(err)),
        }
    }

    async fn host_by_name_once(
        &self,
        host: &[u8],
        family: AddressFamily,
    ) -> Result<HostEnt, NetError> {
        let hostent = self
            .dispatch(|channel, done| channel.gethostbyname(done, host, family))
            .await?
            .host_context()?;
        require_addresses(hostent)
    }

    async fn addr_info_once(
        &self,
        host: &[u8],
        port: &PortArg,
        hints: &AddrInfoHints,
    ) -> Result<Vec<AddrInfo>, NetError> {
        let records = require_records(self.engine_addr_info(host, port, hints).await?)?;
        Ok(backfill(records, hints.socktype, hints.protocol))
    }

    async fn host_by_addr_once(&self, ip: &[u8]) -> Result<HostEnt, NetError> {
        let reason = match self.dispatch(|channel, done| channel.gethostbyaddr(done, ip)).await? {
            Err(EngineError::InvalidIp(reason)) => reason,
            result => return result.host_context(),
        };

        // Not an address literal: resolve it and look the address up instead.
        let hints = AddrInfoHints::new().socktype(SockType::Dgram);
        let candidates = require_records(self.candidates(ip, &PortArg::None, &hints).await?)?;
        let resolved = candidates[0].sockaddr.ip().to_string().into_bytes();
        if resolved == ip {
            return Err(NetError::InvalidIp(reason));
        }

        tracing::debug!(
            host = %String::from_utf8_lossy(ip),
            ip = %String::from_utf8_lossy(&resolved),
            "reverse lookup of resolved address"
        );
        self.dispatch(|channel, done| channel.gethostbyaddr(done, &resolved)).await?.host_context()
    }

    async fn name_info_once(
        &self,
        host: &[u8],
        port: u16,
        requested: &NameInfoAddr,
        flags: i32,
    ) -> Result<NameInfo, NetError> {
        let hints = AddrInfoHints::new().socktype(SockType::Dgram);
        let candidates = self.candidates(host, &PortArg::Int(port.into()), &hints).await?;
        let candidate = single_candidate(candidates)?;
        let address = name_info_address(&candidate, requested)?;

        let info = self
            .dispatch(|channel, done| channel.getnameinfo(done, address, flags))
            .await?
            .addr_info_context()?;
        finish_name_info(info, self.state.convention)
    }

    /// Address records for `host` without type/protocol backfill, from the
    /// native resolver for special names and from the engine otherwise.
    async fn candidates(
        &self,
        host: &[u8],
        port: &PortArg,
        hints: &AddrInfoHints,
    ) -> Result<Vec<EngineAddrInfo>, NetError> {
        if hints.flags & AI_NUMERICHOST != 0 || is_local(host) {
            let records = self.state.native.getaddrinfo(Some(host), port, hints)?;
            return Ok(records.into_iter().map(EngineAddrInfo::from).collect());
        }
        self.engine_addr_info(host, port, hints).await
    }

    async fn engine_addr_info(
        &self,
        host: &[u8],
        port: &PortArg,
        hints: &AddrInfoHints,
    ) -> Result<Vec<EngineAddrInfo>, NetError> {
        let query = AddrInfoQuery {
            host: host.to_vec(),
            service: port_to_service(port)?,
            family: hints.family,
            socktype: hints.socktype,
            protocol: hints.protocol,
            flags: hints.flags,
        };
        tracing::debug!(host = %String::from_utf8_lossy(host), family = ?hints.family, "dispatching getaddrinfo");
        self.dispatch(move |channel, done| channel.getaddrinfo(done, query))
            .await?
            .addr_info_context()
    }

    /// An empty hostname names the wildcard address of `family`.
    fn resolve_special(&self, host: HostArg, family: AddressFamily) -> Result<HostArg, NetError> {
        let empty = match &host {
            HostArg::Text(text) => text.is_empty(),
            HostArg::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        };
        if !empty {
            return Ok(host);
        }

        let hints = AddrInfoHints::new().family(family).socktype(SockType::Dgram).flags(AI_PASSIVE);
        let records = self.state.native.getaddrinfo(None, &PortArg::Int(0), &hints)?;
        match records.as_slice() {
            [only] => Ok(HostArg::Text(only.sockaddr.ip().to_string())),
            _ => Err(NetError::Os("wildcard resolved to multiple address".to_string())),
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.state.slot.load();
        f.debug_struct("Resolver")
            .field("generation", &slot.as_deref().map(|slot| slot.generation))
            .field("channel", &slot.as_deref().map(|slot| &slot.channel))
            .field("pid", &self.state.pid.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

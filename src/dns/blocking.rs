//! Blocking front end.
//!
//! [`BlockingResolver`] owns a private current-thread runtime and a hub on
//! it, and drives a [`Resolver`] to completion for each call. It must not
//! be used from within an async context.

use super::resolve::{Resolver, ResolverBuilder};
use super::types::{
    AddrInfo, AddrInfoHints, AddressFamily, HostArg, HostEnt, NameInfo, NameInfoAddr, PortArg,
};
use crate::base::neterror::NetError;
use crate::hub::Hub;
use std::{fmt, net::IpAddr};
use tokio::runtime::{Builder, Runtime};

/// Synchronous wrapper around [`Resolver`].
///
/// # Example
///
/// ```rust,ignore
/// use hubdns::dns::{AddressFamily, BlockingResolver};
///
/// let resolver = BlockingResolver::new()?;
/// let hostent = resolver.gethostbyname_ex("example.com", AddressFamily::Inet)?;
/// ```
pub struct BlockingResolver {
    resolver: Resolver,
    runtime: Runtime,
}

impl BlockingResolver {
    pub fn new() -> Result<Self, NetError> {
        Self::with_builder(|builder| builder)
    }

    /// Builds the resolver from `configure`, which receives a builder bound
    /// to the private runtime's hub.
    pub fn with_builder<F>(configure: F) -> Result<Self, NetError>
    where
        F: FnOnce(ResolverBuilder) -> ResolverBuilder,
    {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NetError::Os(e.to_string()))?;

        let resolver = {
            let _guard = runtime.enter();
            configure(Resolver::builder(Hub::new())).build()?
        };
        Ok(Self { resolver, runtime })
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn gethostbyname(
        &self,
        host: impl Into<HostArg>,
        family: AddressFamily,
    ) -> Result<IpAddr, NetError> {
        self.runtime.block_on(self.resolver.gethostbyname(host, family))
    }

    pub fn gethostbyname_ex(
        &self,
        host: impl Into<HostArg>,
        family: AddressFamily,
    ) -> Result<HostEnt, NetError> {
        self.runtime.block_on(self.resolver.gethostbyname_ex(host, family))
    }

    pub fn getaddrinfo(
        &self,
        host: impl Into<HostArg>,
        port: impl Into<PortArg>,
        hints: AddrInfoHints,
    ) -> Result<Vec<AddrInfo>, NetError> {
        self.runtime.block_on(self.resolver.getaddrinfo(host, port, hints))
    }

    pub fn gethostbyaddr(&self, ip: impl Into<HostArg>) -> Result<HostEnt, NetError> {
        self.runtime.block_on(self.resolver.gethostbyaddr(ip))
    }

    pub fn getnameinfo(&self, addr: NameInfoAddr, flags: i32) -> Result<NameInfo, NetError> {
        self.runtime.block_on(self.resolver.getnameinfo(addr, flags))
    }

    /// Closes the resolver and runs the queued channel destruction.
    pub fn close(&self) {
        self.resolver.close();
        self.runtime.block_on(self.resolver.hub().flush());
    }
}

impl Drop for BlockingResolver {
    fn drop(&mut self) {
        // block_on panics inside another runtime; the runtime's own drop
        // cancels whatever is left.
        if tokio::runtime::Handle::try_current().is_err() {
            self.close();
        } else {
            self.resolver.close();
        }
    }
}

impl fmt::Debug for BlockingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingResolver").field("resolver", &self.resolver).finish()
    }
}

//! DNS resolution.
//!
//! [`Resolver`] answers the classic POSIX lookups (`gethostbyname`,
//! `gethostbyname_ex`, `getaddrinfo`, `gethostbyaddr`, `getnameinfo`) on top
//! of an asynchronous, callback-style DNS engine:
//!
//! - [`channel`] defines the engine interface; [`hickory`] implements it
//!   with hickory-dns.
//! - [`gai`] is the platform resolver used for names that must resolve
//!   exactly like the system does (`localhost`, broadcast, numeric hosts).
//! - [`input`] and [`output`] normalize arguments and results.
//! - [`resolve`] holds the façade itself: channel lifecycle across forks,
//!   the query/waiter bridge and the stale-channel retry.
//! - [`blocking`] wraps the façade for synchronous callers.
//!
//! # Example
//!
//! ```rust,ignore
//! use hubdns::dns::{AddrInfoHints, Resolver, SockType};
//! use hubdns::hub::Hub;
//!
//! let resolver = Resolver::builder(Hub::new()).build()?;
//! let hints = AddrInfoHints::new().socktype(SockType::Stream);
//! for info in resolver.getaddrinfo("example.com", 443, hints).await? {
//!     println!("{}", info.sockaddr);
//! }
//! ```

pub mod blocking;
pub mod channel;
pub mod gai;
pub mod hickory;
pub mod input;
pub mod output;
pub mod params;
pub mod resolve;
pub mod types;

pub use blocking::BlockingResolver;
pub use channel::{AddrInfoQuery, Channel, ChannelFactory, EngineAddrInfo, EngineError, EngineNameInfo};
pub use gai::{NativeResolver, SystemResolver};
pub use hickory::{HickoryChannel, HickoryChannelFactory};
pub use params::{ChannelParams, ServiceConvention};
pub use resolve::{Resolver, ResolverBuilder};
pub use types::{
    AddrInfo, AddrInfoHints, AddressFamily, HostArg, HostEnt, NameInfo, NameInfoAddr, PortArg,
    SockType,
};

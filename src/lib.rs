//! # hubdns
//!
//! A fork-safe resolver façade for cooperative schedulers.
//!
//! `hubdns` exposes POSIX-style hostname and address resolution as async
//! operations while driving an asynchronous DNS engine underneath. Each
//! lookup issues an engine query and suspends the calling task until the
//! engine delivers; the engine channel is rebuilt transparently when the
//! process forks, and lookups caught in flight by a rebuild are retried on
//! the new channel.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hubdns::dns::{AddressFamily, Resolver};
//! use hubdns::hub::Hub;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let resolver = Resolver::builder(Hub::new()).build().unwrap();
//!     let hostent = resolver
//!         .gethostbyname_ex("example.com", AddressFamily::Inet)
//!         .await
//!         .unwrap();
//!     println!("{} -> {:?}", hostent.name, hostent.addresses);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy and engine error translation
//! - [`hub`] - Scheduler primitives: callback queue, fork watchers, waiters
//! - [`dns`] - The resolver, its engine interface and the hickory-dns engine

pub mod base;
pub mod dns;
pub mod hub;

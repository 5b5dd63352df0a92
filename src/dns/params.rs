//! Channel construction parameters.

use crate::base::neterror::NetError;
use std::time::Duration;

/// Environment variables consulted by [`ChannelParams::with_env_defaults`].
pub const ENV_FLAGS: &str = "HUBDNS_FLAGS";
pub const ENV_TIMEOUT: &str = "HUBDNS_TIMEOUT";
pub const ENV_TRIES: &str = "HUBDNS_TRIES";
pub const ENV_NDOTS: &str = "HUBDNS_NDOTS";
pub const ENV_UDP_PORT: &str = "HUBDNS_UDP_PORT";
pub const ENV_TCP_PORT: &str = "HUBDNS_TCP_PORT";
pub const ENV_SERVERS: &str = "HUBDNS_SERVERS";

/// Options forwarded to the engine when a channel is built. Unset options
/// are left to the engine's own defaults.
///
/// The resolver keeps one immutable snapshot of these and reuses it for
/// every channel it builds, including the replacement built after a fork.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelParams {
    /// Engine-specific flag bits.
    pub flags: Option<i32>,
    /// Per-try query timeout.
    pub timeout: Option<Duration>,
    /// Number of tries per server.
    pub tries: Option<u32>,
    /// Dots required before a name is tried as absolute first.
    pub ndots: Option<u32>,
    pub udp_port: Option<u16>,
    pub tcp_port: Option<u16>,
    /// Name server addresses.
    pub servers: Option<Vec<String>>,
}

impl ChannelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tries(mut self, tries: u32) -> Self {
        self.tries = Some(tries);
        self
    }

    pub fn ndots(mut self, ndots: u32) -> Self {
        self.ndots = Some(ndots);
        self
    }

    pub fn udp_port(mut self, port: u16) -> Self {
        self.udp_port = Some(port);
        self
    }

    pub fn tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = Some(port);
        self
    }

    pub fn servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = Some(servers.into_iter().map(Into::into).collect());
        self
    }

    /// Fills every unset option from the process environment.
    pub fn with_env_defaults(self) -> Result<Self, NetError> {
        self.with_defaults_from(|key| std::env::var(key).ok())
    }

    /// Fills every unset option from `lookup`. Options already set win.
    pub fn with_defaults_from<F>(mut self, lookup: F) -> Result<Self, NetError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if self.flags.is_none() {
            self.flags = get(ENV_FLAGS).map(|v| parse_number(ENV_FLAGS, &v)).transpose()?;
        }
        if self.timeout.is_none() {
            self.timeout = get(ENV_TIMEOUT).map(|v| parse_timeout(&v)).transpose()?;
        }
        if self.tries.is_none() {
            self.tries = get(ENV_TRIES).map(|v| parse_number(ENV_TRIES, &v)).transpose()?;
        }
        if self.ndots.is_none() {
            self.ndots = get(ENV_NDOTS).map(|v| parse_number(ENV_NDOTS, &v)).transpose()?;
        }
        if self.udp_port.is_none() {
            self.udp_port =
                get(ENV_UDP_PORT).map(|v| parse_number(ENV_UDP_PORT, &v)).transpose()?;
        }
        if self.tcp_port.is_none() {
            self.tcp_port =
                get(ENV_TCP_PORT).map(|v| parse_number(ENV_TCP_PORT, &v)).transpose()?;
        }
        if self.servers.is_none() {
            self.servers = get(ENV_SERVERS).map(|v| parse_servers(&v));
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, NetError> {
    value
        .trim()
        .parse()
        .map_err(|_| NetError::Value(format!("{}: invalid value {:?}", key, value)))
}

fn parse_timeout(value: &str) -> Result<Duration, NetError> {
    let secs: f64 = parse_number(ENV_TIMEOUT, value)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| NetError::Value(format!("{}: invalid value {:?}", ENV_TIMEOUT, value)))
}

fn parse_servers(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// What `getnameinfo` does when the engine returns no service string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceConvention {
    /// A missing service is a "name not known" error.
    #[default]
    Modern,
    /// A missing service reads as `"0"`.
    Historical,
}

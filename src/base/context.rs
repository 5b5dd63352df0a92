//! Engine error translation.
//!
//! Converts engine status codes into the resolver error family the calling
//! operation belongs to.

use crate::base::neterror::{
    NetError, EAI_AGAIN, EAI_BADFLAGS, EAI_FAIL, EAI_FAMILY, EAI_MEMORY, EAI_NONAME,
    EAI_SERVICE, HOST_NOT_FOUND, NO_DATA, NO_RECOVERY, TRY_AGAIN,
};
use crate::dns::channel::EngineError;

impl NetError {
    /// Classify an engine failure for the host family
    /// (`gethostbyname_ex`, `gethostbyaddr`).
    pub fn from_engine_host(err: EngineError) -> Self {
        let code = match err {
            EngineError::InvalidIp(ip) => return NetError::InvalidIp(ip),
            EngineError::NotFound | EngineError::NoName | EngineError::BadName => HOST_NOT_FOUND,
            EngineError::NoData => NO_DATA,
            EngineError::Timeout
            | EngineError::ServFail
            | EngineError::Refused
            | EngineError::ConnRefused => TRY_AGAIN,
            _ => NO_RECOVERY,
        };
        NetError::host(code)
    }

    /// Classify an engine failure for the address-info family
    /// (`getaddrinfo`, `getnameinfo`).
    pub fn from_engine_addr_info(err: EngineError) -> Self {
        let code = match err {
            EngineError::InvalidIp(ip) => return NetError::InvalidIp(ip),
            EngineError::NotFound | EngineError::NoName | EngineError::NoData => EAI_NONAME,
            EngineError::BadFlags | EngineError::BadHints => EAI_BADFLAGS,
            EngineError::BadFamily | EngineError::NotImp => EAI_FAMILY,
            EngineError::NoMem => EAI_MEMORY,
            EngineError::Service if cfg!(target_os = "macos") => EAI_NONAME,
            EngineError::Service => EAI_SERVICE,
            EngineError::Timeout
            | EngineError::ServFail
            | EngineError::Refused
            | EngineError::ConnRefused => EAI_AGAIN,
            _ => EAI_FAIL,
        };
        NetError::addr_info(code)
    }
}

/// Extension trait for classifying engine results.
pub trait EngineResultExt<T> {
    /// Translate into a host-family error.
    ///
    /// # Example
    /// ```ignore
    /// use hubdns::base::context::EngineResultExt;
    ///
    /// let hostent = waiter.get().await.host_context()?;
    /// // Error: "[Errno 1] Unknown host"
    /// ```
    fn host_context(self) -> Result<T, NetError>;

    /// Translate into an address-info-family error.
    fn addr_info_context(self) -> Result<T, NetError>;
}

impl<T> EngineResultExt<T> for Result<T, EngineError> {
    fn host_context(self) -> Result<T, NetError> {
        self.map_err(NetError::from_engine_host)
    }

    fn addr_info_context(self) -> Result<T, NetError> {
        self.map_err(NetError::from_engine_addr_info)
    }
}

use thiserror::Error;

/// `h_errno` value for an unknown host.
pub const HOST_NOT_FOUND: i32 = 1;
/// `h_errno` value for a temporary failure.
pub const TRY_AGAIN: i32 = 2;
/// `h_errno` value for a non-recoverable failure.
pub const NO_RECOVERY: i32 = 3;
/// `h_errno` value for a name with no address records.
pub const NO_DATA: i32 = 4;

pub const EAI_AGAIN: i32 = libc::EAI_AGAIN;
pub const EAI_BADFLAGS: i32 = libc::EAI_BADFLAGS;
pub const EAI_FAIL: i32 = libc::EAI_FAIL;
pub const EAI_FAMILY: i32 = libc::EAI_FAMILY;
pub const EAI_MEMORY: i32 = libc::EAI_MEMORY;
pub const EAI_NONAME: i32 = libc::EAI_NONAME;
pub const EAI_SERVICE: i32 = libc::EAI_SERVICE;
pub const EAI_SOCKTYPE: i32 = libc::EAI_SOCKTYPE;

/// Message the platform resolver uses for `EAI_NONAME`.
#[cfg(target_os = "macos")]
pub const EAI_NONAME_MSG: &str = "nodename nor servname provided, or not known";
#[cfg(not(target_os = "macos"))]
pub const EAI_NONAME_MSG: &str = "Name or service not known";

/// The two resolver error families plus the argument and state errors
/// every public operation may raise.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    /// Address-info style failure (`gaierror`); `code` is an `EAI_*` value.
    #[error("[Errno {code}] {message}")]
    AddrInfo { code: i32, message: String },

    /// Host style failure (`herror`); `code` follows `h_errno`.
    #[error("[Errno {code}] {message}")]
    Host { code: i32, message: String },

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Overflow(String),

    #[error("{0}")]
    Value(String),

    #[error("illegal IP address string: {0:?}")]
    InvalidIp(String),

    /// Generic OS-level error, e.g. an ambiguous sockaddr.
    #[error("{0}")]
    Os(String),

    #[error("Resolver is closed")]
    Closed,
}

/// Discriminant of [`NetError`], for callers that only care about the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AddrInfo,
    Host,
    Type,
    Overflow,
    Value,
    Os,
    Closed,
}

impl NetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::AddrInfo { .. } => ErrorKind::AddrInfo,
            NetError::Host { .. } => ErrorKind::Host,
            NetError::Type(_) => ErrorKind::Type,
            NetError::Overflow(_) => ErrorKind::Overflow,
            NetError::Value(_) | NetError::InvalidIp(_) => ErrorKind::Value,
            NetError::Os(_) => ErrorKind::Os,
            NetError::Closed => ErrorKind::Closed,
        }
    }

    /// Numeric code for the two resolver families, `None` otherwise.
    pub fn code(&self) -> Option<i32> {
        match self {
            NetError::AddrInfo { code, .. } | NetError::Host { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// An address-info error carrying the `gai_strerror` text for `code`.
    pub fn addr_info(code: i32) -> Self {
        NetError::AddrInfo { code, message: gai_strerror(code).to_string() }
    }

    /// A host error carrying the `hstrerror` text for `code`.
    pub fn host(code: i32) -> Self {
        NetError::Host { code, message: hstrerror(code).to_string() }
    }

    /// The "name not known" address-info error.
    pub fn name_not_known() -> Self {
        NetError::AddrInfo { code: EAI_NONAME, message: EAI_NONAME_MSG.to_string() }
    }

    /// A type error for an argument whose type is not accepted.
    pub fn unsupported_type(expected: &str, found: &str) -> Self {
        NetError::Type(format!("Expected {}, not {}", expected, found))
    }

    pub fn is_addr_info(&self) -> bool {
        matches!(self, NetError::AddrInfo { .. })
    }

    pub fn is_host(&self) -> bool {
        matches!(self, NetError::Host { .. })
    }
}

pub fn gai_strerror(code: i32) -> &'static str {
    match code {
        EAI_AGAIN => "Temporary failure in name resolution",
        EAI_BADFLAGS => "Invalid value for ai_flags",
        EAI_FAIL => "Non-recoverable failure in name resolution",
        EAI_FAMILY => "ai_family not supported",
        EAI_MEMORY => "Memory allocation failure",
        EAI_NONAME => EAI_NONAME_MSG,
        EAI_SERVICE => "Servname not supported for ai_socktype",
        EAI_SOCKTYPE => "ai_socktype not supported",
        _ => "Unknown error",
    }
}

pub fn hstrerror(code: i32) -> &'static str {
    match code {
        HOST_NOT_FOUND => "Unknown host",
        TRY_AGAIN => "Host name lookup failure",
        NO_RECOVERY => "Unknown server error",
        NO_DATA => "No address associated with name",
        _ => "Resolver internal error",
    }
}

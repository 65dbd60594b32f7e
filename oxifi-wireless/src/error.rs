//! Error types for the wireless layer.

use thiserror::Error;

/// Result type alias for wireless operations.
pub type Result<T> = std::result::Result<T, WirelessError>;

/// Main error type for wireless operations.
#[derive(Error, Debug)]
pub enum WirelessError {
    /// Interface not found or invalid.
    #[error("interface error: {0}")]
    Interface(String),

    /// No usable monitor-mode capture source.
    #[error("radio unavailable: {0}")]
    RadioUnavailable(String),

    /// Raw socket operation failed.
    #[error("socket error: {0}")]
    Socket(String),

    /// Frame injection failed.
    #[error("injection error: {0}")]
    Injection(String),

    /// Packet capture failed.
    #[error("capture error: {0}")]
    Capture(String),

    /// Channel setting failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// Insufficient privileges.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Invalid MAC address.
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// Invalid frame format.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Capture file is not a valid container.
    #[error("invalid capture file: {0}")]
    InvalidCapture(String),

    /// Operation timed out.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Operation cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Driver or backend does not support the operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// System/OS error.
    #[error("system error: {0}")]
    System(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WirelessError {
    /// Create an interface error.
    pub fn interface(msg: impl Into<String>) -> Self {
        Self::Interface(msg.into())
    }

    /// Create a permission error.
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a socket error.
    pub fn socket(msg: impl Into<String>) -> Self {
        Self::Socket(msg.into())
    }

    /// Create a malformed-frame error.
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Check if this is a permission error.
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::Permission(_))
    }

    /// Check if the backend reported the operation as unsupported.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

#[cfg(target_os = "linux")]
impl From<nix::Error> for WirelessError {
    fn from(err: nix::Error) -> Self {
        match err {
            nix::Error::EPERM | nix::Error::EACCES => {
                Self::Permission(format!("operation not permitted: {}", err))
            }
            nix::Error::ENODEV | nix::Error::ENOENT => {
                Self::Interface(format!("interface not found: {}", err))
            }
            nix::Error::EBUSY => Self::Interface(format!("interface busy: {}", err)),
            nix::Error::EOPNOTSUPP => Self::Unsupported(format!("not supported: {}", err)),
            _ => Self::System(format!("system error: {}", err)),
        }
    }
}

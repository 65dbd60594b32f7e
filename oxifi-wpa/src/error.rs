//! Error types for key derivation and cracking.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for WPA operations.
pub type Result<T> = std::result::Result<T, WpaError>;

/// Main error type for WPA operations.
#[derive(Error, Debug)]
pub enum WpaError {
    /// The handshake is missing a message required for verification.
    #[error("handshake missing {0}")]
    MissingMessage(&'static str),

    /// The stored EAPOL body is too short to carry a MIC.
    #[error("EAPOL body too short for MIC verification: {0} bytes")]
    TruncatedEapol(usize),

    /// The configured wordlist cannot be read.
    #[error("wordlist not readable: {0}")]
    WordlistMissing(PathBuf),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

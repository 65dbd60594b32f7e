//! Error types for attack orchestration.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Session-level errors surfaced by the orchestrator.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Inconsistent configuration; reported before any radio operation.
    #[error("configuration error: {0}")]
    Config(String),

    /// No attack in the chain applies to the target.
    #[error("no applicable attack: {0}")]
    NoApplicableAttack(String),

    /// The selected attack needs an external back-end that is not wired in.
    #[error("attack backend unavailable: {0}")]
    BackendUnavailable(&'static str),

    /// The capture timed out without a usable handshake. Carries the
    /// partial EAPOL frame count and the capture path for diagnostics.
    #[error("handshake incomplete after timeout ({eapol_frames} EAPOL frames, capture at {capture_path})")]
    HandshakeIncomplete {
        eapol_frames: u64,
        capture_path: PathBuf,
    },

    /// The wordlist is not readable; the handshake is stored for later.
    #[error("wordlist missing; handshake saved at {handshake_file}")]
    WordlistMissing { handshake_file: PathBuf },

    /// The wordlist ran dry without a match; the handshake is stored.
    #[error("key not found after {attempts} candidates; handshake saved at {handshake_file}")]
    KeyNotFound {
        handshake_file: PathBuf,
        attempts: u64,
    },

    /// Cooperative cancellation. Dominates all other errors.
    #[error("operation cancelled")]
    Cancelled,

    /// Wireless-layer failure.
    #[error(transparent)]
    Wireless(#[from] oxifi_wireless::WirelessError),

    /// Crypto/cracking-layer failure.
    #[error(transparent)]
    Wpa(#[from] oxifi_wpa::WpaError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// True when the error is the cooperative-cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

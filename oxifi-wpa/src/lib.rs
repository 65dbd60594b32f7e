//! # oxifi-wpa
//!
//! Offline WPA/WPA2 pre-shared-key recovery: PMK/PTK derivation, EAPOL MIC
//! verification, and a parallel dictionary attack over a captured 4-way
//! handshake.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod crack;
pub mod crypto;
pub mod error;
pub mod handshake;

pub use crack::{CrackOutcome, CrackerConfig, DictionaryCracker};
pub use crypto::{
    compute_mic, derive_pmk, derive_ptk, verify_passphrase, MIC_LEN, PMK_LEN, PTK_LEN,
};
pub use error::{Result, WpaError};
pub use handshake::PreparedHandshake;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

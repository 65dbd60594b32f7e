//! # oxifi-core
//!
//! Orchestration layer of the oxifi toolkit: session configuration,
//! cooperative cancellation, the attack chain, and result records. The
//! wireless and crypto layers live in `oxifi-wireless` and `oxifi-wpa`;
//! user interfaces and platform radio control plug in from outside.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod attack;
pub mod cancel;
pub mod config;
pub mod error;
pub mod result;

pub use attack::{
    handshake_filename, sanitize_essid, select_attacks, AttackKind, Orchestrator, WpaAttack,
};
pub use cancel::CancelToken;
pub use config::{AttackConfig, Config, MacConfig, OutputConfig, ScanConfig, WpaAttackConfig};
pub use error::{CoreError, Result};
pub use result::CrackResult;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

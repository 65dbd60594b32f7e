//! Handshake preparation for offline verification.
//!
//! Extracts the fixed inputs the verifier needs from an assembled 4-way
//! handshake: addresses, nonces, the expected MIC, and the verbatim M2
//! EAPOL body with its MIC field zeroed. The zeroing offset comes from the
//! parsed key-frame layout, never from a fixed guess against raw capture
//! bytes.

use serde::{Deserialize, Serialize};

use oxifi_wireless::eapol::{MIC_LEN, MIC_OFFSET};
use oxifi_wireless::{FourWayHandshake, MacAddress};

use crate::error::{Result, WpaError};

/// Everything needed to test candidate passphrases against one handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedHandshake {
    /// Network name used as the PBKDF2 salt.
    pub essid: String,
    /// Authenticator (AP) address.
    pub aa: MacAddress,
    /// Supplicant (client) address.
    pub spa: MacAddress,
    /// Authenticator nonce from M1 (or M3).
    pub anonce: [u8; 32],
    /// Supplicant nonce from M2.
    pub snonce: [u8; 32],
    /// MIC carried by M2.
    pub mic: [u8; MIC_LEN],
    /// Verbatim M2 EAPOL body with the MIC field zeroed.
    pub eapol_zeroed: Vec<u8>,
}

impl PreparedHandshake {
    /// Build verifier inputs from an assembled handshake.
    pub fn from_handshake(handshake: &FourWayHandshake, essid: &str) -> Result<Self> {
        let m2 = handshake.m2().ok_or(WpaError::MissingMessage("M2"))?;
        let anonce = handshake
            .anonce()
            .ok_or(WpaError::MissingMessage("M1 (ANonce)"))?;
        let snonce = m2.key.nonce;

        if m2.raw.len() < MIC_OFFSET + MIC_LEN {
            return Err(WpaError::TruncatedEapol(m2.raw.len()));
        }

        let mut eapol_zeroed = m2.raw.clone();
        eapol_zeroed[MIC_OFFSET..MIC_OFFSET + MIC_LEN].fill(0);

        Ok(Self {
            essid: essid.to_string(),
            aa: handshake.bssid,
            spa: handshake.client,
            anonce,
            snonce,
            mic: m2.key.mic,
            eapol_zeroed,
        })
    }

    /// Test a single candidate passphrase.
    pub fn verify(&self, passphrase: &str) -> bool {
        crate::crypto::verify_passphrase(
            passphrase,
            &self.essid,
            &self.aa,
            &self.spa,
            &self.anonce,
            &self.snonce,
            &self.eapol_zeroed,
            &self.mic,
        )
    }
}

//! Session configuration.
//!
//! Plain structs with defaults; the embedding front end (CLI, UI) fills
//! them however it likes. `validate` rejects contradictory settings before
//! any radio is touched.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use oxifi_wireless::Band;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preferred radio interface; empty selects the first wireless
    /// interface not already in monitor mode.
    pub interface: String,
    /// Dictionary for the offline attack.
    pub wordlist: PathBuf,
    /// Channel hop set.
    pub band: Band,
    /// Restrict to a single BSSID.
    pub bssid: Option<String>,
    /// Restrict to a single ESSID.
    pub essid: Option<String>,
    pub scan: ScanConfig,
    pub attack: AttackConfig,
    pub mac: MacConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: String::new(),
            wordlist: PathBuf::from("/usr/share/wordlists/rockyou.txt"),
            band: Band::Band2GHz,
            bssid: None,
            essid: None,
            scan: ScanConfig::default(),
            attack: AttackConfig::default(),
            mac: MacConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Reject contradictory settings. Called before any radio operation.
    pub fn validate(&self) -> Result<()> {
        let exclusive = [
            (self.attack.wpa_only, "wpa_only"),
            (self.attack.wps_only, "wps_only"),
            (self.attack.wep_only, "wep_only"),
        ];
        let picked: Vec<&str> = exclusive
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if picked.len() > 1 {
            return Err(CoreError::Config(format!(
                "mutually exclusive flags set: {}",
                picked.join(", ")
            )));
        }

        if self.attack.wps_only && self.attack.no_wps {
            return Err(CoreError::Config(
                "wps_only and no_wps are contradictory".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long the scan view runs before target selection.
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub wpa: WpaAttackConfig,
    pub pmkid: PmkidConfig,
    pub wpa_only: bool,
    pub wps_only: bool,
    pub wep_only: bool,
    pub no_wps: bool,
    pub no_pmkid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WpaAttackConfig {
    /// Hard deadline for capturing a usable handshake.
    pub handshake_timeout: Duration,
    /// Cadence of deauthentication bursts.
    pub deauth_interval: Duration,
    /// Rounds per burst.
    pub deauth_count: u32,
}

impl Default for WpaAttackConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(500),
            deauth_interval: Duration::from_secs(15),
            deauth_count: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PmkidConfig {
    pub timeout: Duration,
}

impl Default for PmkidConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// Randomize the interface MAC before attacking.
    pub randomize: bool,
    /// Pick a fresh MAC per target.
    pub rotate_per_target: bool,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            randomize: true,
            rotate_per_target: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_file: PathBuf,
    pub handshake_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_file: PathBuf::from("./oxifi-results.json"),
            handshake_dir: PathBuf::from("./handshakes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.wordlist, PathBuf::from("/usr/share/wordlists/rockyou.txt"));
        assert_eq!(cfg.attack.wpa.handshake_timeout, Duration::from_secs(500));
        assert_eq!(cfg.attack.wpa.deauth_interval, Duration::from_secs(15));
        assert_eq!(cfg.attack.wpa.deauth_count, 5);
        assert_eq!(cfg.attack.pmkid.timeout, Duration::from_secs(30));
        assert!(cfg.mac.randomize);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn exclusive_flags_rejected() {
        let mut cfg = Config::default();
        cfg.attack.wpa_only = true;
        cfg.attack.wep_only = true;
        assert!(matches!(cfg.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn wps_only_with_no_wps_rejected() {
        let mut cfg = Config::default();
        cfg.attack.wps_only = true;
        cfg.attack.no_wps = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn survives_serde_round_trip() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attack.wpa.deauth_count, cfg.attack.wpa.deauth_count);
        assert_eq!(back.wordlist, cfg.wordlist);
    }
}

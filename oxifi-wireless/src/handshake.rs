//! WPA 4-way handshake assembly.
//!
//! The tracker watches EAPOL-Key frames for one BSSID, assembles the four
//! messages per client, and reports each client's handshake exactly once
//! when it becomes usable for offline verification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Mutex;
use std::thread;

use crate::eapol::{EapolKeyFrame, KeyMessage};
use crate::frames::{Frame, MacAddress};

/// One captured handshake message: the parsed key frame plus the verbatim
/// EAPOL body. The raw bytes are kept because MIC verification runs over
/// the exact body, trailing key data included.
#[derive(Debug, Clone)]
pub struct HandshakeFrame {
    pub key: EapolKeyFrame,
    pub raw: Vec<u8>,
}

/// The four-message handshake for one (BSSID, client) pair.
#[derive(Debug, Clone)]
pub struct FourWayHandshake {
    pub bssid: MacAddress,
    pub client: MacAddress,
    slots: [Option<HandshakeFrame>; 4],
    complete: bool,
}

impl FourWayHandshake {
    pub fn new(bssid: MacAddress, client: MacAddress) -> Self {
        Self {
            bssid,
            client,
            slots: [None, None, None, None],
            complete: false,
        }
    }

    /// Store a classified message; a later message of the same number
    /// supersedes the previous one (retransmissions carry fresh replay
    /// counters).
    ///
    /// Returns true when this insertion completed the handshake.
    pub fn insert(&mut self, message: KeyMessage, key: EapolKeyFrame, raw: &[u8]) -> bool {
        let slot = match message.slot() {
            Some(slot) => slot,
            None => return false,
        };

        self.slots[slot] = Some(HandshakeFrame {
            key,
            raw: raw.to_vec(),
        });

        let was_complete = self.complete;
        self.complete = self.anonce().is_some() && self.slots[1].is_some();
        self.complete && !was_complete
    }

    /// Usable for offline verification: an ANonce-bearing message (M1 or
    /// M3) plus M2 (SNonce and MIC).
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn message(&self, number: u8) -> Option<&HandshakeFrame> {
        match number {
            1..=4 => self.slots[number as usize - 1].as_ref(),
            _ => None,
        }
    }

    pub fn message_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Authenticator nonce, from M1 or (failing that) M3.
    pub fn anonce(&self) -> Option<[u8; 32]> {
        self.slots[0]
            .as_ref()
            .or(self.slots[2].as_ref())
            .map(|f| f.key.nonce)
    }

    /// Supplicant nonce, from M2.
    pub fn snonce(&self) -> Option<[u8; 32]> {
        self.slots[1].as_ref().map(|f| f.key.nonce)
    }

    /// The MIC-bearing second message.
    pub fn m2(&self) -> Option<&HandshakeFrame> {
        self.slots[1].as_ref()
    }
}

/// Depth of the completion notification queue.
const NOTIFY_QUEUE_DEPTH: usize = 16;

/// Assembles handshakes per client for one target BSSID.
pub struct HandshakeTracker {
    bssid: MacAddress,
    state: Mutex<HashMap<MacAddress, FourWayHandshake>>,
    eapol_frames: AtomicU64,
    notify: Mutex<Option<SyncSender<FourWayHandshake>>>,
}

impl HandshakeTracker {
    pub fn new(bssid: MacAddress) -> Self {
        Self {
            bssid,
            state: Mutex::new(HashMap::new()),
            eapol_frames: AtomicU64::new(0),
            notify: Mutex::new(None),
        }
    }

    pub fn bssid(&self) -> MacAddress {
        self.bssid
    }

    /// Register the completion callback.
    ///
    /// Fired exactly once per client on the incomplete-to-complete
    /// transition, from a dedicated notification thread (never from the
    /// capture path).
    pub fn on_handshake<F>(&self, mut callback: F)
    where
        F: FnMut(FourWayHandshake) + Send + 'static,
    {
        let (tx, rx) = sync_channel(NOTIFY_QUEUE_DEPTH);
        *self.notify.lock().unwrap() = Some(tx);

        thread::Builder::new()
            .name("handshake-notify".into())
            .spawn(move || {
                for handshake in rx {
                    callback(handshake);
                }
            })
            .expect("spawn handshake notifier");
    }

    /// Feed one parsed frame through the tracker.
    ///
    /// Returns true when the frame carried a classifiable EAPOL-Key message
    /// for the tracked BSSID. Malformed or unrelated frames leave the state
    /// untouched.
    pub fn process(&self, frame: &Frame) -> bool {
        let eapol = match frame.eapol_body() {
            Some(body) => body,
            None => return false,
        };

        let (bssid, client) = match frame.header.bssid_and_client() {
            Some(pair) => pair,
            None => return false,
        };
        if bssid != self.bssid || client.is_broadcast() {
            return false;
        }

        let key = match EapolKeyFrame::parse(eapol) {
            Ok(key) => key,
            Err(_) => return false,
        };

        let message = key.message();
        if message == KeyMessage::Unknown {
            return false;
        }

        self.eapol_frames.fetch_add(1, Ordering::Relaxed);

        let completed = {
            let mut state = self.state.lock().unwrap();
            let handshake = state
                .entry(client)
                .or_insert_with(|| FourWayHandshake::new(bssid, client));
            let newly_complete = handshake.insert(message, key, eapol);
            if newly_complete {
                Some(handshake.clone())
            } else {
                None
            }
        };

        if let Some(handshake) = completed {
            tracing::info!(
                bssid = %handshake.bssid,
                client = %handshake.client,
                messages = handshake.message_count(),
                "handshake complete"
            );
            let guard = self.notify.lock().unwrap();
            if let Some(tx) = guard.as_ref() {
                if tx.try_send(handshake).is_err() {
                    tracing::debug!("handshake notification queue full");
                }
            }
        }

        true
    }

    /// True once any client's handshake is complete.
    pub fn has_handshake(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .values()
            .any(|hs| hs.is_complete())
    }

    /// Number of classified EAPOL-Key frames observed.
    pub fn eapol_count(&self) -> u64 {
        self.eapol_frames.load(Ordering::Relaxed)
    }

    /// Snapshot of all complete handshakes.
    pub fn complete_handshakes(&self) -> Vec<FourWayHandshake> {
        self.state
            .lock()
            .unwrap()
            .values()
            .filter(|hs| hs.is_complete())
            .cloned()
            .collect()
    }

    /// Best message count across all clients, for timeout diagnostics.
    pub fn best_message_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .values()
            .map(|hs| hs.message_count())
            .max()
            .unwrap_or(0)
    }
}

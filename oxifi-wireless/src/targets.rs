//! Thread-safe database of discovered access points and clients.
//!
//! Concurrent readers, serialized writers. Field merges never downgrade
//! security attributes, and subscriber callbacks are delivered through a
//! bounded channel drained by a dedicated notifier thread so no subscriber
//! code ever runs under the database lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Mutex, RwLock};
use std::thread;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::frames::MacAddress;

/// Signal value meaning "not observed".
pub const POWER_UNKNOWN: i8 = -100;

/// Encryption class of a network. Ordering reflects protocol strength and
/// drives the no-downgrade merge rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Encryption {
    #[default]
    Open,
    Wep,
    Wpa,
    Wpa2,
    Wpa3,
}

impl std::fmt::Display for Encryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "Open",
            Self::Wep => "WEP",
            Self::Wpa => "WPA",
            Self::Wpa2 => "WPA2",
            Self::Wpa3 => "WPA3",
        };
        f.write_str(s)
    }
}

/// Pairwise cipher advertised by a network.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Cipher {
    #[default]
    None,
    Wep,
    Tkip,
    Ccmp,
    Wrap,
}

impl std::fmt::Display for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::Wep => "WEP",
            Self::Tkip => "TKIP",
            Self::Ccmp => "CCMP",
            Self::Wrap => "WRAP",
        };
        f.write_str(s)
    }
}

/// A discovered access point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPoint {
    pub bssid: MacAddress,
    /// Network name; empty while the network is hidden.
    pub essid: String,
    /// Channel 1..165; 0 until a beacon advertised one.
    pub channel: u8,
    /// Last observed signal in dBm; [`POWER_UNKNOWN`] until observed.
    pub power: i8,
    pub encryption: Encryption,
    pub cipher: Cipher,
    pub wps: bool,
    pub hidden: bool,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub beacon_count: u32,
    pub data_count: u32,
    /// MACs of clients seen exchanging data with this AP.
    pub clients: BTreeSet<MacAddress>,
}

impl AccessPoint {
    pub fn has_clients(&self) -> bool {
        !self.clients.is_empty()
    }
}

impl std::fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let essid = if self.hidden || self.essid.is_empty() {
            "<hidden>"
        } else {
            &self.essid
        };
        write!(
            f,
            "{} [{}] Ch:{} {} {}dBm",
            essid, self.bssid, self.channel, self.encryption, self.power
        )
    }
}

/// A station associated with an access point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub mac: MacAddress,
    /// The AP this client is currently associated with; reassociation
    /// replaces it.
    pub bssid: MacAddress,
    pub power: i8,
    pub packets: u32,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
}

/// Database change notification.
#[derive(Debug, Clone)]
pub enum TargetEvent {
    Inserted(AccessPoint),
    Updated(AccessPoint),
}

/// Depth of the subscriber notification channel.
const EVENT_QUEUE_DEPTH: usize = 256;

/// Thread-safe catalogue of networks and clients.
#[derive(Default)]
pub struct TargetDb {
    aps: RwLock<HashMap<MacAddress, AccessPoint>>,
    clients: RwLock<HashMap<MacAddress, Client>>,
    events: Mutex<Option<SyncSender<TargetEvent>>>,
    dropped_events: AtomicU64,
}

impl TargetDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register callbacks for insert/update events.
    ///
    /// Events are queued through a bounded channel and dispatched by a
    /// notifier thread; callbacks must not assume they run before the next
    /// database mutation. Re-subscribing replaces the previous subscriber.
    pub fn subscribe<I, U>(&self, mut on_insert: I, mut on_update: U)
    where
        I: FnMut(AccessPoint) + Send + 'static,
        U: FnMut(AccessPoint) + Send + 'static,
    {
        let (tx, rx) = sync_channel(EVENT_QUEUE_DEPTH);
        *self.events.lock().unwrap() = Some(tx);

        thread::Builder::new()
            .name("target-db-notify".into())
            .spawn(move || {
                for event in rx {
                    match event {
                        TargetEvent::Inserted(ap) => on_insert(ap),
                        TargetEvent::Updated(ap) => on_update(ap),
                    }
                }
            })
            .expect("spawn notifier thread");
    }

    fn emit(&self, event: TargetEvent) {
        let guard = self.events.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            if tx.try_send(event).is_err() {
                let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(dropped, "target event queue full, dropping notification");
            }
        }
    }

    /// Events dropped because the subscriber could not keep up.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Insert or merge an access-point observation.
    ///
    /// Merge rules: encryption, cipher, and WPS never downgrade; a non-empty
    /// ESSID fills an empty one and is otherwise replaced only by an
    /// observation with a stronger signal; power, channel, and last-seen are
    /// absolute.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_ap(
        &self,
        bssid: MacAddress,
        essid: &str,
        channel: u8,
        power: i8,
        encryption: Encryption,
        cipher: Cipher,
        wps: bool,
    ) {
        let now = SystemTime::now();
        let event;

        {
            let mut aps = self.aps.write().unwrap();
            match aps.get_mut(&bssid) {
                None => {
                    let ap = AccessPoint {
                        bssid,
                        essid: essid.to_string(),
                        channel,
                        power,
                        encryption,
                        cipher,
                        wps,
                        hidden: essid.is_empty(),
                        first_seen: now,
                        last_seen: now,
                        beacon_count: 1,
                        data_count: 0,
                        clients: BTreeSet::new(),
                    };
                    event = TargetEvent::Inserted(ap.clone());
                    aps.insert(bssid, ap);
                }
                Some(ap) => {
                    if !essid.is_empty() {
                        if ap.essid.is_empty() {
                            ap.essid = essid.to_string();
                            ap.hidden = false;
                        } else if ap.essid != essid
                            && power != POWER_UNKNOWN
                            && power > ap.power
                        {
                            ap.essid = essid.to_string();
                        }
                    }
                    if channel != 0 {
                        ap.channel = channel;
                    }
                    if power != POWER_UNKNOWN {
                        ap.power = power;
                    }
                    ap.encryption = ap.encryption.max(encryption);
                    ap.cipher = ap.cipher.max(cipher);
                    ap.wps |= wps;
                    ap.beacon_count += 1;
                    ap.last_seen = now;
                    event = TargetEvent::Updated(ap.clone());
                }
            }
        }

        self.emit(event);
    }

    /// Insert or refresh a client and attach it to its AP's client set.
    pub fn upsert_client(&self, mac: MacAddress, bssid: MacAddress, power: i8) {
        let now = SystemTime::now();

        {
            let mut clients = self.clients.write().unwrap();
            clients
                .entry(mac)
                .and_modify(|c| {
                    c.bssid = bssid;
                    if power != POWER_UNKNOWN {
                        c.power = power;
                    }
                    c.packets += 1;
                    c.last_seen = now;
                })
                .or_insert_with(|| Client {
                    mac,
                    bssid,
                    power,
                    packets: 1,
                    first_seen: now,
                    last_seen: now,
                });
        }

        let mut aps = self.aps.write().unwrap();
        if let Some(ap) = aps.get_mut(&bssid) {
            ap.clients.insert(mac);
        }
    }

    /// Increment the data-frame counter for an AP.
    pub fn increment_data(&self, bssid: MacAddress) {
        let mut aps = self.aps.write().unwrap();
        if let Some(ap) = aps.get_mut(&bssid) {
            ap.data_count += 1;
        }
    }

    /// Atomic copy of all APs, strongest signal first.
    pub fn snapshot(&self) -> Vec<AccessPoint> {
        let aps = self.aps.read().unwrap();
        let mut list: Vec<AccessPoint> = aps.values().cloned().collect();
        list.sort_by(|a, b| b.power.cmp(&a.power));
        list
    }

    /// Look up a single AP.
    pub fn get(&self, bssid: &MacAddress) -> Option<AccessPoint> {
        self.aps.read().unwrap().get(bssid).cloned()
    }

    /// Look up a single client.
    pub fn get_client(&self, mac: &MacAddress) -> Option<Client> {
        self.clients.read().unwrap().get(mac).cloned()
    }

    pub fn ap_count(&self) -> usize {
        self.aps.read().unwrap().len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    fn mac(last: u8) -> MacAddress {
        MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, last])
    }

    #[test]
    fn encryption_never_downgrades() {
        let db = TargetDb::new();
        let bssid = mac(1);

        db.upsert_ap(bssid, "net", 6, -50, Encryption::Wpa2, Cipher::Ccmp, false);
        db.upsert_ap(bssid, "net", 6, -50, Encryption::Open, Cipher::None, false);

        let ap = db.get(&bssid).unwrap();
        assert_eq!(ap.encryption, Encryption::Wpa2);
        assert_eq!(ap.cipher, Cipher::Ccmp);
    }

    #[test]
    fn essid_fills_empty_and_is_sticky() {
        let db = TargetDb::new();
        let bssid = mac(2);

        db.upsert_ap(bssid, "", 6, -50, Encryption::Wpa2, Cipher::Ccmp, false);
        assert!(db.get(&bssid).unwrap().hidden);

        db.upsert_ap(bssid, "revealed", 6, POWER_UNKNOWN, Encryption::Wpa2, Cipher::Ccmp, false);
        let ap = db.get(&bssid).unwrap();
        assert_eq!(ap.essid, "revealed");
        assert!(!ap.hidden);

        // A weaker observation does not replace the name.
        db.upsert_ap(bssid, "spoof", 6, -80, Encryption::Wpa2, Cipher::Ccmp, false);
        assert_eq!(db.get(&bssid).unwrap().essid, "revealed");

        // A stronger one does.
        db.upsert_ap(bssid, "stronger", 6, -30, Encryption::Wpa2, Cipher::Ccmp, false);
        assert_eq!(db.get(&bssid).unwrap().essid, "stronger");
    }

    #[test]
    fn power_and_channel_are_absolute() {
        let db = TargetDb::new();
        let bssid = mac(3);

        db.upsert_ap(bssid, "n", 6, -40, Encryption::Wpa2, Cipher::Ccmp, false);
        db.upsert_ap(bssid, "n", 11, -70, Encryption::Wpa2, Cipher::Ccmp, false);

        let ap = db.get(&bssid).unwrap();
        assert_eq!(ap.channel, 11);
        assert_eq!(ap.power, -70);
        assert_eq!(ap.beacon_count, 2);

        // Sentinel does not clobber a real reading.
        db.upsert_ap(bssid, "n", 0, POWER_UNKNOWN, Encryption::Wpa2, Cipher::Ccmp, false);
        let ap = db.get(&bssid).unwrap();
        assert_eq!(ap.channel, 11);
        assert_eq!(ap.power, -70);
    }

    #[test]
    fn snapshot_sorted_by_signal() {
        let db = TargetDb::new();
        db.upsert_ap(mac(1), "far", 1, -85, Encryption::Wpa2, Cipher::Ccmp, false);
        db.upsert_ap(mac(2), "near", 1, -30, Encryption::Wpa2, Cipher::Ccmp, false);
        db.upsert_ap(mac(3), "mid", 1, -60, Encryption::Wpa2, Cipher::Ccmp, false);

        let essids: Vec<String> = db.snapshot().into_iter().map(|ap| ap.essid).collect();
        assert_eq!(essids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn clients_attach_and_reassociate() {
        let db = TargetDb::new();
        let ap1 = mac(1);
        let ap2 = mac(2);
        let sta = mac(9);

        db.upsert_ap(ap1, "one", 1, -50, Encryption::Wpa2, Cipher::Ccmp, false);
        db.upsert_ap(ap2, "two", 6, -50, Encryption::Wpa2, Cipher::Ccmp, false);

        db.upsert_client(sta, ap1, -55);
        assert!(db.get(&ap1).unwrap().clients.contains(&sta));
        assert_eq!(db.get_client(&sta).unwrap().packets, 1);

        db.upsert_client(sta, ap2, -60);
        let client = db.get_client(&sta).unwrap();
        assert_eq!(client.bssid, ap2);
        assert_eq!(client.packets, 2);
        assert!(db.get(&ap2).unwrap().clients.contains(&sta));
    }

    #[test]
    fn data_counter_increments() {
        let db = TargetDb::new();
        let bssid = mac(4);
        db.upsert_ap(bssid, "n", 6, -40, Encryption::Wpa2, Cipher::Ccmp, false);
        db.increment_data(bssid);
        db.increment_data(bssid);
        assert_eq!(db.get(&bssid).unwrap().data_count, 2);
    }

    #[test]
    fn subscriber_sees_insert_then_update() {
        let db = TargetDb::new();
        let (tx, rx) = channel();
        let tx2 = tx.clone();
        db.subscribe(
            move |ap| tx.send(("insert", ap.bssid)).unwrap(),
            move |ap| tx2.send(("update", ap.bssid)).unwrap(),
        );

        let bssid = mac(5);
        db.upsert_ap(bssid, "n", 6, -40, Encryption::Wpa2, Cipher::Ccmp, false);
        db.upsert_ap(bssid, "n", 6, -42, Encryption::Wpa2, Cipher::Ccmp, false);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ("insert", bssid)
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ("update", bssid)
        );
    }

    #[test]
    fn subscriber_may_call_back_into_the_db() {
        // The callback runs on the notifier thread, never under the lock, so
        // re-entering the database from it must not deadlock.
        let db = std::sync::Arc::new(TargetDb::new());
        let db2 = db.clone();
        let (tx, rx) = channel();
        db.subscribe(
            move |ap| {
                let count = db2.ap_count();
                tx.send((ap.bssid, count)).unwrap();
            },
            |_| {},
        );

        db.upsert_ap(mac(6), "n", 6, -40, Encryption::Wpa2, Cipher::Ccmp, false);
        let (bssid, count) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(bssid, mac(6));
        assert_eq!(count, 1);
    }
}

//! Passive 802.11 scanner.
//!
//! Consumes frames from a radio, dispatches by frame type, and keeps the
//! target database current: beacons and probe responses update access
//! points, data frames update client associations and traffic counters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::capture::{next_frame, Radio};
use crate::channel::ChannelHopper;
use crate::error::Result;
use crate::frames::{Frame, FrameSubtype, FrameType};
use crate::ies::parse_beacon_body;
use crate::targets::{Cipher, Encryption, TargetDb, POWER_UNKNOWN};

/// Frame-driven scanner over a shared target database.
pub struct Scanner {
    db: Arc<TargetDb>,
}

impl Scanner {
    pub fn new(db: Arc<TargetDb>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<TargetDb> {
        &self.db
    }

    /// Run the scan loop until the stop flag is raised.
    ///
    /// With a hopper, the radio is retuned whenever the dwell time on the
    /// current channel has elapsed; tuning failures are logged and hopping
    /// continues.
    pub fn run(
        &self,
        radio: &mut dyn Radio,
        stop: &AtomicBool,
        mut hopper: Option<&mut ChannelHopper>,
    ) -> Result<()> {
        let mut last_hop = Instant::now();

        while !stop.load(Ordering::SeqCst) {
            if let Some(hopper) = hopper.as_mut() {
                if last_hop.elapsed() >= hopper.dwell() {
                    if let Err(err) = hopper.hop() {
                        tracing::warn!(%err, "channel hop failed");
                    }
                    last_hop = Instant::now();
                }
            }

            if let Some(captured) = next_frame(radio)? {
                self.process_frame(&captured.frame);
            }
        }

        Ok(())
    }

    /// Dispatch one parsed frame into the database.
    pub fn process_frame(&self, frame: &Frame) {
        match frame.frame_type() {
            FrameType::Management => match frame.subtype() {
                FrameSubtype::Beacon | FrameSubtype::ProbeResponse => {
                    self.handle_beacon(frame);
                }
                _ => {}
            },
            FrameType::Data => self.handle_data(frame),
            _ => {}
        }
    }

    fn handle_beacon(&self, frame: &Frame) {
        let bssid = frame.header.addr3;
        if bssid.is_broadcast() {
            return;
        }

        let info = match parse_beacon_body(&frame.body) {
            Some(info) => info,
            None => return,
        };

        // A privacy bit with no RSN or WPA element is pre-RSN encryption.
        let (encryption, cipher) = if info.encryption == Encryption::Open && info.privacy {
            (Encryption::Wep, Cipher::Wep)
        } else {
            (info.encryption, info.cipher)
        };

        let power = frame.signal_dbm().unwrap_or(POWER_UNKNOWN);

        self.db.upsert_ap(
            bssid,
            &info.essid,
            info.channel.unwrap_or(0),
            power,
            encryption,
            cipher,
            info.wps,
        );
    }

    fn handle_data(&self, frame: &Frame) {
        let (bssid, client) = match frame.header.bssid_and_client() {
            Some(pair) => pair,
            None => return, // WDS
        };
        if bssid.is_broadcast() || client.is_broadcast() {
            return;
        }

        let power = frame.signal_dbm().unwrap_or(POWER_UNKNOWN);

        self.db.increment_data(bssid);
        self.db.upsert_client(client, bssid, power);
    }
}

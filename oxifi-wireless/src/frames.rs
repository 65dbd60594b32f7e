//! 802.11 frame structures, parsing, and serialization.
//!
//! Provides the MAC-layer representations used across the crate: addresses,
//! frame-control decoding, management-frame construction for deauth and
//! disassociation, and the tolerant top-level frame parser that strips the
//! RadioTap prefix and exposes the payload.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WirelessError};
use crate::radiotap::{self, RadiotapInfo};

/// MAC address (6 bytes).
///
/// The derived ordering is lexicographic over the octets, which is the
/// big-endian octet-wise comparison used for PTK derivation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Broadcast address (FF:FF:FF:FF:FF:FF).
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Zero/null address.
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    /// Create from bytes.
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (must be 6 bytes).
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 6 {
            return Err(WirelessError::InvalidMac(format!(
                "expected 6 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get as byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    /// Check if this is a multicast address (bit 0 of first octet set).
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = WirelessError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(WirelessError::InvalidMac(format!(
                "expected 6 octets separated by ':', got '{}'",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| WirelessError::InvalidMac(format!("invalid hex octet: '{}'", part)))?;
        }

        Ok(Self(bytes))
    }
}

/// 802.11 frame type (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Management frames (beacons, probes, auth, deauth, ...).
    Management = 0,
    /// Control frames (ACK, RTS, CTS, ...).
    Control = 1,
    /// Data frames.
    Data = 2,
    /// Extension (802.11ad).
    Extension = 3,
}

impl FrameType {
    /// Parse from a frame-control field.
    pub fn from_frame_control(fc: u16) -> Self {
        match (fc >> 2) & 0x03 {
            0 => Self::Management,
            1 => Self::Control,
            2 => Self::Data,
            _ => Self::Extension,
        }
    }
}

/// 802.11 management frame subtype (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameSubtype {
    AssociationRequest = 0,
    AssociationResponse = 1,
    ReassociationRequest = 2,
    ReassociationResponse = 3,
    ProbeRequest = 4,
    ProbeResponse = 5,
    TimingAdvertisement = 6,
    Beacon = 8,
    Atim = 9,
    Disassociation = 10,
    Authentication = 11,
    Deauthentication = 12,
    Action = 13,
    ActionNoAck = 14,
    Unknown = 255,
}

impl FrameSubtype {
    /// Parse from a frame-control field (management type assumed).
    pub fn from_frame_control(fc: u16) -> Self {
        match (fc >> 4) & 0x0F {
            0 => Self::AssociationRequest,
            1 => Self::AssociationResponse,
            2 => Self::ReassociationRequest,
            3 => Self::ReassociationResponse,
            4 => Self::ProbeRequest,
            5 => Self::ProbeResponse,
            6 => Self::TimingAdvertisement,
            8 => Self::Beacon,
            9 => Self::Atim,
            10 => Self::Disassociation,
            11 => Self::Authentication,
            12 => Self::Deauthentication,
            13 => Self::Action,
            14 => Self::ActionNoAck,
            _ => Self::Unknown,
        }
    }
}

/// Deauthentication/disassociation reason codes (IEEE 802.11-2016).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DeauthReason {
    Unspecified = 1,
    AuthNoLongerValid = 2,
    StationLeaving = 3,
    Inactivity = 4,
    ApOverload = 5,
    Class2FromNonAuth = 6,
    Class3FromNonAssoc = 7,
    DisassocLeaving = 8,
    StaNotAuthenticated = 9,
    FourWayTimeout = 15,
    GroupKeyTimeout = 16,
}

impl DeauthReason {
    /// Get the wire value.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Reason code that reliably forces clients to reauthenticate.
    pub fn default_for_attack() -> Self {
        Self::AuthNoLongerValid
    }
}

/// 802.11 frame-control field (2 bytes, little-endian on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    raw: u16,
}

impl FrameControl {
    /// Wrap a raw frame-control value.
    pub fn new(raw: u16) -> Self {
        Self { raw }
    }

    /// Frame control for a deauthentication frame.
    pub fn deauth() -> Self {
        // Type 0 (management), subtype 12.
        Self { raw: 0x00C0 }
    }

    /// Frame control for a disassociation frame.
    pub fn disassoc() -> Self {
        // Type 0 (management), subtype 10.
        Self { raw: 0x00A0 }
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType::from_frame_control(self.raw)
    }

    pub fn subtype(&self) -> FrameSubtype {
        FrameSubtype::from_frame_control(self.raw)
    }

    /// Raw subtype bits (valid for any frame type).
    pub fn subtype_raw(&self) -> u8 {
        ((self.raw >> 4) & 0x0F) as u8
    }

    /// To-DS bit (frame heading into the distribution system).
    pub fn to_ds(&self) -> bool {
        self.raw & 0x0100 != 0
    }

    /// From-DS bit (frame coming out of the distribution system).
    pub fn from_ds(&self) -> bool {
        self.raw & 0x0200 != 0
    }

    /// QoS data variant (data subtypes 8..15 carry a 2-byte QoS control field).
    pub fn is_qos_data(&self) -> bool {
        self.frame_type() == FrameType::Data && self.subtype_raw() & 0x08 != 0
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.raw.to_le_bytes()
    }
}

/// IEEE 802.11 MAC header for management and data frames.
#[derive(Debug, Clone, Copy)]
pub struct Dot11Header {
    pub frame_control: FrameControl,
    pub duration: u16,
    pub addr1: MacAddress,
    pub addr2: MacAddress,
    pub addr3: MacAddress,
    pub sequence: u16,
}

impl Dot11Header {
    /// Header size for management/data frames (without QoS control).
    pub const SIZE: usize = 24;

    /// Parse a header from the start of an 802.11 frame (no RadioTap).
    ///
    /// Control frames carry fewer address fields; only addr1 is populated
    /// for them. Returns the header and its length in bytes.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 2 {
            return Err(WirelessError::frame("frame shorter than frame control"));
        }
        let fc = FrameControl::new(LittleEndian::read_u16(&data[0..2]));

        if fc.frame_type() == FrameType::Control {
            if data.len() < 10 {
                return Err(WirelessError::frame("truncated control frame"));
            }
            let header = Self {
                frame_control: fc,
                duration: LittleEndian::read_u16(&data[2..4]),
                addr1: MacAddress::from_slice(&data[4..10])?,
                addr2: MacAddress::ZERO,
                addr3: MacAddress::ZERO,
                sequence: 0,
            };
            return Ok((header, 10));
        }

        if data.len() < Self::SIZE {
            return Err(WirelessError::frame(format!(
                "truncated {:?} frame: {} bytes",
                fc.frame_type(),
                data.len()
            )));
        }

        let header = Self {
            frame_control: fc,
            duration: LittleEndian::read_u16(&data[2..4]),
            addr1: MacAddress::from_slice(&data[4..10])?,
            addr2: MacAddress::from_slice(&data[10..16])?,
            addr3: MacAddress::from_slice(&data[16..22])?,
            sequence: LittleEndian::read_u16(&data[22..24]),
        };

        let len = if fc.is_qos_data() {
            if data.len() < Self::SIZE + 2 {
                return Err(WirelessError::frame("truncated QoS data frame"));
            }
            Self::SIZE + 2
        } else {
            Self::SIZE
        };

        Ok((header, len))
    }

    /// Determine (BSSID, client) from the To-DS/From-DS bits.
    ///
    /// WDS frames (both bits set) have four addresses and no single client;
    /// they yield `None`.
    pub fn bssid_and_client(&self) -> Option<(MacAddress, MacAddress)> {
        match (self.frame_control.to_ds(), self.frame_control.from_ds()) {
            (true, false) => Some((self.addr1, self.addr2)),
            (false, true) => Some((self.addr2, self.addr1)),
            (false, false) => Some((self.addr3, self.addr2)),
            (true, true) => None,
        }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.frame_control.to_le_bytes());
        out.extend_from_slice(&self.duration.to_le_bytes());
        out.extend_from_slice(&self.addr1.0);
        out.extend_from_slice(&self.addr2.0);
        out.extend_from_slice(&self.addr3.0);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }
}

/// LLC/SNAP header announcing an EAPOL (802.1X) payload.
pub const LLC_SNAP_EAPOL: [u8; 8] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E];

/// A deauthentication or disassociation frame under construction.
///
/// Serializes with a fixed 8-byte RadioTap prefix (empty present flags),
/// duration 0, and sequence 0; the driver assigns the real sequence number.
#[derive(Debug, Clone)]
pub struct ManagementFrame {
    header: Dot11Header,
    reason: u16,
}

impl ManagementFrame {
    /// Build a deauthentication frame.
    pub fn deauth(addr1: MacAddress, addr2: MacAddress, bssid: MacAddress, reason: u16) -> Self {
        Self {
            header: Dot11Header {
                frame_control: FrameControl::deauth(),
                duration: 0,
                addr1,
                addr2,
                addr3: bssid,
                sequence: 0,
            },
            reason,
        }
    }

    /// Build a disassociation frame.
    pub fn disassoc(addr1: MacAddress, addr2: MacAddress, bssid: MacAddress, reason: u16) -> Self {
        Self {
            header: Dot11Header {
                frame_control: FrameControl::disassoc(),
                duration: 0,
                addr1,
                addr2,
                addr3: bssid,
                sequence: 0,
            },
            reason,
        }
    }

    pub fn destination(&self) -> MacAddress {
        self.header.addr1
    }

    pub fn source(&self) -> MacAddress {
        self.header.addr2
    }

    pub fn bssid(&self) -> MacAddress {
        self.header.addr3
    }

    pub fn reason(&self) -> u16 {
        self.reason
    }

    /// Serialize to injectable bytes: RadioTap + header + reason code.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(radiotap::INJECTION_HEADER.len() + Dot11Header::SIZE + 2);
        out.extend_from_slice(&radiotap::INJECTION_HEADER);
        self.header.serialize_into(&mut out);
        out.extend_from_slice(&self.reason.to_le_bytes());
        out
    }
}

/// A parsed 802.11 frame with its RadioTap metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Metadata from the RadioTap prefix (signal, channel).
    pub radiotap: RadiotapInfo,
    /// MAC header.
    pub header: Dot11Header,
    /// Frame body after the MAC header (and QoS control, if present).
    pub body: Vec<u8>,
}

impl Frame {
    /// Parse a RadioTap-prefixed 802.11 frame.
    ///
    /// Tolerant of trailing bytes; fails only when the RadioTap prefix or
    /// the MAC header for the discriminated subtype is truncated.
    pub fn parse(raw: &[u8]) -> Result<Frame> {
        let (radiotap, rt_len) = radiotap::parse_header(raw)?;
        let dot11 = &raw[rt_len..];
        let (header, hdr_len) = Dot11Header::parse(dot11)?;

        Ok(Frame {
            radiotap,
            header,
            body: dot11[hdr_len..].to_vec(),
        })
    }

    pub fn frame_type(&self) -> FrameType {
        self.header.frame_control.frame_type()
    }

    pub fn subtype(&self) -> FrameSubtype {
        self.header.frame_control.subtype()
    }

    /// Signal strength in dBm, if the RadioTap header carried it.
    pub fn signal_dbm(&self) -> Option<i8> {
        self.radiotap.signal_dbm
    }

    /// Reason code of a deauth/disassoc frame.
    pub fn deauth_reason(&self) -> Option<u16> {
        if self.frame_type() != FrameType::Management {
            return None;
        }
        match self.subtype() {
            FrameSubtype::Deauthentication | FrameSubtype::Disassociation => {
                if self.body.len() >= 2 {
                    Some(LittleEndian::read_u16(&self.body[0..2]))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// EAPOL payload of a data frame, if the LLC/SNAP header announces one.
    ///
    /// The returned slice starts at the EAPOL version octet and is truncated
    /// to the length declared in the EAPOL header (drivers may pad frames).
    pub fn eapol_body(&self) -> Option<&[u8]> {
        if self.frame_type() != FrameType::Data {
            return None;
        }
        if self.body.len() < LLC_SNAP_EAPOL.len() + 4 {
            return None;
        }
        if self.body[..8] != LLC_SNAP_EAPOL {
            return None;
        }

        let eapol = &self.body[8..];
        let declared = u16::from_be_bytes([eapol[2], eapol[3]]) as usize + 4;
        if eapol.len() < declared {
            return None;
        }
        Some(&eapol[..declared])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radiotap::INJECTION_HEADER;

    #[test]
    fn mac_address_parse_and_display() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(format!("{}", mac), "AA:BB:CC:DD:EE:FF");

        assert!("AA:BB:CC".parse::<MacAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<MacAddress>().is_err());
    }

    #[test]
    fn mac_ordering_is_octet_wise() {
        let ap = MacAddress([0x00, 0x14, 0x6C, 0x7E, 0x40, 0x80]);
        let sta = MacAddress([0x00, 0x0F, 0xB5, 0xFD, 0xFB, 0xC2]);
        // 0x0F < 0x14 in the second octet decides it.
        assert!(sta < ap);
        assert!(MacAddress::ZERO < MacAddress::BROADCAST);
    }

    #[test]
    fn deauth_round_trip() {
        let client: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let bssid: MacAddress = "11:22:33:44:55:66".parse().unwrap();

        let frame = ManagementFrame::deauth(client, bssid, bssid, 7);
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), INJECTION_HEADER.len() + 24 + 2);

        let parsed = Frame::parse(&bytes).unwrap();
        assert_eq!(parsed.subtype(), FrameSubtype::Deauthentication);
        assert_eq!(parsed.header.addr1, client);
        assert_eq!(parsed.header.addr2, bssid);
        assert_eq!(parsed.header.addr3, bssid);
        assert_eq!(parsed.deauth_reason(), Some(7));
        assert_eq!(parsed.header.duration, 0);
        assert_eq!(parsed.header.sequence, 0);
    }

    #[test]
    fn disassoc_round_trip() {
        let client: MacAddress = "02:00:00:00:00:01".parse().unwrap();
        let bssid: MacAddress = "02:00:00:00:00:02".parse().unwrap();

        let parsed = Frame::parse(&ManagementFrame::disassoc(bssid, client, bssid, 3).to_bytes())
            .unwrap();
        assert_eq!(parsed.subtype(), FrameSubtype::Disassociation);
        assert_eq!(parsed.header.addr1, bssid);
        assert_eq!(parsed.header.addr2, client);
        assert_eq!(parsed.deauth_reason(), Some(3));
    }

    #[test]
    fn address_extraction_follows_ds_bits() {
        let a1 = MacAddress([1; 6]);
        let a2 = MacAddress([2; 6]);
        let a3 = MacAddress([3; 6]);

        let mk = |raw: u16| Dot11Header {
            frame_control: FrameControl::new(raw),
            duration: 0,
            addr1: a1,
            addr2: a2,
            addr3: a3,
            sequence: 0,
        };

        // To-DS: BSSID = addr1, client = addr2.
        assert_eq!(mk(0x0108).bssid_and_client(), Some((a1, a2)));
        // From-DS: BSSID = addr2, client = addr1.
        assert_eq!(mk(0x0208).bssid_and_client(), Some((a2, a1)));
        // Neither: BSSID = addr3, client = addr2.
        assert_eq!(mk(0x0008).bssid_and_client(), Some((a3, a2)));
        // WDS: skipped.
        assert_eq!(mk(0x0308).bssid_and_client(), None);
    }

    #[test]
    fn truncated_header_rejected() {
        let mut bytes = ManagementFrame::deauth(
            MacAddress::BROADCAST,
            MacAddress::ZERO,
            MacAddress::ZERO,
            1,
        )
        .to_bytes();
        bytes.truncate(INJECTION_HEADER.len() + 12);
        assert!(Frame::parse(&bytes).is_err());
    }

    #[test]
    fn eapol_body_requires_llc_snap() {
        // Data frame, no QoS, body too short / wrong LLC.
        let mut raw = Vec::new();
        raw.extend_from_slice(&INJECTION_HEADER);
        raw.extend_from_slice(&0x0008u16.to_le_bytes()); // data frame
        raw.extend_from_slice(&[0u8; 22]); // duration + addresses + seq
        raw.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00]); // IPv4, not EAPOL
        raw.extend_from_slice(&[0u8; 8]);

        let frame = Frame::parse(&raw).unwrap();
        assert!(frame.eapol_body().is_none());
    }
}

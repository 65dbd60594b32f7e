//! EAPOL-Key frame parsing and handshake message classification.
//!
//! Field layout follows IEEE 802.1X / 802.11i. Parsing is strict: a key
//! frame is at least [`HEADER_LEN`] octets, and serialization reproduces the
//! parsed bytes exactly so captured frames survive a parse/serialize cycle.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, WirelessError};

/// EAPOL packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapolType {
    Packet = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
    EncapsulatedAsf = 4,
}

/// Fixed portion of an EAPOL-Key frame: 4-byte EAPOL header plus the 95-byte
/// key descriptor, before any trailing key data.
pub const HEADER_LEN: usize = 99;

/// Offset of the 16-byte MIC field within the EAPOL body.
pub const MIC_OFFSET: usize = 81;

/// Length of the MIC field.
pub const MIC_LEN: usize = 16;

/// WPA key-information bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    raw: u16,
}

impl KeyInfo {
    pub fn new(raw: u16) -> Self {
        Self { raw }
    }

    /// Key descriptor version (1 = TKIP/MD5, 2 = CCMP/SHA1).
    pub fn descriptor_version(&self) -> u8 {
        (self.raw & 0x0007) as u8
    }

    /// Pairwise key (true) or group key (false).
    pub fn is_pairwise(&self) -> bool {
        self.raw & 0x0008 != 0
    }

    /// Install flag.
    pub fn install(&self) -> bool {
        self.raw & 0x0040 != 0
    }

    /// ACK flag (set by the AP in messages 1 and 3).
    pub fn ack(&self) -> bool {
        self.raw & 0x0080 != 0
    }

    /// MIC flag (set when the MIC field is populated).
    pub fn mic(&self) -> bool {
        self.raw & 0x0100 != 0
    }

    /// Secure flag.
    pub fn secure(&self) -> bool {
        self.raw & 0x0200 != 0
    }

    /// Error flag.
    pub fn error(&self) -> bool {
        self.raw & 0x0400 != 0
    }

    /// Request flag.
    pub fn request(&self) -> bool {
        self.raw & 0x0800 != 0
    }

    /// Encrypted key data flag.
    pub fn encrypted_key_data(&self) -> bool {
        self.raw & 0x1000 != 0
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }
}

/// Position of a key frame within the 4-way handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMessage {
    M1,
    M2,
    M3,
    M4,
    Unknown,
}

impl KeyMessage {
    /// Slot index (0..4) for the message, if it is one of M1..M4.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::M1 => Some(0),
            Self::M2 => Some(1),
            Self::M3 => Some(2),
            Self::M4 => Some(3),
            Self::Unknown => None,
        }
    }

    /// Classify from the key-information bitmap and the nonce content.
    ///
    /// M2 and M4 share their flag pattern; a zeroed nonce distinguishes M4
    /// (it carries no SNonce), and M4 additionally has the secure bit set.
    pub fn classify(info: KeyInfo, nonce: &[u8; 32]) -> Self {
        let nonce_zero = nonce.iter().all(|&b| b == 0);

        match (info.ack(), info.mic(), info.install()) {
            (true, false, false) => Self::M1,
            (false, true, false) if !nonce_zero => Self::M2,
            (true, true, true) if info.secure() => Self::M3,
            (false, true, false) if info.secure() && nonce_zero => Self::M4,
            _ => Self::Unknown,
        }
    }
}

/// Parsed EAPOL-Key frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolKeyFrame {
    pub version: u8,
    pub frame_type: u8,
    /// EAPOL body length (big-endian on the wire), excluding the 4-byte
    /// EAPOL header itself.
    pub body_len: u16,
    pub descriptor_type: u8,
    pub key_info: KeyInfo,
    pub key_length: u16,
    pub replay_counter: u64,
    pub nonce: [u8; 32],
    pub iv: [u8; 16],
    pub rsc: [u8; 8],
    pub id: [u8; 8],
    pub mic: [u8; 16],
    pub data_len: u16,
    pub data: Vec<u8>,
}

impl EapolKeyFrame {
    /// Parse an EAPOL-Key frame from the start of an EAPOL body.
    ///
    /// Requires at least [`HEADER_LEN`] octets and frame type Key.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(WirelessError::frame(format!(
                "EAPOL key frame too short: {} bytes",
                data.len()
            )));
        }
        if data[1] != EapolType::Key as u8 {
            return Err(WirelessError::frame(format!(
                "not an EAPOL-Key frame: type {}",
                data[1]
            )));
        }

        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(&data[17..49]);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data[49..65]);
        let mut rsc = [0u8; 8];
        rsc.copy_from_slice(&data[65..73]);
        let mut id = [0u8; 8];
        id.copy_from_slice(&data[73..81]);
        let mut mic = [0u8; 16];
        mic.copy_from_slice(&data[MIC_OFFSET..MIC_OFFSET + MIC_LEN]);

        let data_len = BigEndian::read_u16(&data[97..99]);
        let available = data.len() - HEADER_LEN;
        let key_data = data[HEADER_LEN..HEADER_LEN + (data_len as usize).min(available)].to_vec();

        Ok(Self {
            version: data[0],
            frame_type: data[1],
            body_len: BigEndian::read_u16(&data[2..4]),
            descriptor_type: data[4],
            key_info: KeyInfo::new(BigEndian::read_u16(&data[5..7])),
            key_length: BigEndian::read_u16(&data[7..9]),
            replay_counter: BigEndian::read_u64(&data[9..17]),
            nonce,
            iv,
            rsc,
            id,
            mic,
            data_len,
            data: key_data,
        })
    }

    /// Serialize back to wire bytes.
    ///
    /// Reproduces the parsed representation exactly (header fields are kept
    /// verbatim rather than recomputed), so `to_bytes(parse(x))` equals `x`
    /// up to trailing padding beyond the declared key-data length.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len());
        out.push(self.version);
        out.push(self.frame_type);
        out.extend_from_slice(&self.body_len.to_be_bytes());
        out.push(self.descriptor_type);
        out.extend_from_slice(&self.key_info.raw().to_be_bytes());
        out.extend_from_slice(&self.key_length.to_be_bytes());
        out.extend_from_slice(&self.replay_counter.to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.rsc);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.mic);
        out.extend_from_slice(&self.data_len.to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Classify this frame within the 4-way handshake.
    pub fn message(&self) -> KeyMessage {
        KeyMessage::classify(self.key_info, &self.nonce)
    }
}

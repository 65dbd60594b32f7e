//! Beacon and probe-response information element parsing.
//!
//! Walks the tagged parameters after the fixed beacon fields and recovers
//! the ESSID, DS channel, security configuration (RSN / WPA vendor IE /
//! privacy capability), and WPS presence.

use byteorder::{ByteOrder, LittleEndian};

use crate::targets::{Cipher, Encryption};

/// Element IDs the scanner cares about.
const IE_SSID: u8 = 0;
const IE_DS_PARAMS: u8 = 3;
const IE_RSN: u8 = 48;
const IE_VENDOR: u8 = 221;

/// Microsoft OUI prefixes used by the WPA v1 and WPS vendor elements.
const VENDOR_WPA: [u8; 4] = [0x00, 0x50, 0xF2, 0x01];
const VENDOR_WPS: [u8; 4] = [0x00, 0x50, 0xF2, 0x04];

/// Privacy bit in the capability information field.
const CAP_PRIVACY: u16 = 0x0010;

/// Length of the fixed parameters before the tagged ones: timestamp (8) +
/// beacon interval (2) + capability info (2).
const FIXED_PARAMS_LEN: usize = 12;

/// Network attributes advertised by a beacon or probe response.
#[derive(Debug, Clone, Default)]
pub struct BeaconInfo {
    /// Advertised network name; empty for hidden networks.
    pub essid: String,
    /// DS parameter-set channel, if present.
    pub channel: Option<u8>,
    /// Encryption class derived from RSN / WPA vendor elements. `Open` when
    /// no security element was found; combine with [`BeaconInfo::privacy`]
    /// to detect WEP.
    pub encryption: Encryption,
    /// Pairwise cipher from the security element.
    pub cipher: Cipher,
    /// WPS vendor element present.
    pub wps: bool,
    /// Privacy bit from the capability field.
    pub privacy: bool,
}

/// Parse the body of a beacon or probe-response frame (fixed parameters
/// followed by tagged elements). Truncated or malformed elements end the
/// walk; whatever was recovered up to that point is returned.
pub fn parse_beacon_body(body: &[u8]) -> Option<BeaconInfo> {
    if body.len() < FIXED_PARAMS_LEN {
        return None;
    }

    let capability = LittleEndian::read_u16(&body[10..12]);
    let mut info = BeaconInfo {
        privacy: capability & CAP_PRIVACY != 0,
        ..Default::default()
    };

    let mut tags = &body[FIXED_PARAMS_LEN..];
    while tags.len() >= 2 {
        let id = tags[0];
        let len = tags[1] as usize;
        if tags.len() < 2 + len {
            break;
        }
        let value = &tags[2..2 + len];

        match id {
            IE_SSID => {
                info.essid = String::from_utf8_lossy(value).into_owned();
            }
            IE_DS_PARAMS => {
                if let Some(&ch) = value.first() {
                    info.channel = Some(ch);
                }
            }
            IE_RSN => {
                let (enc, cipher) = parse_rsn(value);
                info.encryption = enc;
                info.cipher = cipher;
            }
            IE_VENDOR => {
                if value.len() >= 4 && value[..4] == VENDOR_WPS {
                    info.wps = true;
                } else if value.len() >= 4
                    && value[..4] == VENDOR_WPA
                    && info.encryption == Encryption::Open
                {
                    // WPA v1 vendor element; RSN takes precedence if both
                    // are advertised.
                    info.encryption = Encryption::Wpa;
                    info.cipher = Cipher::Tkip;
                }
            }
            _ => {}
        }

        tags = &tags[2 + len..];
    }

    Some(info)
}

/// Parse an RSN element: version, group cipher suite, pairwise suite list,
/// AKM suite list. Suite selectors are 4 octets (OUI + type); counts are
/// little-endian.
fn parse_rsn(data: &[u8]) -> (Encryption, Cipher) {
    // An RSN element at all means at least WPA2/CCMP; refine from the
    // suite lists when they are intact.
    let mut enc = Encryption::Wpa2;
    let mut cipher = Cipher::Ccmp;

    if data.len() < 8 {
        return (enc, cipher);
    }

    // version (2) + group suite (4), then the pairwise suite count.
    let pairwise_count = LittleEndian::read_u16(&data[6..8]) as usize;
    let pairwise_end = 8 + pairwise_count * 4;
    if data.len() < pairwise_end || pairwise_count == 0 {
        return (enc, cipher);
    }

    // First pairwise suite decides the cipher class.
    match data[8 + 3] {
        2 => cipher = Cipher::Tkip,
        4 => cipher = Cipher::Ccmp,
        _ => {}
    }

    if data.len() < pairwise_end + 2 {
        return (enc, cipher);
    }
    let akm_count = LittleEndian::read_u16(&data[pairwise_end..pairwise_end + 2]) as usize;
    let akm_start = pairwise_end + 2;
    if akm_count == 0 || data.len() < akm_start + akm_count * 4 {
        return (enc, cipher);
    }

    for i in 0..akm_count {
        if data[akm_start + i * 4 + 3] == 8 {
            // SAE authentication.
            enc = Encryption::Wpa3;
            break;
        }
    }

    (enc, cipher)
}

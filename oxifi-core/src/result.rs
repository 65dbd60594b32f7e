//! Attack result records.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of an attack against one target, serialized as JSON for the
/// embedding front end and result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackResult {
    pub bssid: String,
    pub essid: String,
    /// The recovered key; absent when the attack only produced a capture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub encryption: String,
    pub attack_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake_file: Option<PathBuf>,
    /// Attack duration as a compact human string ("1m23s").
    #[serde(with = "duration_string")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl CrackResult {
    pub fn cracked(&self) -> bool {
        self.key.is_some()
    }
}

/// Compact `1h2m3s`-style duration encoding (sub-second durations keep
/// millisecond precision).
pub mod duration_string {
    use super::*;
    use serde::de::Error;
    use serde::{Deserializer, Serializer};

    pub fn format(duration: &Duration) -> String {
        let total_secs = duration.as_secs();
        if total_secs == 0 {
            return format!("{}ms", duration.subsec_millis());
        }

        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        let mut out = String::new();
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}m", minutes));
        }
        if seconds > 0 || out.is_empty() {
            out.push_str(&format!("{}s", seconds));
        }
        out
    }

    pub fn parse(s: &str) -> Option<Duration> {
        let mut total = Duration::ZERO;
        let mut digits = String::new();
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }

            let value: u64 = digits.parse().ok()?;
            digits.clear();

            let unit = match c {
                'h' => Duration::from_secs(value * 3600),
                'm' => {
                    if chars.peek() == Some(&'s') {
                        chars.next();
                        Duration::from_millis(value)
                    } else {
                        Duration::from_secs(value * 60)
                    }
                }
                's' => Duration::from_secs(value),
                _ => return None,
            };
            total += unit;
        }

        if digits.is_empty() {
            Some(total)
        } else {
            None
        }
    }

    pub fn serialize<S: Serializer>(duration: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let s: String = serde::Deserialize::deserialize(de)?;
        parse(&s).ok_or_else(|| D::Error::custom(format!("invalid duration: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(duration_string::format(&Duration::from_secs(83)), "1m23s");
        assert_eq!(duration_string::format(&Duration::from_secs(3600)), "1h");
        assert_eq!(duration_string::format(&Duration::from_secs(3723)), "1h2m3s");
        assert_eq!(duration_string::format(&Duration::from_millis(450)), "450ms");
        assert_eq!(duration_string::format(&Duration::ZERO), "0ms");
    }

    #[test]
    fn duration_parsing_round_trip() {
        for secs in [0u64, 1, 59, 60, 83, 3600, 3723, 86400] {
            let d = Duration::from_secs(secs);
            let s = duration_string::format(&d);
            let back = duration_string::parse(&s).unwrap();
            if secs == 0 {
                assert_eq!(back, Duration::ZERO);
            } else {
                assert_eq!(back, d);
            }
        }
        assert!(duration_string::parse("12x").is_none());
        assert!(duration_string::parse("12").is_none());
    }

    #[test]
    fn json_shape() {
        let result = CrackResult {
            bssid: "AA:BB:CC:DD:EE:FF".into(),
            essid: "Network".into(),
            key: Some("password".into()),
            encryption: "WPA2".into(),
            attack_type: "WPA Handshake".into(),
            handshake_file: Some(PathBuf::from("handshakes/hs_Network_AA.cap")),
            duration: Duration::from_secs(83),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["key"], "password");
        assert_eq!(json["duration"], "1m23s");
        assert_eq!(json["attack_type"], "WPA Handshake");

        let back: CrackResult = serde_json::from_value(json).unwrap();
        assert!(back.cracked());
        assert_eq!(back.duration, Duration::from_secs(83));
    }

    #[test]
    fn key_omitted_when_not_cracked() {
        let result = CrackResult {
            bssid: "AA:BB:CC:DD:EE:FF".into(),
            essid: "Network".into(),
            key: None,
            encryption: "WPA2".into(),
            attack_type: "WPA Handshake".into(),
            handshake_file: None,
            duration: Duration::from_secs(5),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("\"key\""));
        assert!(!json.contains("handshake_file"));
    }
}

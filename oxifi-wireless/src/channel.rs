//! WiFi channel plans and hopping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Standard 2.4 GHz channels.
pub const CHANNELS_2_4GHZ: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

/// US 5 GHz channels.
pub const CHANNELS_5GHZ: &[u8] = &[
    36, 40, 44, 48, // UNII-1
    52, 56, 60, 64, // UNII-2A (DFS)
    100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144, // UNII-2C (DFS)
    149, 153, 157, 161, 165, // UNII-3
];

/// Frequency band selection for scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    #[default]
    #[serde(rename = "2ghz")]
    Band2GHz,
    #[serde(rename = "5ghz")]
    Band5GHz,
    Both,
}

impl Band {
    /// Channel hop plan for this band.
    pub fn channels(&self) -> Vec<u8> {
        match self {
            Self::Band2GHz => CHANNELS_2_4GHZ.to_vec(),
            Self::Band5GHz => CHANNELS_5GHZ.to_vec(),
            Self::Both => {
                let mut all = CHANNELS_2_4GHZ.to_vec();
                all.extend_from_slice(CHANNELS_5GHZ);
                all
            }
        }
    }
}

/// Round-robin channel hopper.
///
/// Channel switching itself is performed by the injected setter, keeping
/// platform tuning outside this crate.
pub struct ChannelHopper {
    channels: Vec<u8>,
    current: usize,
    dwell: Duration,
    setter: Box<dyn FnMut(u8) -> Result<()> + Send>,
}

impl ChannelHopper {
    pub fn new<F>(channels: Vec<u8>, dwell: Duration, setter: F) -> Self
    where
        F: FnMut(u8) -> Result<()> + Send + 'static,
    {
        Self {
            channels,
            current: 0,
            dwell,
            setter: Box::new(setter),
        }
    }

    /// Hopper over a band's plan with the default dwell time.
    pub fn for_band<F>(band: Band, setter: F) -> Self
    where
        F: FnMut(u8) -> Result<()> + Send + 'static,
    {
        Self::new(band.channels(), Duration::from_millis(200), setter)
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    pub fn current_channel(&self) -> u8 {
        self.channels[self.current]
    }

    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Advance to the next channel and tune to it.
    pub fn hop(&mut self) -> Result<u8> {
        self.current = (self.current + 1) % self.channels.len();
        let channel = self.channels[self.current];
        (self.setter)(channel)?;
        Ok(channel)
    }

    /// Tune to a specific channel, keeping the rotation position in sync.
    pub fn hop_to(&mut self, channel: u8) -> Result<()> {
        if let Some(idx) = self.channels.iter().position(|&c| c == channel) {
            self.current = idx;
        }
        (self.setter)(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn band_plans() {
        assert_eq!(Band::Band2GHz.channels(), CHANNELS_2_4GHZ);
        assert_eq!(Band::Band5GHz.channels(), CHANNELS_5GHZ);
        assert_eq!(
            Band::Both.channels().len(),
            CHANNELS_2_4GHZ.len() + CHANNELS_5GHZ.len()
        );
    }

    #[test]
    fn hopper_cycles_and_tunes() {
        let tuned = Arc::new(Mutex::new(Vec::new()));
        let tuned2 = tuned.clone();
        let mut hopper = ChannelHopper::new(vec![1, 6, 11], Duration::from_millis(10), move |ch| {
            tuned2.lock().unwrap().push(ch);
            Ok(())
        });

        assert_eq!(hopper.current_channel(), 1);
        assert_eq!(hopper.hop().unwrap(), 6);
        assert_eq!(hopper.hop().unwrap(), 11);
        assert_eq!(hopper.hop().unwrap(), 1);
        assert_eq!(*tuned.lock().unwrap(), vec![6, 11, 1]);
    }

    #[test]
    fn hop_to_repositions() {
        let mut hopper =
            ChannelHopper::new(vec![1, 6, 11], Duration::from_millis(10), |_| Ok(()));
        hopper.hop_to(6).unwrap();
        assert_eq!(hopper.current_channel(), 6);
        assert_eq!(hopper.hop().unwrap(), 11);
    }
}

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::common::errors::{PlayerError, Result};

pub const BAND_COUNT: usize = 15;

const MIN_GAIN: f32 = -0.25;
const MAX_GAIN: f32 = 1.0;

/// Gain levels rendered by `visualise`, top row first.
const VISUALISE_GAINS: [f32; 14] = [
    1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0, -0.1, -0.2, -0.25,
];

/// Fixed 15-band gain vector. The session owns it; the gateway receives a
/// copy of the bands on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equalizer {
    bands: [f32; BAND_COUNT],
}

impl Equalizer {
    pub fn new() -> Self {
        Self {
            bands: [0.0; BAND_COUNT],
        }
    }

    /// Store a gain for `band`. The gain is clamped to [-0.25, 1.0]; a band
    /// index outside [0, 15) is an error.
    pub fn set_gain(&mut self, band: usize, gain: f32) -> Result<f32> {
        if band >= BAND_COUNT {
            return Err(PlayerError::OutOfRange("band"));
        }
        let gain = gain.clamp(MIN_GAIN, MAX_GAIN);
        self.bands[band] = gain;
        Ok(gain)
    }

    pub fn get_gain(&self, band: usize) -> Result<f32> {
        if band >= BAND_COUNT {
            return Err(PlayerError::OutOfRange("band"));
        }
        Ok(self.bands[band])
    }

    pub fn bands(&self) -> &[f32; BAND_COUNT] {
        &self.bands
    }

    /// Render the bands as a text bar chart: one row per gain level from
    /// +1.00 down to -0.25, a `[]` cell for every band at or above that
    /// level, and a numbered axis at the bottom.
    pub fn visualise(&self) -> String {
        let mut block = String::new();

        for gain in VISUALISE_GAINS {
            let prefix = if gain > 0.0 {
                "+"
            } else if gain == 0.0 {
                " "
            } else {
                ""
            };
            let _ = write!(block, "{}{:.2} | ", prefix, gain);

            for value in self.bands {
                block.push_str(if value >= gain { "[] " } else { "   " });
            }
            block.push('\n');
        }

        let bottom: Vec<String> = (1..=BAND_COUNT).map(|b| format!("{:02}", b)).collect();
        block.push_str(&" ".repeat(8));
        block.push_str(&bottom.join(" "));
        block
    }
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

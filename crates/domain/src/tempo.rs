use serde::{Deserialize, Serialize};

use crate::DomainError;

pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 300.0;

/// A validated tempo in beats per minute.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self, DomainError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(DomainError::config("tempo must be a positive number"));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(DomainError::config(format!(
                "tempo bpm must be between {MIN_BPM} and {MAX_BPM}, got {bpm}"
            )));
        }
        Ok(Self { bpm })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }
}

pub fn ms_per_beat(bpm: f64) -> f64 {
    60_000.0 / bpm
}

/// Spacing of `subdivision` evenly divided clicks within one beat.
pub fn ms_per_subdivision(bpm: f64, subdivision: u32) -> f64 {
    ms_per_beat(bpm) / subdivision.max(1) as f64
}

impl TryFrom<f64> for Tempo {
    type Error = DomainError;

    fn try_from(bpm: f64) -> Result<Self, Self::Error> {
        Tempo::new(bpm)
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm
    }
}

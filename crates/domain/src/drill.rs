use serde::{Deserialize, Serialize};

use crate::{tempo::Tempo, DomainError};

pub const MAX_VELOCITY: u8 = 127;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VelocityTargets {
    pub accent: u8,
    pub tap: u8,
    pub tolerance: u8,
}

/// Timing windows in milliseconds, ordered `good <= ok <= bad`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimingThresholds {
    pub good_ms: f64,
    pub ok_ms: f64,
    pub bad_ms: f64,
}

impl TimingThresholds {
    pub fn new(good_ms: f64, ok_ms: f64, bad_ms: f64) -> Result<Self, DomainError> {
        let thresholds = Self {
            good_ms,
            ok_ms,
            bad_ms,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let all = [self.good_ms, self.ok_ms, self.bad_ms];
        if all.iter().any(|ms| !ms.is_finite() || *ms < 0.0) {
            return Err(DomainError::config(
                "timing thresholds must be finite and non-negative",
            ));
        }
        if !(self.good_ms <= self.ok_ms && self.ok_ms <= self.bad_ms) {
            return Err(DomainError::config(format!(
                "timing thresholds must satisfy good <= ok <= bad, got {}/{}/{}",
                self.good_ms, self.ok_ms, self.bad_ms
            )));
        }
        Ok(())
    }
}

/// A rhythmic exercise played against the click.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Drill {
    pub id: String,
    pub name: String,
    pub tempo_bpm: f64,
    pub subdivision: u32,
    pub beats_per_bar: u32,
    pub bars: u32,
    pub stickings: Vec<String>,
    /// Accent flags, applied cyclically over the grid.
    pub accents: Vec<u8>,
    pub velocity_targets: VelocityTargets,
    pub timing: TimingThresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Drill {
    pub fn validate(&self) -> Result<(), DomainError> {
        Tempo::new(self.tempo_bpm)?;
        check_range("subdivision", self.subdivision, 16)?;
        check_range("beats_per_bar", self.beats_per_bar, 16)?;
        check_range("bars", self.bars, 32)?;
        if self.accents.is_empty() {
            return Err(DomainError::config("accent pattern cannot be empty"));
        }
        if self.stickings.is_empty() {
            return Err(DomainError::config("sticking pattern cannot be empty"));
        }
        let targets = self.velocity_targets;
        if [targets.accent, targets.tap, targets.tolerance]
            .iter()
            .any(|v| *v > MAX_VELOCITY)
        {
            return Err(DomainError::config(format!(
                "velocity targets must be within 0..={MAX_VELOCITY}"
            )));
        }
        self.timing.validate()
    }

    pub fn total_slots(&self) -> usize {
        (self.beats_per_bar * self.bars * self.subdivision) as usize
    }

    /// Whether the slot falls on a non-zero position of the accent cycle.
    pub fn is_accent(&self, slot_index: usize) -> bool {
        if self.accents.is_empty() {
            return false;
        }
        self.accents[slot_index % self.accents.len()] != 0
    }

    pub fn sticking_for(&self, slot_index: usize) -> Option<&str> {
        if self.stickings.is_empty() {
            return None;
        }
        Some(self.stickings[slot_index % self.stickings.len()].as_str())
    }

    pub fn summary(&self) -> DrillSummary {
        DrillSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            tempo_bpm: self.tempo_bpm,
            subdivision: self.subdivision,
            beats_per_bar: self.beats_per_bar,
            bars: self.bars,
        }
    }
}

/// The subset of a drill sent to clients when a session starts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DrillSummary {
    pub id: String,
    pub name: String,
    pub tempo_bpm: f64,
    pub subdivision: u32,
    pub beats_per_bar: u32,
    pub bars: u32,
}

fn check_range(field: &str, value: u32, max: u32) -> Result<(), DomainError> {
    if value == 0 || value > max {
        return Err(DomainError::config(format!(
            "{field} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_drill() -> Drill {
    Drill {
        id: "test_paradiddle".into(),
        name: "Test Paradiddle".into(),
        tempo_bpm: 120.0,
        subdivision: 4,
        beats_per_bar: 4,
        bars: 4,
        stickings: ["R", "L", "R", "R", "L", "R", "L", "L"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        accents: vec![1, 0, 0, 0, 1, 0, 0, 0],
        velocity_targets: VelocityTargets {
            accent: 100,
            tap: 40,
            tolerance: 15,
        },
        timing: TimingThresholds {
            good_ms: 10.0,
            ok_ms: 20.0,
            bad_ms: 40.0,
        },
        created_by: None,
    }
}

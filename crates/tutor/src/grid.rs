use stickler_domain::{config::DEFAULT_LEAD_IN_MS, tempo::ms_per_subdivision, Drill};
use tracing::debug;

use crate::error::TutorError;

/// Absolute target times for every slot of a drill, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    slots: Vec<f64>,
    ms_per_slot: f64,
    tempo_bpm: f64,
}

impl Grid {
    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; the builder rejects empty grids.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ms_per_slot(&self) -> f64 {
        self.ms_per_slot
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn first_slot(&self) -> f64 {
        self.slots[0]
    }

    pub fn slot_time(&self, index: usize) -> Option<f64> {
        self.slots.get(index).copied()
    }
}

/// Derives a [`Grid`] from tempo, meter and length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBuilder {
    pub tempo_bpm: f64,
    pub subdivision: u32,
    pub beats_per_bar: u32,
    pub bars: u32,
    pub lead_in_ms: f64,
}

impl GridBuilder {
    pub fn new(tempo_bpm: f64, subdivision: u32, beats_per_bar: u32, bars: u32) -> Self {
        Self {
            tempo_bpm,
            subdivision,
            beats_per_bar,
            bars,
            lead_in_ms: DEFAULT_LEAD_IN_MS,
        }
    }

    pub fn from_drill(drill: &Drill) -> Self {
        Self::new(
            drill.tempo_bpm,
            drill.subdivision,
            drill.beats_per_bar,
            drill.bars,
        )
    }

    pub fn tempo(mut self, tempo_bpm: f64) -> Self {
        self.tempo_bpm = tempo_bpm;
        self
    }

    pub fn lead_in(mut self, lead_in_ms: f64) -> Self {
        self.lead_in_ms = lead_in_ms;
        self
    }

    pub fn total_slots(&self) -> usize {
        self.beats_per_bar as usize * self.bars as usize * self.subdivision as usize
    }

    pub fn ms_per_slot(&self) -> f64 {
        ms_per_subdivision(self.tempo_bpm, self.subdivision)
    }

    /// Lay out the grid so slot `i` sits at `anchor_ms + lead_in + i * ms_per_slot`.
    pub fn build(&self, anchor_ms: f64) -> Result<Grid, TutorError> {
        if !self.tempo_bpm.is_finite() || self.tempo_bpm <= 0.0 {
            return Err(TutorError::config(format!(
                "tempo must be positive, got {}",
                self.tempo_bpm
            )));
        }
        let total_slots = self.total_slots();
        if total_slots == 0 {
            return Err(TutorError::config(
                "grid needs at least one slot (subdivision, beats per bar and bars must be non-zero)",
            ));
        }
        if !anchor_ms.is_finite() || !self.lead_in_ms.is_finite() {
            return Err(TutorError::config("grid anchor and lead-in must be finite"));
        }

        let ms_per_slot = self.ms_per_slot();
        let start = anchor_ms + self.lead_in_ms;
        let slots = (0..total_slots)
            .map(|index| start + index as f64 * ms_per_slot)
            .collect();
        debug!(
            tempo_bpm = self.tempo_bpm,
            total_slots, ms_per_slot, start, "built grid"
        );
        Ok(Grid {
            slots,
            ms_per_slot,
            tempo_bpm: self.tempo_bpm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_follows_tempo_and_subdivision() {
        let grid = GridBuilder::new(120.0, 4, 4, 4).build(0.0).unwrap();
        assert_eq!(grid.len(), 64);
        assert_eq!(grid.ms_per_slot(), 125.0);
        assert_eq!(grid.first_slot(), 1000.0);
        assert_eq!(grid.slot_time(1), Some(1125.0));
        assert_eq!(grid.slot_time(63), Some(1000.0 + 63.0 * 125.0));
        assert_eq!(grid.slot_time(64), None);
    }

    #[test]
    fn lead_in_and_anchor_shift_every_slot() {
        let grid = GridBuilder::new(60.0, 1, 3, 1)
            .lead_in(250.0)
            .build(10_000.0)
            .unwrap();
        assert_eq!(grid.slots(), &[10_250.0, 11_250.0, 12_250.0]);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let builder = GridBuilder::new(97.0, 3, 7, 2);
        assert_eq!(builder.build(42.0).unwrap(), builder.build(42.0).unwrap());
    }

    #[test]
    fn rejects_empty_or_tempoless_grids() {
        assert!(matches!(
            GridBuilder::new(120.0, 0, 4, 4).build(0.0),
            Err(TutorError::Config(_))
        ));
        assert!(GridBuilder::new(120.0, 4, 0, 4).build(0.0).is_err());
        assert!(GridBuilder::new(120.0, 4, 4, 0).build(0.0).is_err());
        assert!(GridBuilder::new(0.0, 4, 4, 4).build(0.0).is_err());
        assert!(GridBuilder::new(-90.0, 4, 4, 4).build(0.0).is_err());
    }

    #[test]
    fn tempo_override_changes_spacing_only() {
        let base = GridBuilder::new(120.0, 4, 4, 1);
        let slower = base.tempo(60.0).build(0.0).unwrap();
        assert_eq!(slower.len(), 16);
        assert_eq!(slower.ms_per_slot(), 250.0);
    }
}

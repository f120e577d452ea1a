use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::session_id::SessionId;

/// Running quality figures recomputed after every hit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RollingFigures {
    pub timing: f64,
    pub dynamics: f64,
    pub diamond: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HitFeedback {
    pub slot_idx: usize,
    /// Signed offset from the slot; negative is early.
    pub delta_ms: f64,
    pub velocity: u8,
    pub velocity_target: u8,
    pub timing_score: f64,
    pub dyn_score: f64,
    pub rolling: RollingFigures,
}

/// Summary of a finished take.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TakeMetrics {
    pub timing_mean: f64,
    pub timing_std: f64,
    pub dynamics_mean: f64,
    pub dynamics_std: f64,
    pub diamond_score: f64,
    pub total_hits: usize,
    pub missed_slots: usize,
}

impl TakeMetrics {
    pub fn empty(total_slots: usize) -> Self {
        Self {
            timing_mean: 0.0,
            timing_std: 0.0,
            dynamics_mean: 0.0,
            dynamics_std: 0.0,
            diamond_score: 0.0,
            total_hits: 0,
            missed_slots: total_slots,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Take {
    pub session_id: SessionId,
    pub metrics: TakeMetrics,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetronomeTick {
    /// Subdivisions elapsed since the metronome was started.
    pub tick: u64,
    pub beat: u32,
    pub subdivision: u32,
    pub is_downbeat: bool,
    pub is_beat: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct MetronomeStatus {
    pub running: bool,
    pub beat: u32,
    pub subdivision: u32,
    pub tempo_bpm: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_report_every_slot_missed() {
        let metrics = TakeMetrics::empty(64);
        assert_eq!(metrics.total_hits, 0);
        assert_eq!(metrics.missed_slots, 64);
        assert_eq!(metrics.diamond_score, 0.0);
    }
}

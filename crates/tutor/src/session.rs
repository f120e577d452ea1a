use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ringbuf::{HeapRb, Rb};
use stickler_domain::{
    Drill, EngineConfig, HitEvent, HitFeedback, HitKind, SessionId, TakeMetrics, Tempo,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    clock::Clock,
    error::TutorError,
    grid::{Grid, GridBuilder},
    matcher::nearest_slot,
    rolling::RollingAggregator,
    scoring::{dynamics_score, timing_score},
};

/// Per-session settings supplied at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionOptions {
    pub client_offset_ms: Option<f64>,
    pub tempo_override: Option<f64>,
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    pub slot_index: usize,
    pub delta_ms: f64,
    pub velocity: u8,
}

enum HitHistory {
    Unbounded(Vec<HitRecord>),
    Bounded(HeapRb<HitRecord>),
}

impl HitHistory {
    fn new(bounded: bool, capacity: usize) -> Self {
        if bounded {
            HitHistory::Bounded(HeapRb::new(capacity.max(1)))
        } else {
            HitHistory::Unbounded(Vec::new())
        }
    }

    fn push(&mut self, record: HitRecord) {
        match self {
            HitHistory::Unbounded(records) => records.push(record),
            HitHistory::Bounded(ring) => {
                ring.push_overwrite(record);
            }
        }
    }

    fn records(&self) -> Vec<HitRecord> {
        match self {
            HitHistory::Unbounded(records) => records.clone(),
            HitHistory::Bounded(ring) => ring.iter().copied().collect(),
        }
    }

    fn len(&self) -> usize {
        match self {
            HitHistory::Unbounded(records) => records.len(),
            HitHistory::Bounded(ring) => ring.len(),
        }
    }
}

impl fmt::Debug for HitHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitHistory::Unbounded(records) => {
                f.debug_tuple("Unbounded").field(&records.len()).finish()
            }
            HitHistory::Bounded(ring) => f.debug_tuple("Bounded").field(&ring.len()).finish(),
        }
    }
}

/// Scoring state for one practice take.
///
/// Owns the grid, the hit history and the rolling statistics. A finalized
/// engine refuses further hits.
pub struct SessionEngine {
    id: SessionId,
    drill: Drill,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    client_offset_ms: f64,
    grid: Grid,
    history: HitHistory,
    hit_slots: BTreeSet<usize>,
    total_hits: usize,
    rolling: RollingAggregator,
    finalized: bool,
}

impl fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEngine")
            .field("id", &self.id)
            .field("drill", &self.drill.id)
            .field("client_offset_ms", &self.client_offset_ms)
            .field("tempo_bpm", &self.grid.tempo_bpm())
            .field("history", &self.history)
            .field("rolling", &self.rolling)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl SessionEngine {
    pub fn new(
        id: SessionId,
        drill: Drill,
        options: SessionOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TutorError> {
        drill.validate()?;
        options.config.validate()?;
        let tempo_bpm = match options.tempo_override {
            Some(bpm) => Tempo::new(bpm)?.bpm(),
            None => drill.tempo_bpm,
        };
        let client_offset_ms = options.client_offset_ms.unwrap_or(0.0);
        if !client_offset_ms.is_finite() {
            return Err(TutorError::validation("client offset must be finite"));
        }

        let grid = GridBuilder::from_drill(&drill)
            .tempo(tempo_bpm)
            .lead_in(options.config.lead_in_ms)
            .build(clock.now_ms())?;
        info!(
            session = %id,
            drill = %drill.id,
            tempo_bpm,
            slots = grid.len(),
            client_offset_ms,
            "session created"
        );

        Ok(Self {
            id,
            history: HitHistory::new(options.config.bounded_history, grid.len()),
            drill,
            config: options.config,
            clock,
            client_offset_ms,
            grid,
            hit_slots: BTreeSet::new(),
            total_hits: 0,
            rolling: RollingAggregator::new(),
            finalized: false,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn drill(&self) -> &Drill {
        &self.drill
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.grid.tempo_bpm()
    }

    pub fn client_offset_ms(&self) -> f64 {
        self.client_offset_ms
    }

    pub fn rolling(&self) -> &RollingAggregator {
        &self.rolling
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    pub fn history(&self) -> Vec<HitRecord> {
        self.history.records()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Score any hit. Audio frames produce no feedback.
    pub fn process_hit(&mut self, hit: &HitEvent) -> Result<Option<HitFeedback>, TutorError> {
        match hit.kind {
            HitKind::Midi => self.process_midi_hit(hit).map(Some),
            HitKind::Audio => self.process_audio_frame(hit),
        }
    }

    pub fn process_midi_hit(&mut self, hit: &HitEvent) -> Result<HitFeedback, TutorError> {
        self.ensure_open()?;
        let velocity = hit.midi_velocity().map_err(|err| {
            warn!(session = %self.id, error = %err, "rejected hit");
            TutorError::from(err)
        })?;

        let found = nearest_slot(&self.grid, hit.t, self.client_offset_ms);
        let timing = timing_score(found.delta_ms, &self.drill.timing);
        let dynamics = dynamics_score(velocity, found.slot_index, &self.drill);

        self.history.push(HitRecord {
            slot_index: found.slot_index,
            delta_ms: found.delta_ms,
            velocity,
        });
        self.hit_slots.insert(found.slot_index);
        self.total_hits += 1;
        self.rolling.update(timing, dynamics.score);

        trace!(
            session = %self.id,
            slot = found.slot_index,
            delta_ms = found.delta_ms,
            timing,
            dynamics = dynamics.score,
            "scored hit"
        );

        Ok(HitFeedback {
            slot_idx: found.slot_index,
            delta_ms: found.delta_ms,
            velocity,
            velocity_target: dynamics.target_velocity,
            timing_score: timing,
            dyn_score: dynamics.score,
            rolling: self.rolling.figures(),
        })
    }

    /// Onset detection is not implemented; frames are accepted and ignored.
    pub fn process_audio_frame(
        &mut self,
        hit: &HitEvent,
    ) -> Result<Option<HitFeedback>, TutorError> {
        self.ensure_open()?;
        if hit.kind != HitKind::Audio {
            return Err(TutorError::validation(format!(
                "expected an audio frame, got {:?}",
                hit.kind
            )));
        }
        trace!(session = %self.id, seq = ?hit.seq, "ignoring audio frame");
        Ok(None)
    }

    /// Replace the client-to-server offset for subsequent hits.
    pub fn update_client_offset(&mut self, offset_ms: f64) -> Result<(), TutorError> {
        self.ensure_open()?;
        if !offset_ms.is_finite() {
            return Err(TutorError::validation("client offset must be finite"));
        }
        debug!(
            session = %self.id,
            previous = self.client_offset_ms,
            offset_ms,
            "client offset updated"
        );
        self.client_offset_ms = offset_ms;
        Ok(())
    }

    /// Re-anchor the grid at the current time with a new tempo.
    ///
    /// History and rolling statistics carry over; slot indices reported before
    /// the rebuild refer to the old grid.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn rebuild_grid(&mut self, tempo_bpm: f64) -> Result<(), TutorError> {
        self.ensure_open()?;
        let tempo = Tempo::new(tempo_bpm)?;
        let grid = GridBuilder::from_drill(&self.drill)
            .tempo(tempo.bpm())
            .lead_in(self.config.lead_in_ms)
            .build(self.clock.now_ms())?;
        info!(
            previous_bpm = self.grid.tempo_bpm(),
            ms_per_slot = grid.ms_per_slot(),
            "grid rebuilt"
        );
        self.grid = grid;
        Ok(())
    }

    /// Summarize the take without closing it.
    pub fn metrics(&self) -> TakeMetrics {
        let records = self.history.records();
        if self.total_hits == 0 || records.is_empty() {
            return TakeMetrics::empty(self.grid.len());
        }

        let deltas: Vec<f64> = records.iter().map(|record| record.delta_ms).collect();
        let dyn_scores: Vec<f64> = records
            .iter()
            .map(|record| dynamics_score(record.velocity, record.slot_index, &self.drill).score)
            .collect();
        let (timing_mean, timing_std) = mean_and_std(&deltas);
        let (dynamics_mean, dynamics_std) = mean_and_std(&dyn_scores);

        TakeMetrics {
            timing_mean,
            timing_std,
            dynamics_mean,
            dynamics_std,
            diamond_score: self.rolling.diamond(),
            total_hits: self.total_hits,
            missed_slots: self.grid.len().saturating_sub(self.hit_slots.len()),
        }
    }

    /// Close the take and report on it.
    pub fn finalize(&mut self) -> Result<TakeMetrics, TutorError> {
        self.ensure_open()?;
        let metrics = self.metrics();
        self.finalized = true;
        info!(
            session = %self.id,
            total_hits = metrics.total_hits,
            retained = self.history.len(),
            missed_slots = metrics.missed_slots,
            diamond = metrics.diamond_score,
            "session finalized"
        );
        Ok(metrics)
    }

    fn ensure_open(&self) -> Result<(), TutorError> {
        if self.finalized {
            return Err(TutorError::SessionClosed(self.id));
        }
        Ok(())
    }
}

/// Mean and population standard deviation.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;
    (mean, variance.sqrt())
}

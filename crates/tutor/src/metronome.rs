//! Per-session click clock.
//!
//! The tick loop recomputes its position from the time elapsed since the
//! anchor on every iteration, so a late wake-up never shifts later ticks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stickler_domain::{
    tempo::ms_per_subdivision, MetronomeStatus, MetronomeTick, ServerMessage, SessionId, Tempo,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{error::TutorError, session::SessionEngine};

pub type SharedEngine = Arc<Mutex<SessionEngine>>;

pub(crate) fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, SessionEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Position {
    beat: u32,
    subdivision: u32,
}

/// Counters shared with the tick task.
///
/// A task only writes or sends while `generation` still matches the value it
/// was spawned with; cancelling bumps it under the same lock.
#[derive(Debug, Default)]
struct ClickState {
    position: Position,
    generation: u64,
}

type SharedClick = Arc<Mutex<ClickState>>;

fn lock_click(click: &SharedClick) -> MutexGuard<'_, ClickState> {
    click.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Time between two subdivision clicks.
pub fn subdivision_interval(tempo_bpm: f64, subdivision: u32) -> Duration {
    Duration::from_secs_f64(ms_per_subdivision(tempo_bpm, subdivision) / 1000.0)
}

/// Where the click is after `elapsed` time since the anchor.
pub fn tick_at(
    elapsed: Duration,
    interval: Duration,
    subdivision: u32,
    beats_per_bar: u32,
) -> MetronomeTick {
    let interval_nanos = interval.as_nanos().max(1);
    let total = (elapsed.as_nanos() / interval_nanos) as u64;
    let per_beat = subdivision.max(1) as u64;
    let per_bar = beats_per_bar.max(1) as u64;

    let subdivision = (total % per_beat) as u32;
    let beat = ((total / per_beat) % per_bar) as u32;
    MetronomeTick {
        tick: total,
        beat,
        subdivision,
        is_downbeat: beat == 0 && subdivision == 0,
        is_beat: subdivision == 0,
    }
}

struct TickTask {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Click generator for one session.
///
/// Ticks are pushed to the session's outbound channel. A tempo change stops
/// the click and rebuilds the session grid; the caller restarts it.
pub struct MetronomeClock {
    session_id: SessionId,
    engine: SharedEngine,
    beats_per_bar: u32,
    subdivision: u32,
    tempo_bpm: f64,
    click: SharedClick,
    task: Option<TickTask>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

impl MetronomeClock {
    pub fn new(engine: SharedEngine, outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        let (session_id, beats_per_bar, subdivision, tempo_bpm) = {
            let engine = lock_engine(&engine);
            let drill = engine.drill();
            (
                engine.id(),
                drill.beats_per_bar,
                drill.subdivision,
                engine.tempo_bpm(),
            )
        };
        Self {
            session_id,
            engine,
            beats_per_bar,
            subdivision,
            tempo_bpm,
            click: SharedClick::default(),
            task: None,
            outbound,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map_or(false, |task| !task.handle.is_finished())
    }

    pub fn status(&self) -> MetronomeStatus {
        let position = lock_click(&self.click).position;
        MetronomeStatus {
            running: self.is_running(),
            beat: position.beat,
            subdivision: position.subdivision,
            tempo_bpm: self.tempo_bpm,
        }
    }

    /// Begin clicking from a fresh anchor. Does nothing if already running.
    pub fn start(&mut self) -> MetronomeStatus {
        if self.is_running() {
            return self.status();
        }
        // a task that ended on its own leaves a stale handle behind
        self.task = None;

        let interval = subdivision_interval(self.tempo_bpm, self.subdivision);
        let generation = lock_click(&self.click).generation;
        let (cancel, cancelled) = oneshot::channel();
        let handle = tokio::spawn(run_ticks(TickLoop {
            session_id: self.session_id,
            anchor: Instant::now(),
            interval,
            subdivision: self.subdivision,
            beats_per_bar: self.beats_per_bar,
            click: Arc::clone(&self.click),
            generation,
            outbound: self.outbound.clone(),
            cancelled,
        }));
        self.task = Some(TickTask { cancel, handle });
        info!(
            session = %self.session_id,
            tempo_bpm = self.tempo_bpm,
            interval_ms = interval.as_secs_f64() * 1000.0,
            "metronome started"
        );
        self.publish()
    }

    pub fn stop(&mut self) -> MetronomeStatus {
        if self.cancel_task().is_some() {
            info!(session = %self.session_id, "metronome stopped");
        }
        self.publish()
    }

    /// Stop and rewind the counters to the top of the bar.
    pub fn reset(&mut self) -> MetronomeStatus {
        self.cancel_task();
        lock_click(&self.click).position = Position::default();
        debug!(session = %self.session_id, "metronome reset");
        self.publish()
    }

    /// Change tempo: stops a running click and rebuilds the session grid.
    pub fn update_tempo(&mut self, tempo_bpm: f64) -> Result<MetronomeStatus, TutorError> {
        let tempo = Tempo::new(tempo_bpm)?;
        lock_engine(&self.engine).rebuild_grid(tempo.bpm())?;
        if self.cancel_task().is_some() {
            debug!(session = %self.session_id, "metronome stopped for tempo change");
        }
        info!(
            session = %self.session_id,
            previous_bpm = self.tempo_bpm,
            tempo_bpm = tempo.bpm(),
            "metronome tempo updated"
        );
        self.tempo_bpm = tempo.bpm();
        Ok(self.publish())
    }

    /// Cancel the tick task and hand back its handle so the caller can wait
    /// for it to finish.
    pub fn shutdown(&mut self) -> Option<JoinHandle<()>> {
        self.cancel_task()
    }

    fn cancel_task(&mut self) -> Option<JoinHandle<()>> {
        let task = self.task.take()?;
        lock_click(&self.click).generation += 1;
        // the loop may already be gone if its receiver closed
        let _ = task.cancel.send(());
        Some(task.handle)
    }

    fn publish(&self) -> MetronomeStatus {
        let status = self.status();
        if self
            .outbound
            .send(ServerMessage::MetronomeState(status))
            .is_err()
        {
            debug!(session = %self.session_id, "metronome state dropped, receiver closed");
        }
        status
    }
}

impl Drop for MetronomeClock {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

struct TickLoop {
    session_id: SessionId,
    anchor: Instant,
    interval: Duration,
    subdivision: u32,
    beats_per_bar: u32,
    click: SharedClick,
    generation: u64,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    cancelled: oneshot::Receiver<()>,
}

async fn run_ticks(mut ticks: TickLoop) {
    loop {
        let tick = tick_at(
            ticks.anchor.elapsed(),
            ticks.interval,
            ticks.subdivision,
            ticks.beats_per_bar,
        );
        {
            let mut click = lock_click(&ticks.click);
            if click.generation != ticks.generation {
                return;
            }
            click.position = Position {
                beat: tick.beat,
                subdivision: tick.subdivision,
            };
            // sent under the lock so no tick trails a stop
            if ticks.outbound.send(ServerMessage::MetronomeTick(tick)).is_err() {
                debug!(session = %ticks.session_id, "tick receiver closed, metronome ending");
                return;
            }
        }

        tokio::select! {
            _ = &mut ticks.cancelled => return,
            _ = tokio::time::sleep(ticks.interval) => {}
        }
    }
}

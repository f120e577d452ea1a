//! Live practice sessions and the message boundary to the transport layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use stickler_domain::{
    ClientMessage, Drill, DrillCatalog, EngineConfig, MetronomeStatus, ServerMessage, SessionId,
    Take,
};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::TutorError,
    metronome::{lock_engine, MetronomeClock, SharedEngine},
    session::{SessionEngine, SessionOptions},
};

/// What a client asks for when opening a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSession {
    pub drill_id: String,
    pub client_latency_ms: Option<f64>,
    pub tempo_override: Option<f64>,
}

impl NewSession {
    pub fn new(drill_id: impl Into<String>) -> Self {
        Self {
            drill_id: drill_id.into(),
            ..Default::default()
        }
    }
}

/// A scoring engine paired with its metronome and outbound channel.
pub struct PracticeSession {
    id: SessionId,
    engine: SharedEngine,
    metronome: Mutex<MetronomeClock>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    started_at: OffsetDateTime,
}

impl PracticeSession {
    fn open(
        drill: Drill,
        options: SessionOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>), TutorError> {
        let id = SessionId::new();
        let engine = Arc::new(Mutex::new(SessionEngine::new(id, drill, options, clock)?));
        let (outbound, receiver) = mpsc::unbounded_channel();
        let metronome = MetronomeClock::new(Arc::clone(&engine), outbound.clone());
        let session = Arc::new(Self {
            id,
            engine,
            metronome: Mutex::new(metronome),
            outbound,
            started_at: OffsetDateTime::now_utc(),
        });
        session.push(session.start_message());
        Ok((session, receiver))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn start_message(&self) -> ServerMessage {
        ServerMessage::SessionStart {
            session_id: self.id,
            drill: lock_engine(&self.engine).drill().summary(),
            server_start_time: self.started_at,
        }
    }

    /// Reply to one client message without pushing it anywhere.
    ///
    /// Rejected messages turn into an error record; the session stays usable.
    pub fn handle_message(&self, message: ClientMessage) -> Option<ServerMessage> {
        let result = match message {
            ClientMessage::Calibration { client_offset_ms } => lock_engine(&self.engine)
                .update_client_offset(client_offset_ms)
                .map(|()| Some(ServerMessage::CalibrationUpdate { client_offset_ms })),
            hit => {
                let hit = hit.into_hit()?;
                lock_engine(&self.engine)
                    .process_hit(&hit)
                    .map(|feedback| feedback.map(ServerMessage::HitFeedback))
            }
        };
        result.unwrap_or_else(|err| {
            debug!(session = %self.id, error = %err, "client message rejected");
            Some(ServerMessage::error(err.to_string()))
        })
    }

    /// Parse a raw text frame and reply to it.
    pub fn handle_text(&self, text: &str) -> Option<ServerMessage> {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle_message(message),
            Err(err) => Some(ServerMessage::error(err.to_string())),
        }
    }

    /// Handle a client message and push the reply onto the outbound channel.
    pub fn dispatch(&self, message: ClientMessage) {
        if let Some(reply) = self.handle_message(message) {
            self.push(reply);
        }
    }

    pub fn start_metronome(&self) -> MetronomeStatus {
        self.metronome().start()
    }

    pub fn stop_metronome(&self) -> MetronomeStatus {
        self.metronome().stop()
    }

    pub fn reset_metronome(&self) -> MetronomeStatus {
        self.metronome().reset()
    }

    pub fn update_tempo(&self, tempo_bpm: f64) -> Result<MetronomeStatus, TutorError> {
        self.metronome().update_tempo(tempo_bpm)
    }

    pub fn metronome_status(&self) -> MetronomeStatus {
        self.metronome().status()
    }

    /// Close the take and push the final record.
    pub fn finalize(&self) -> Result<Take, TutorError> {
        let metrics = lock_engine(&self.engine).finalize()?;
        let take = Take {
            session_id: self.id,
            metrics,
            finished_at: OffsetDateTime::now_utc(),
        };
        self.push(ServerMessage::TakeFinished(take.clone()));
        Ok(take)
    }

    fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.metronome().shutdown()
    }

    fn metronome(&self) -> MutexGuard<'_, MetronomeClock> {
        self.metronome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, message: ServerMessage) {
        if self.outbound.send(message).is_err() {
            debug!(session = %self.id, "outbound receiver closed");
        }
    }
}

/// Registry of live sessions, injected into whatever transport serves them.
pub struct SessionStore {
    catalog: RwLock<DrillCatalog>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<SessionId, Arc<PracticeSession>>>,
}

impl SessionStore {
    pub fn new(catalog: DrillCatalog, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            config,
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn drills(&self) -> Vec<Drill> {
        read(&self.catalog).list().cloned().collect()
    }

    pub fn drill(&self, id: &str) -> Option<Drill> {
        read(&self.catalog).get(id).cloned()
    }

    pub fn add_drill(&self, drill: Drill) -> Result<(), TutorError> {
        write(&self.catalog).insert(drill)?;
        Ok(())
    }

    pub fn create_session(
        &self,
        request: NewSession,
    ) -> Result<(Arc<PracticeSession>, mpsc::UnboundedReceiver<ServerMessage>), TutorError> {
        let drill = self
            .drill(&request.drill_id)
            .ok_or_else(|| TutorError::UnknownDrill(request.drill_id.clone()))?;
        self.create_session_with_drill(drill, request.client_latency_ms, request.tempo_override)
    }

    pub fn create_session_with_drill(
        &self,
        drill: Drill,
        client_latency_ms: Option<f64>,
        tempo_override: Option<f64>,
    ) -> Result<(Arc<PracticeSession>, mpsc::UnboundedReceiver<ServerMessage>), TutorError> {
        let options = SessionOptions {
            client_offset_ms: client_latency_ms,
            tempo_override,
            config: self.config,
        };
        let (session, receiver) = PracticeSession::open(drill, options, Arc::clone(&self.clock))?;
        write(&self.sessions).insert(session.id(), Arc::clone(&session));
        info!(session = %session.id(), live = self.len(), "session registered");
        Ok((session, receiver))
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<PracticeSession>, TutorError> {
        read(&self.sessions)
            .get(&id)
            .cloned()
            .ok_or(TutorError::UnknownSession(id))
    }

    pub fn len(&self) -> usize {
        read(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.sessions).is_empty()
    }

    /// Finalize a session, then tear it down.
    pub async fn finalize(&self, id: SessionId) -> Result<Take, TutorError> {
        let session = self.get(id)?;
        self.finish(&session).await
    }

    async fn finish(&self, session: &PracticeSession) -> Result<Take, TutorError> {
        let take = session.finalize()?;
        match self.remove(session.id()).await {
            // removed concurrently; the take is still ours
            Ok(()) | Err(TutorError::UnknownSession(_)) => Ok(take),
            Err(err) => Err(err),
        }
    }

    /// Stop the session's metronome, wait for it, then forget the session.
    pub async fn remove(&self, id: SessionId) -> Result<(), TutorError> {
        let session = self.get(id)?;
        if let Some(handle) = session.shutdown() {
            if let Err(err) = handle.await {
                warn!(session = %id, error = %err, "metronome task ended abnormally");
            }
        }
        write(&self.sessions).remove(&id);
        info!(session = %id, "session removed");
        Ok(())
    }

    pub async fn clear(&self) {
        let ids: Vec<SessionId> = read(&self.sessions).keys().copied().collect();
        for id in ids {
            // a concurrent remove may have won the race
            let _ = self.remove(id).await;
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    drill::DrillSummary,
    events::{HitEvent, HitKind},
    feedback::{HitFeedback, MetronomeStatus, MetronomeTick, Take},
    session_id::SessionId,
    DomainError,
};

/// Inbound messages from a connected practice client.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Midi {
        t: f64,
        #[serde(default)]
        note: Option<u8>,
        #[serde(default)]
        velocity: Option<u8>,
    },
    Audio {
        t: f64,
        #[serde(default)]
        seq: Option<u64>,
        #[serde(default)]
        pcm: Option<String>,
    },
    Calibration {
        client_offset_ms: f64,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        serde_json::from_str(text)
            .map_err(|err| DomainError::validation(format!("invalid message format: {err}")))
    }

    /// The hit carried by this message, if it is one.
    pub fn into_hit(self) -> Option<HitEvent> {
        match self {
            ClientMessage::Midi { t, note, velocity } => Some(HitEvent {
                t,
                kind: HitKind::Midi,
                note,
                velocity,
                seq: None,
                pcm: None,
            }),
            ClientMessage::Audio { t, seq, pcm } => Some(HitEvent {
                t,
                kind: HitKind::Audio,
                note: None,
                velocity: None,
                seq,
                pcm,
            }),
            ClientMessage::Calibration { .. } => None,
        }
    }
}

impl From<HitEvent> for ClientMessage {
    fn from(hit: HitEvent) -> Self {
        match hit.kind {
            HitKind::Midi => ClientMessage::Midi {
                t: hit.t,
                note: hit.note,
                velocity: hit.velocity,
            },
            HitKind::Audio => ClientMessage::Audio {
                t: hit.t,
                seq: hit.seq,
                pcm: hit.pcm,
            },
        }
    }
}

/// Outbound records pushed to the transport layer as they are produced.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionStart {
        session_id: SessionId,
        drill: DrillSummary,
        #[serde(with = "time::serde::rfc3339")]
        server_start_time: OffsetDateTime,
    },
    HitFeedback(HitFeedback),
    MetronomeState(MetronomeStatus),
    MetronomeTick(MetronomeTick),
    CalibrationUpdate {
        client_offset_ms: f64,
    },
    TakeFinished(Take),
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{RollingFigures, TakeMetrics};

    #[test]
    fn parses_tagged_client_messages() {
        let midi = ClientMessage::parse(r#"{"type":"midi","t":1000.5,"note":38,"velocity":96}"#)
            .unwrap();
        let hit = midi.into_hit().unwrap();
        assert_eq!(hit.kind, HitKind::Midi);
        assert_eq!(hit.velocity, Some(96));
        assert_eq!(hit.note, Some(38));

        let audio = ClientMessage::parse(r#"{"type":"audio","t":3.0,"seq":7}"#).unwrap();
        assert_eq!(audio.into_hit().unwrap().kind, HitKind::Audio);

        let calibration =
            ClientMessage::parse(r#"{"type":"calibration","client_offset_ms":-12.5}"#).unwrap();
        assert_eq!(
            calibration,
            ClientMessage::Calibration {
                client_offset_ms: -12.5
            }
        );
        assert!(calibration.into_hit().is_none());
    }

    #[test]
    fn rejects_unknown_or_malformed_messages() {
        assert!(ClientMessage::parse(r#"{"type":"sysex","t":0}"#).is_err());
        assert!(ClientMessage::parse(r#"{"type":"midi"}"#).is_err());
        assert!(ClientMessage::parse("not json").is_err());
    }

    #[test]
    fn hit_feedback_is_tagged() {
        let message = ServerMessage::HitFeedback(HitFeedback {
            slot_idx: 3,
            delta_ms: -4.0,
            velocity: 40,
            velocity_target: 40,
            timing_score: 1.0,
            dyn_score: 1.0,
            rolling: RollingFigures {
                timing: 0.55,
                dynamics: 0.55,
                diamond: 0.1,
            },
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "hit_feedback");
        assert_eq!(json["slot_idx"], 3);
        assert_eq!(json["rolling"]["timing"], 0.55);
    }

    #[test]
    fn timestamps_are_rfc3339_strings() {
        let start = ServerMessage::SessionStart {
            session_id: SessionId::new(),
            drill: crate::drill::test_drill().summary(),
            server_start_time: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&start).unwrap();
        assert_eq!(json["server_start_time"], "1970-01-01T00:00:00Z");
        assert_eq!(serde_json::from_value::<ServerMessage>(json).unwrap(), start);

        let finished = ServerMessage::TakeFinished(Take {
            session_id: SessionId::new(),
            metrics: TakeMetrics::empty(64),
            finished_at: OffsetDateTime::from_unix_timestamp(1_709_296_205).unwrap()
                + time::Duration::milliseconds(250),
        });
        let json = serde_json::to_value(&finished).unwrap();
        let finished_at = json["finished_at"].as_str().unwrap();
        assert!(finished_at.starts_with("2024-03-01T12:30:05."), "{finished_at}");
        assert_eq!(serde_json::from_value::<ServerMessage>(json).unwrap(), finished);
    }
}

use serde::{Deserialize, Serialize};

use crate::{drill::MAX_VELOCITY, DomainError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Midi,
    Audio,
}

/// A decoded strike reported by the client.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HitEvent {
    /// Client monotonic time in milliseconds.
    pub t: f64,
    pub kind: HitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Base64 PCM frame, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcm: Option<String>,
}

impl HitEvent {
    pub fn midi(t: f64, velocity: u8) -> Self {
        Self {
            t,
            kind: HitKind::Midi,
            note: None,
            velocity: Some(velocity),
            seq: None,
            pcm: None,
        }
    }

    pub fn audio(t: f64, seq: u64) -> Self {
        Self {
            t,
            kind: HitKind::Audio,
            note: None,
            velocity: None,
            seq: Some(seq),
            pcm: None,
        }
    }

    pub fn with_note(mut self, note: u8) -> Self {
        self.note = Some(note);
        self
    }

    /// Returns the velocity of a well-formed MIDI hit.
    pub fn midi_velocity(&self) -> Result<u8, DomainError> {
        if self.kind != HitKind::Midi {
            return Err(DomainError::validation(format!(
                "expected a midi hit, got {:?}",
                self.kind
            )));
        }
        if !self.t.is_finite() {
            return Err(DomainError::validation("hit timestamp must be finite"));
        }
        let velocity = self
            .velocity
            .ok_or_else(|| DomainError::validation("midi hit is missing a velocity"))?;
        if velocity > MAX_VELOCITY {
            return Err(DomainError::validation(format!(
                "midi velocity {velocity} exceeds {MAX_VELOCITY}"
            )));
        }
        Ok(velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midi_velocity_checks_shape() {
        assert_eq!(HitEvent::midi(10.0, 90).midi_velocity().unwrap(), 90);

        let mut missing = HitEvent::midi(10.0, 90);
        missing.velocity = None;
        assert!(matches!(
            missing.midi_velocity(),
            Err(DomainError::Validation(_))
        ));

        assert!(HitEvent::audio(10.0, 1).midi_velocity().is_err());
        assert!(HitEvent::midi(f64::NAN, 90).midi_velocity().is_err());
        assert!(HitEvent::midi(0.0, 200).midi_velocity().is_err());
    }

    #[test]
    fn hit_kind_serializes_lowercase() {
        let json = serde_json::to_string(&HitEvent::midi(1.5, 64).with_note(38)).unwrap();
        assert!(json.contains("\"kind\":\"midi\""));
        assert!(json.contains("\"note\":38"));
        assert!(!json.contains("pcm"));
    }
}

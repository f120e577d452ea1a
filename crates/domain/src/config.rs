use serde::{Deserialize, Serialize};

use crate::DomainError;

pub const DEFAULT_LEAD_IN_MS: f64 = 1000.0;

/// Engine-wide settings shared by every session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between the grid anchor and its first slot.
    pub lead_in_ms: f64,
    /// Keep only the most recent grid-length worth of hits per session.
    pub bounded_history: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lead_in_ms: DEFAULT_LEAD_IN_MS,
            bounded_history: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.lead_in_ms.is_finite() || self.lead_in_ms < 0.0 {
            return Err(DomainError::config(
                "lead_in_ms must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.lead_in_ms, 1000.0);
        assert!(!config.bounded_history);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_lead_in_rejected() {
        let config = EngineConfig {
            lead_in_ms: -5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

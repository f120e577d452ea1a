use std::collections::BTreeMap;

use crate::{
    drill::{Drill, TimingThresholds, VelocityTargets},
    DomainError,
};

/// Drills available to new sessions, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct DrillCatalog {
    drills: BTreeMap<String, Drill>,
}

impl DrillCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the stock rudiment drills.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for drill in default_drills() {
            catalog.drills.insert(drill.id.clone(), drill);
        }
        catalog
    }

    pub fn insert(&mut self, drill: Drill) -> Result<(), DomainError> {
        drill.validate()?;
        self.drills.insert(drill.id.clone(), drill);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Drill> {
        self.drills.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &Drill> {
        self.drills.values()
    }

    pub fn len(&self) -> usize {
        self.drills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drills.is_empty()
    }
}

fn stickings(pattern: &str) -> Vec<String> {
    pattern.chars().map(String::from).collect()
}

fn default_drills() -> Vec<Drill> {
    vec![
        Drill {
            id: "paradiddle_120".into(),
            name: "Single Paradiddle".into(),
            tempo_bpm: 120.0,
            subdivision: 4,
            beats_per_bar: 4,
            bars: 4,
            stickings: stickings("RLRRLRLL"),
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
        },
        Drill {
            id: "singles_140".into(),
            name: "Single Stroke Roll".into(),
            tempo_bpm: 140.0,
            subdivision: 4,
            beats_per_bar: 4,
            bars: 4,
            stickings: stickings("RLRLRLRL"),
            accents: vec![1, 0, 1, 0, 1, 0, 1, 0],
            velocity_targets: VelocityTargets {
                accent: 95,
                tap: 35,
                tolerance: 20,
            },
            timing: TimingThresholds {
                good_ms: 15.0,
                ok_ms: 25.0,
                bad_ms: 50.0,
            },
            created_by: None,
        },
        Drill {
            id: "doubles_100".into(),
            name: "Double Stroke Roll".into(),
            tempo_bpm: 100.0,
            subdivision: 4,
            beats_per_bar: 4,
            bars: 4,
            stickings: stickings("RRLLRRLL"),
            accents: vec![1, 0, 1, 0, 1, 0, 1, 0],
            velocity_targets: VelocityTargets {
                accent: 90,
                tap: 30,
                tolerance: 25,
            },
            timing: TimingThresholds {
                good_ms: 20.0,
                ok_ms: 30.0,
                bad_ms: 60.0,
            },
            created_by: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let catalog = DrillCatalog::with_defaults();
        assert_eq!(catalog.len(), 3);
        for drill in catalog.list() {
            assert!(drill.validate().is_ok(), "{} should validate", drill.id);
        }
        let paradiddle = catalog.get("paradiddle_120").unwrap();
        assert_eq!(paradiddle.stickings.len(), 8);
        assert_eq!(paradiddle.stickings[2], "R");
    }

    #[test]
    fn insert_rejects_invalid_drill() {
        let mut catalog = DrillCatalog::new();
        let mut drill = crate::drill::test_drill();
        drill.accents.clear();
        assert!(catalog.insert(drill).is_err());
        assert!(catalog.is_empty());
    }
}

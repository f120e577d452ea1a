use stickler_domain::{Drill, TimingThresholds, VelocityTargets, MAX_VELOCITY};

/// Score awarded at the edge between the good and ok windows.
const OK_BAND_FLOOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsScore {
    pub score: f64,
    /// Velocity the slot asked for.
    pub target_velocity: u8,
}

/// Map a signed timing offset to `[0, 1]`.
///
/// Full marks inside `good`, a linear ramp from 1.0 down to 0.7 across the ok
/// window and from 0.7 down to 0.0 across the bad window, nothing past `bad`.
/// A zero-width window behaves as a step at its shared threshold.
pub fn timing_score(delta_ms: f64, thresholds: &TimingThresholds) -> f64 {
    let TimingThresholds {
        good_ms,
        ok_ms,
        bad_ms,
    } = *thresholds;
    let miss = delta_ms.abs();

    if miss <= good_ms {
        1.0
    } else if miss <= ok_ms {
        let width = ok_ms - good_ms;
        if width <= 0.0 {
            return OK_BAND_FLOOR;
        }
        OK_BAND_FLOOR + (1.0 - OK_BAND_FLOOR) * (ok_ms - miss) / width
    } else if miss <= bad_ms {
        let width = bad_ms - ok_ms;
        if width <= 0.0 {
            return 0.0;
        }
        OK_BAND_FLOOR * (bad_ms - miss) / width
    } else {
        0.0
    }
}

/// Velocity a slot calls for under the drill's accent cycle.
pub fn target_velocity(drill: &Drill, slot_index: usize) -> u8 {
    if drill.is_accent(slot_index) {
        drill.velocity_targets.accent
    } else {
        drill.velocity_targets.tap
    }
}

/// Compare a hit's velocity against an explicit target.
pub fn velocity_score(velocity: u8, target: u8, tolerance: u8) -> f64 {
    let diff = (velocity as f64 - target as f64).abs();
    let tolerance = tolerance as f64;
    if diff <= tolerance {
        return 1.0;
    }
    let span = MAX_VELOCITY as f64 - tolerance;
    if span <= 0.0 {
        return 0.0;
    }
    (1.0 - (diff - tolerance) / span).max(0.0)
}

/// Score a hit's velocity against the accent or tap target of its slot.
pub fn dynamics_score(velocity: u8, slot_index: usize, drill: &Drill) -> DynamicsScore {
    let target_velocity = target_velocity(drill, slot_index);
    let VelocityTargets { tolerance, .. } = drill.velocity_targets;
    DynamicsScore {
        score: velocity_score(velocity, target_velocity, tolerance),
        target_velocity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stickler_domain::DrillCatalog;

    fn thresholds() -> TimingThresholds {
        TimingThresholds::new(10.0, 20.0, 40.0).unwrap()
    }

    fn paradiddle() -> Drill {
        DrillCatalog::with_defaults()
            .get("paradiddle_120")
            .cloned()
            .unwrap()
    }

    #[test]
    fn on_slot_and_good_boundary_score_full() {
        assert_eq!(timing_score(0.0, &thresholds()), 1.0);
        assert_eq!(timing_score(10.0, &thresholds()), 1.0);
        assert_eq!(timing_score(-10.0, &thresholds()), 1.0);
    }

    #[test]
    fn ok_window_interpolates_from_point_seven() {
        assert_relative_eq!(timing_score(15.0, &thresholds()), 0.85, epsilon = 1e-12);
        assert_relative_eq!(timing_score(-15.0, &thresholds()), 0.85, epsilon = 1e-12);
        assert_relative_eq!(timing_score(20.0, &thresholds()), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn bad_window_falls_to_zero() {
        assert_relative_eq!(timing_score(30.0, &thresholds()), 0.35, epsilon = 1e-12);
        assert_eq!(timing_score(40.0, &thresholds()), 0.0);
        assert_eq!(timing_score(45.0, &thresholds()), 0.0);
        assert_eq!(timing_score(-1_000.0, &thresholds()), 0.0);
    }

    #[test]
    fn timing_score_is_monotonic_and_bounded() {
        let configs = [
            thresholds(),
            TimingThresholds::new(10.0, 10.0, 40.0).unwrap(),
            TimingThresholds::new(10.0, 20.0, 20.0).unwrap(),
            TimingThresholds::new(5.0, 5.0, 5.0).unwrap(),
            TimingThresholds::new(0.0, 0.0, 0.0).unwrap(),
        ];
        for config in configs {
            let mut previous = f64::INFINITY;
            let mut miss = 0.0;
            while miss <= 60.0 {
                let score = timing_score(miss, &config);
                assert!((0.0..=1.0).contains(&score), "{score} out of range");
                assert!(score <= previous, "score rose at {miss} for {config:?}");
                previous = score;
                miss += 0.25;
            }
        }
    }

    #[test]
    fn zero_width_windows_step_without_nan() {
        let tied_good_ok = TimingThresholds::new(10.0, 10.0, 40.0).unwrap();
        assert_eq!(timing_score(10.0, &tied_good_ok), 1.0);
        let just_past = timing_score(10.5, &tied_good_ok);
        assert!(just_past < 0.7 && just_past > 0.6);

        let tied_ok_bad = TimingThresholds::new(10.0, 20.0, 20.0).unwrap();
        assert_relative_eq!(timing_score(20.0, &tied_ok_bad), 0.7, epsilon = 1e-12);
        assert_eq!(timing_score(20.01, &tied_ok_bad), 0.0);

        let all_zero = TimingThresholds::new(0.0, 0.0, 0.0).unwrap();
        assert_eq!(timing_score(0.0, &all_zero), 1.0);
        assert_eq!(timing_score(0.1, &all_zero), 0.0);
    }

    #[test]
    fn accent_within_tolerance_scores_full() {
        let drill = paradiddle();
        let result = dynamics_score(85, 0, &drill);
        assert_eq!(result.target_velocity, 100);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn tap_slots_use_tap_target() {
        let drill = paradiddle();
        let result = dynamics_score(40, 1, &drill);
        assert_eq!(result.target_velocity, 40);
        assert_eq!(result.score, 1.0);
        // slot 12 wraps onto accent position 4
        assert_eq!(dynamics_score(100, 12, &drill).target_velocity, 100);
    }

    #[test]
    fn falloff_is_linear_beyond_tolerance() {
        // diff 71 with tolerance 15: 1 - 56 / 112
        assert_relative_eq!(velocity_score(29, 100, 15), 0.5, epsilon = 1e-12);
        assert_eq!(velocity_score(127, 0, 0), 0.0);
        assert_eq!(velocity_score(0, 127, 126), 0.0);
        assert_eq!(velocity_score(0, 127, 127), 1.0);
    }

    #[test]
    fn dynamics_score_is_monotonic_and_bounded() {
        for tolerance in [0u8, 15, 64, 127] {
            let mut previous = f64::INFINITY;
            for velocity in (0..=100u8).rev() {
                let score = velocity_score(velocity, 100, tolerance);
                assert!((0.0..=1.0).contains(&score));
                if 100 - velocity <= tolerance {
                    assert_eq!(score, 1.0);
                }
                assert!(score <= previous);
                previous = score;
            }
        }
    }
}

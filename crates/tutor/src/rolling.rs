use serde::{Deserialize, Serialize};
use stickler_domain::RollingFigures;

/// EWMA smoothing factor applied per hit.
pub const ALPHA: f64 = 0.1;

/// Lower bound applied to every diamond axis before taking its logarithm.
pub const AXIS_FLOOR: f64 = 1e-6;

/// Diamond axis weights, in axis order.
pub const DIAMOND_WEIGHTS: [f64; 4] = [0.35, 0.25, 0.25, 0.15];

/// Exponentially weighted running view of recent timing and dynamics quality.
///
/// The dispersion fields track an EWMA of miss magnitude (`1 - score`), not a
/// statistical variance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingAggregator {
    pub timing_mean: f64,
    pub timing_dispersion: f64,
    pub dynamics_mean: f64,
    pub dynamics_dispersion: f64,
}

impl RollingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, timing_score: f64, dyn_score: f64) {
        self.timing_mean = ewma(self.timing_mean, timing_score);
        self.timing_dispersion = ewma(self.timing_dispersion, 1.0 - timing_score);
        self.dynamics_mean = ewma(self.dynamics_mean, dyn_score);
        self.dynamics_dispersion = ewma(self.dynamics_dispersion, 1.0 - dyn_score);
    }

    pub fn axes(&self) -> [f64; 4] {
        [
            self.timing_mean,
            1.0 - self.timing_dispersion,
            self.dynamics_mean,
            1.0 - self.dynamics_dispersion,
        ]
    }

    /// Weighted geometric mean of the four axes.
    pub fn diamond(&self) -> f64 {
        let axes = self.axes();
        let total_weight: f64 = DIAMOND_WEIGHTS.iter().sum();
        let weighted_log: f64 = axes
            .iter()
            .zip(DIAMOND_WEIGHTS.iter())
            .map(|(axis, weight)| weight * axis.max(AXIS_FLOOR).ln())
            .sum();
        (weighted_log / total_weight).exp()
    }

    pub fn timing_figure(&self) -> f64 {
        (self.timing_mean + (1.0 - self.timing_dispersion)) / 2.0
    }

    pub fn dynamics_figure(&self) -> f64 {
        (self.dynamics_mean + (1.0 - self.dynamics_dispersion)) / 2.0
    }

    pub fn figures(&self) -> RollingFigures {
        RollingFigures {
            timing: self.timing_figure(),
            dynamics: self.dynamics_figure(),
            diamond: self.diamond(),
        }
    }
}

fn ewma(current: f64, sample: f64) -> f64 {
    (1.0 - ALPHA) * current + ALPHA * sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one() {
        assert_relative_eq!(DIAMOND_WEIGHTS.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn bootstrap_diamond_is_pinned() {
        let rolling = RollingAggregator::new();
        assert_eq!(rolling.axes(), [0.0, 1.0, 0.0, 1.0]);
        // floored axes {1e-6, 1, 1e-6, 1} leave (1e-6)^(0.35 + 0.25)
        assert_relative_eq!(rolling.diamond(), 10f64.powf(-3.6), max_relative = 1e-9);
        assert_relative_eq!(rolling.diamond(), 2.511_886_431_509_58e-4, max_relative = 1e-9);
    }

    #[test]
    fn single_update_moves_by_alpha() {
        let mut rolling = RollingAggregator::new();
        rolling.update(1.0, 0.5);
        assert_relative_eq!(rolling.timing_mean, 0.1, epsilon = 1e-12);
        assert_relative_eq!(rolling.timing_dispersion, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rolling.dynamics_mean, 0.05, epsilon = 1e-12);
        assert_relative_eq!(rolling.dynamics_dispersion, 0.05, epsilon = 1e-12);

        let figures = rolling.figures();
        assert_relative_eq!(figures.timing, 0.55, epsilon = 1e-12);
        assert_relative_eq!(figures.dynamics, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn axis_order_pairs_with_weights() {
        let rolling = RollingAggregator {
            timing_mean: 0.5,
            timing_dispersion: 0.0,
            dynamics_mean: 1.0,
            dynamics_dispersion: 0.0,
        };
        assert_relative_eq!(rolling.diamond(), 0.5f64.powf(0.35), epsilon = 1e-12);

        let rolling = RollingAggregator {
            timing_mean: 1.0,
            timing_dispersion: 0.0,
            dynamics_mean: 1.0,
            dynamics_dispersion: 0.5,
        };
        assert_relative_eq!(rolling.diamond(), 0.5f64.powf(0.15), epsilon = 1e-12);
    }

    #[test]
    fn geometric_mean_punishes_a_weak_axis() {
        let rolling = RollingAggregator {
            timing_mean: 0.01,
            timing_dispersion: 0.0,
            dynamics_mean: 1.0,
            dynamics_dispersion: 0.0,
        };
        let arithmetic: f64 = rolling
            .axes()
            .iter()
            .zip(DIAMOND_WEIGHTS.iter())
            .map(|(a, w)| a * w)
            .sum();
        assert!(rolling.diamond() < arithmetic);
        assert_relative_eq!(rolling.diamond(), 0.01f64.powf(0.35), epsilon = 1e-12);
    }

    #[test]
    fn perfect_hits_converge_to_one() {
        let mut rolling = RollingAggregator::new();
        let mut previous = rolling.diamond();
        for _ in 0..300 {
            rolling.update(1.0, 1.0);
            let diamond = rolling.diamond();
            assert!(diamond >= previous);
            previous = diamond;
        }
        assert!(previous > 0.999_999);
        assert!(previous <= 1.0);
    }

    #[test]
    fn diamond_stays_in_unit_interval() {
        let mut rolling = RollingAggregator::new();
        let samples = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.35, 0.8), (0.7, 0.2)];
        for round in 0..50 {
            let (timing, dynamics) = samples[round % samples.len()];
            rolling.update(timing, dynamics);
            let diamond = rolling.diamond();
            assert!(diamond > 0.0 && diamond <= 1.0, "{diamond}");
        }
    }
}

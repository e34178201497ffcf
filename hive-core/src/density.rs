//! Density estimation
//!
//! Turns a bag of pheromones into one scalar in [0, 1] measuring how
//! synchronized the swarm currently looks:
//!
//! ```text
//! active  = signals with strength > 0.1
//! avg     = mean(strength over active), 0 if none
//! density = min(1, (|active| / N) * avg * scale)
//! ```
//!
//! Breadth and quality combine multiplicatively, so many weak signals and a
//! few strong ones can reach the same density.

use serde::{Deserialize, Serialize};

use crate::{Pheromone, ACTIVE_STRENGTH, DENSITY_NORMALIZER, DENSITY_SCALE};

/// Parameters of the density formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityParams {
    /// Signals above this strength are active
    pub active_floor: f64,
    /// Breadth normaliser `N`
    pub normalizer: f64,
    /// Multiplier `scale`
    pub scale: f64,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            active_floor: ACTIVE_STRENGTH,
            normalizer: DENSITY_NORMALIZER,
            scale: DENSITY_SCALE,
        }
    }
}

/// Compute density over any collection of pheromones
pub fn estimate<'a, I>(signals: I, params: &DensityParams) -> f64
where
    I: IntoIterator<Item = &'a Pheromone>,
{
    let (count, total) = signals
        .into_iter()
        .filter(|p| p.strength > params.active_floor)
        .fold((0usize, 0.0f64), |(n, sum), p| (n + 1, sum + p.strength));

    if count == 0 || params.normalizer <= 0.0 {
        return 0.0;
    }

    let avg = total / count as f64;
    ((count as f64 / params.normalizer) * avg * params.scale).clamp(0.0, 1.0)
}

/// Count signals strong enough to be considered synchronized
pub fn synced_count<'a, I>(signals: I, floor: f64) -> usize
where
    I: IntoIterator<Item = &'a Pheromone>,
{
    signals.into_iter().filter(|p| p.strength > floor).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_strengths(strengths: &[f64]) -> Vec<Pheromone> {
        strengths
            .iter()
            .map(|s| Pheromone::builder("d", "c").origin("a").strength(*s).build())
            .collect()
    }

    #[test]
    fn test_empty_store_has_zero_density() {
        let none: Vec<Pheromone> = Vec::new();
        assert_eq!(estimate(&none, &DensityParams::default()), 0.0);
    }

    #[test]
    fn test_reference_scenario() {
        // 6 active signals averaging 0.5 => (6/24) * 0.5 * 1.5
        let signals = with_strengths(&[0.3, 0.7, 0.5, 0.5, 0.4, 0.6]);
        let density = estimate(&signals, &DensityParams::default());
        assert!((density - 0.1875).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_signals_are_ignored() {
        // 0.1 is not strictly above the active floor
        let signals = with_strengths(&[0.1, 0.05, 0.8]);
        let density = estimate(&signals, &DensityParams::default());
        assert!((density - (1.0 / 24.0) * 0.8 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_density_saturates_at_one() {
        let signals = with_strengths(&[1.0; 40]);
        assert_eq!(estimate(&signals, &DensityParams::default()), 1.0);
    }

    #[test]
    fn test_density_bounds_over_many_shapes() {
        let params = DensityParams::default();
        for n in 0..60 {
            for step in 0..=10 {
                let s = step as f64 / 10.0;
                let signals = with_strengths(&vec![s; n]);
                let d = estimate(&signals, &params);
                assert!((0.0..=1.0).contains(&d), "n={n} s={s} d={d}");
            }
        }
    }

    #[test]
    fn test_breadth_and_quality_trade_off() {
        let params = DensityParams::default();
        let many_weak = with_strengths(&[0.25; 16]);
        let few_strong = with_strengths(&[1.0; 4]);
        assert!((estimate(&many_weak, &params) - estimate(&few_strong, &params)).abs() < 1e-9);
    }

    #[test]
    fn test_synced_count_is_strict() {
        let signals = with_strengths(&[0.4, 0.41, 0.9, 0.2]);
        assert_eq!(synced_count(&signals, 0.4), 2);
    }
}

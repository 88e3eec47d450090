use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Smallest and largest multiplier increase per pump tick.
pub const PUMP_STEP_MIN: f64 = 0.01;
pub const PUMP_STEP_MAX: f64 = 0.03;

/// Upper bound on generated samples regardless of cap.
pub const MAX_CURVE_SAMPLES: usize = 10_000;

/// Cosmetic climb of a pump balloon from 1.00x up to the authority's pop
/// point.
///
/// Every sample is rounded to two decimals and the sequence never
/// decreases. The last sample is always `cap`, which is where the balloon
/// pops. The same seed always yields the same curve.
pub fn pump_curve(cap: f64, seed: u64) -> Vec<f64> {
    if !cap.is_finite() || cap <= 1.0 {
        return vec![1.0];
    }

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut samples = Vec::new();
    let mut multiplier = 1.0;
    while samples.len() + 1 < MAX_CURVE_SAMPLES {
        multiplier += rng.random_range(PUMP_STEP_MIN..PUMP_STEP_MAX);
        let sample = round2(multiplier);
        if sample >= cap {
            break;
        }
        samples.push(sample);
    }
    samples.push(cap);
    samples
}

/// Seeded source of throwaway numbers shown while a result is pending.
#[derive(Debug)]
pub struct Scrambler {
    rng: ChaCha20Rng,
}

impl Scrambler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// A value in `[0, 100)` with two decimals.
    pub fn next_value(&mut self) -> f64 {
        round2(self.rng.random_range(0.0..100.0)).min(99.99)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_curve_climbs_to_the_cap() {
        let curve = pump_curve(2.5, 7);
        assert_eq!(curve.last(), Some(&2.5));
        assert!(curve[..curve.len() - 1].iter().all(|sample| *sample < 2.5));
        assert!(curve.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(curve[0] >= 1.01 && curve[0] <= 1.03);
        // 1.5 of headroom at no more than 0.03 a tick
        assert!(curve.len() >= 50);
    }

    #[test]
    fn pump_curve_is_reproducible() {
        assert_eq!(pump_curve(4.2, 99), pump_curve(4.2, 99));
        assert_ne!(pump_curve(4.2, 1), pump_curve(4.2, 2));
    }

    #[test]
    fn degenerate_caps_pop_immediately() {
        assert_eq!(pump_curve(1.0, 3), vec![1.0]);
        assert_eq!(pump_curve(f64::NAN, 3), vec![1.0]);
    }

    #[test]
    fn scrambler_stays_in_range() {
        let mut scrambler = Scrambler::new(11);
        for _ in 0..500 {
            let value = scrambler.next_value();
            assert!((0.0..100.0).contains(&value));
        }
    }
}

//! Seeded packet-loss injection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Drops each packet independently with a fixed probability.
///
/// The generator is seeded so a scenario replays the same drop pattern on
/// every run.
#[derive(Debug, Clone)]
pub struct ErrorModel {
    loss: f64,
    rng: StdRng,
}

impl ErrorModel {
    /// `loss` is clamped to `[0, 1]`; NaN is treated as no loss.
    pub fn new(loss: f64, seed: u64) -> Self {
        let loss = if loss.is_nan() { 0.0 } else { loss.clamp(0.0, 1.0) };
        Self {
            loss,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn should_drop(&mut self) -> bool {
        self.loss > 0.0 && self.rng.gen_bool(self.loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremes() {
        let mut never = ErrorModel::new(0.0, 1);
        let mut always = ErrorModel::new(1.0, 1);
        for _ in 0..100 {
            assert!(!never.should_drop());
            assert!(always.should_drop());
        }
    }

    #[test]
    fn test_same_seed_same_pattern() {
        let mut a = ErrorModel::new(0.3, 42);
        let mut b = ErrorModel::new(0.3, 42);
        let pattern_a: Vec<bool> = (0..64).map(|_| a.should_drop()).collect();
        let pattern_b: Vec<bool> = (0..64).map(|_| b.should_drop()).collect();
        assert_eq!(pattern_a, pattern_b);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(ErrorModel::new(1.5, 0).loss(), 1.0);
        assert_eq!(ErrorModel::new(-0.5, 0).loss(), 0.0);
        assert_eq!(ErrorModel::new(f64::NAN, 0).loss(), 0.0);
    }
}

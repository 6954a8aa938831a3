// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles examples and splits them into a training set and an
// optional validation set. The validation set drives
// best-loss checkpointing in the training loop.
//
// The shuffle takes an explicit seed so a split can be
// reproduced exactly; nothing here touches a global RNG.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped into [0, 1]; 1.0 puts everything
/// into the training set.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len()
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val) = split_train_val(items, 0.8, 0);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(), 20);
    }

    #[test]
    fn test_same_seed_same_split() {
        let (a, _) = split_train_val((0..50).collect::<Vec<_>>(), 0.7, 9);
        let (b, _) = split_train_val((0..50).collect::<Vec<_>>(), 0.7, 9);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val) = split_train_val(items, 0.8, 1);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_full_training_split() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val) = split_train_val(items, 1.0, 2);
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }
}

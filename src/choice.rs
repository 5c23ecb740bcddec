//! Weighted random selection shared by every sampling decision of the simulator.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{GeneratorError, Result};

/// An immutable weighted set that can be sampled any number of times.
///
/// The cumulative weight table is built once in [`WeightedChoice::new`];
/// [`WeightedChoice::pick`] only reads it, so a single instance can be shared
/// between workers behind an `Arc` while every worker feeds its own RNG.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    items: Vec<T>,
    weights: Vec<u64>,
    index: WeightedIndex<u64>,
}

impl<T> WeightedChoice<T> {
    /// Build a choice set from `(item, weight)` pairs.
    ///
    /// `label` names the set in the error message. Zero-weight items are kept
    /// but can never be picked.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::EmptyChoiceSet`] if there are no pairs or all
    /// weights are zero.
    pub fn new<I>(label: &str, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, u64)>,
    {
        let (items, weights): (Vec<T>, Vec<u64>) = pairs.into_iter().unzip();
        let index = WeightedIndex::new(&weights)
            .map_err(|e| GeneratorError::EmptyChoiceSet(format!("{}: {}", label, e)))?;
        Ok(Self {
            items,
            weights,
            index,
        })
    }

    /// Pick one item with probability proportional to its weight.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.items[self.index.sample(rng)]
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn weight(&self, i: usize) -> Option<u64> {
        self.weights.get(i).copied()
    }

    pub fn total_weight(&self) -> u64 {
        self.weights.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn empty_set_is_rejected() {
        let err = WeightedChoice::<&str>::new("terms", Vec::new()).unwrap_err();
        assert!(matches!(err, GeneratorError::EmptyChoiceSet(_)));
        assert!(err.to_string().contains("terms"));
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let err = WeightedChoice::new("tags", vec![("a", 0), ("b", 0)]).unwrap_err();
        assert!(matches!(err, GeneratorError::EmptyChoiceSet(_)));
    }

    #[test]
    fn single_item_always_picked() {
        let choice = WeightedChoice::new("one", vec![("only", 3)]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(*choice.pick(&mut rng), "only");
        }
    }

    #[test]
    fn zero_weight_item_never_picked() {
        let choice = WeightedChoice::new("mixed", vec![("never", 0), ("always", 5)]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            assert_eq!(*choice.pick(&mut rng), "always");
        }
    }

    #[test]
    fn accessors_reflect_input() {
        let choice = WeightedChoice::new("acc", vec![("a", 2), ("b", 3)]).unwrap();
        assert_eq!(choice.len(), 2);
        assert!(!choice.is_empty());
        assert_eq!(choice.items(), &["a", "b"]);
        assert_eq!(choice.weight(1), Some(3));
        assert_eq!(choice.weight(2), None);
        assert_eq!(choice.total_weight(), 5);
    }

    #[test]
    fn sampling_matches_weights_chi_squared() {
        // df = 3, critical value at p = 0.001 is 16.27
        let weights = [("a", 1u64), ("b", 2), ("c", 3), ("d", 4)];
        let choice = WeightedChoice::new("chi2", weights).unwrap();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        let draws = 20_000;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(*choice.pick(&mut rng)).or_default() += 1;
        }

        let total = choice.total_weight() as f64;
        let chi2: f64 = weights
            .iter()
            .map(|(item, w)| {
                let expected = draws as f64 * (*w as f64) / total;
                let observed = *counts.get(item).unwrap_or(&0) as f64;
                (observed - expected).powi(2) / expected
            })
            .sum();
        assert!(chi2 < 16.27, "chi-squared too large: {} ({:?})", chi2, counts);
    }

    #[test]
    fn shared_between_threads() {
        let choice =
            std::sync::Arc::new(WeightedChoice::new("shared", vec![(1u8, 1), (2, 1)]).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|seed| {
                let choice = choice.clone();
                std::thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    (0..100).map(|_| u32::from(*choice.pick(&mut rng))).sum::<u32>()
                })
            })
            .collect();
        for h in handles {
            let sum = h.join().unwrap();
            assert!((100..=200).contains(&sum));
        }
    }
}

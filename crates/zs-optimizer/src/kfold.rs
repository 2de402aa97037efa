//! Seeded K-fold partitioning of sample indices.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// K-Fold splitter.
///
/// Each of the `n_splits` folds is used once as the test part while the
/// others form the train part. The first `n_samples % n_splits` folds receive
/// one extra sample. With a random state the assignment is reproducible
/// across runs and platforms.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Enable shuffling before splitting into folds.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the seed for reproducible shuffling (implies shuffling).
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self.shuffle = true;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate `(train, test)` index lists, each sorted ascending.
    pub fn split(&self, n_samples: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        if self.n_splits == 0 {
            return Vec::new();
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            match self.random_state {
                Some(seed) => indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed)),
                None => indices.shuffle(&mut rand::rng()),
            }
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut result = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let current = if i < remainder { fold_size + 1 } else { fold_size };
            let end = start + current;

            let mut test: Vec<usize> = indices[start..end].to_vec();
            let mut train = Vec::with_capacity(n_samples - current);
            train.extend_from_slice(&indices[..start]);
            train.extend_from_slice(&indices[end..]);
            test.sort_unstable();
            train.sort_unstable();

            result.push((train, test));
            start = end;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unshuffled_folds_are_consecutive() {
        let splits = KFold::new(3).split(7);
        let tests: Vec<Vec<usize>> = splits.iter().map(|(_, t)| t.clone()).collect();
        assert_eq!(tests, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
        assert_eq!(splits[1].0, vec![0, 1, 2, 5, 6]);
    }

    #[test]
    fn test_parts_partition_the_samples() {
        let splits = KFold::new(4).with_random_state(0).split(10);
        assert_eq!(splits.len(), 4);

        let mut all = Vec::new();
        for (train, test) in &splits {
            let train_set: HashSet<_> = train.iter().collect();
            assert!(test.iter().all(|i| !train_set.contains(i)));
            assert_eq!(train.len() + test.len(), 10);
            all.extend(test.iter().copied());
        }
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_assignment() {
        let a = KFold::new(5).with_random_state(42).split(23);
        let b = KFold::new(5).with_random_state(42).split(23);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_splits_yield_nothing() {
        assert!(KFold::new(0).split(5).is_empty());
    }
}

//! Run configuration for selection and cross-validation.

use serde::{Deserialize, Serialize};

use zs_types::{config_error, ZsResult};

use crate::backend::{ExecutionMode, WorkerPoolConfig};

/// Configuration for a single greedy selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Requested portfolio size.
    pub num_target: usize,

    /// Run the backward pruning stage after forward selection.
    pub enable_pruning: bool,

    /// How much a removal may worsen the score and still be accepted.
    pub pruning_slack: f64,

    pub mode: ExecutionMode,

    /// Worker pool settings (ignored in sequential mode).
    pub workers: WorkerPoolConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            num_target: 10,
            enable_pruning: true,
            pruning_slack: 0.0,
            mode: ExecutionMode::Sequential,
            workers: WorkerPoolConfig::default(),
        }
    }
}

impl SelectionConfig {
    pub fn new(num_target: usize) -> Self {
        Self {
            num_target,
            ..Self::default()
        }
    }

    pub fn with_pruning(mut self, slack: f64) -> Self {
        self.enable_pruning = true;
        self.pruning_slack = slack;
        self
    }

    pub fn without_pruning(mut self) -> Self {
        self.enable_pruning = false;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_workers(mut self, workers: WorkerPoolConfig) -> Self {
        self.workers = workers;
        self
    }
}

/// Configuration for the cross-validated selection driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    /// Number of train/test splits over parent datasets (at least 2).
    pub n_splits: usize,

    /// Seed of the shuffled K-fold assignment.
    pub seed: u64,

    /// Portfolio size selected on each train split.
    pub num_target: usize,

    pub enable_pruning: bool,
    pub pruning_slack: f64,

    /// Score each partial portfolio on the test split while selecting.
    /// Only affects logs and iteration records, never the selection.
    pub log_test_scores: bool,

    pub mode: ExecutionMode,
    pub workers: WorkerPoolConfig,
}

impl CrossValidationConfig {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            seed: 0,
            num_target: 10,
            enable_pruning: false,
            pruning_slack: 0.0,
            log_test_scores: false,
            mode: ExecutionMode::Sequential,
            workers: WorkerPoolConfig::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_target(mut self, num_target: usize) -> Self {
        self.num_target = num_target;
        self
    }

    pub fn with_pruning(mut self, slack: f64) -> Self {
        self.enable_pruning = true;
        self.pruning_slack = slack;
        self
    }

    pub fn with_test_logging(mut self) -> Self {
        self.log_test_scores = true;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_workers(mut self, workers: WorkerPoolConfig) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> ZsResult<()> {
        if self.n_splits < 2 {
            return Err(config_error!(
                "cross-validation needs n_splits >= 2, got {}",
                self.n_splits
            ));
        }
        Ok(())
    }
}

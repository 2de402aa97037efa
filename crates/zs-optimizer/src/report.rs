//! Records produced by selection and cross-validation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use zs_types::{ConfigId, DatasetId, TaskId, ZsResult};

/// Unique cross-validation run identifier.
pub type RunId = Uuid;

/// One forward-selection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration index.
    pub iteration: usize,
    /// Configuration appended in this step.
    pub config: ConfigId,
    /// Score of the portfolio after appending `config`.
    pub score: f64,
    pub elapsed_secs: f64,
    /// Backend that evaluated the step.
    pub backend: String,
    /// Held-out score of the partial portfolio, if a test scorer was given.
    pub test_score: Option<f64>,
}

/// One accepted pruning removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalRecord {
    /// 1-based pruning round.
    pub round: usize,
    pub config: ConfigId,
    /// Score of the portfolio after the removal.
    pub score: f64,
}

/// Outcome of a pruning pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pruning {
    pub portfolio: Vec<ConfigId>,
    pub removals: Vec<RemovalRecord>,
}

/// Outcome of a greedy selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected configurations in selection order.
    pub portfolio: Vec<ConfigId>,
    pub iterations: Vec<IterationRecord>,
    pub removals: Vec<RemovalRecord>,
}

impl Selection {
    /// Training score of the returned portfolio as last observed during the
    /// run. `None` when neither a step nor a removal happened.
    pub fn final_score(&self) -> Option<f64> {
        self.removals
            .last()
            .map(|r| r.score)
            .or_else(|| self.iterations.last().map(|it| it.score))
    }

    /// Whether the candidate pool ran out before the target size was met.
    pub fn exhausted(&self, num_target: usize) -> bool {
        self.portfolio.len() + self.removals.len() < num_target
    }
}

/// Result of one cross-validation split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    /// 1-based split index.
    pub fold: usize,
    pub train_tasks: Vec<TaskId>,
    pub test_tasks: Vec<TaskId>,
    /// `train_tasks` expanded into their dataset-folds.
    pub train_datasets: Vec<DatasetId>,
    /// `test_tasks` expanded into their dataset-folds.
    pub test_datasets: Vec<DatasetId>,
    pub selected_configs: Vec<ConfigId>,
    /// Held-out score of `selected_configs` on `test_datasets`.
    pub score: f64,
}

/// Full cross-validation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvReport {
    pub run_id: RunId,
    pub n_splits: usize,
    pub seed: u64,
    pub folds: Vec<FoldResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CvReport {
    /// Mean held-out score across folds.
    pub fn mean_score(&self) -> Option<f64> {
        if self.folds.is_empty() {
            return None;
        }
        Some(self.folds.iter().map(|f| f.score).sum::<f64>() / self.folds.len() as f64)
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn to_json(&self) -> ZsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

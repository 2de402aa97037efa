//! Typed rows of upstream experiment results.

use serde::{Deserialize, Serialize};

use crate::scorer::{ConfigId, DatasetId, TaskId};

/// Problem type of a task, as reported by the upstream benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Binary,
    Multiclass,
    Regression,
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Multiclass => write!(f, "multiclass"),
            Self::Regression => write!(f, "regression"),
        }
    }
}

/// One evaluated (configuration, dataset-fold) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Dataset-fold identifier, e.g. `"359987_8"`.
    pub dataset: DatasetId,
    /// Parent task the dataset-fold belongs to.
    pub tid: TaskId,
    /// Upstream replicate index of the dataset-fold.
    pub fold: u32,
    /// Configuration that produced this result.
    pub framework: ConfigId,
    pub problem_type: ProblemType,
    /// Test error, lower is better.
    pub metric_error: f64,
}

impl ResultRecord {
    pub fn new(
        tid: TaskId,
        fold: u32,
        framework: impl Into<ConfigId>,
        problem_type: ProblemType,
        metric_error: f64,
    ) -> Self {
        Self {
            dataset: format!("{tid}_{fold}"),
            tid,
            fold,
            framework: framework.into(),
            problem_type,
            metric_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_id_encodes_task_and_fold() {
        let record = ResultRecord::new(359987, 8, "CatBoost_c1", ProblemType::Binary, 0.12);
        assert_eq!(record.dataset, "359987_8");
        assert_eq!(record.tid, 359987);
        assert_eq!(record.fold, 8);
    }

    #[test]
    fn problem_type_uses_lowercase_names() {
        let json = serde_json::to_string(&ProblemType::Multiclass).unwrap();
        assert_eq!(json, "\"multiclass\"");
        assert_eq!(ProblemType::Regression.to_string(), "regression");
    }
}

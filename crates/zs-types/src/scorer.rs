//! The scoring oracle contract consumed by the selector.

use std::sync::Arc;

use crate::errors::ZsResult;

/// Identifier of one candidate configuration (model/hyperparameter preset).
pub type ConfigId = String;

/// Identifier of one dataset-fold record, e.g. `"359987_8"`.
pub type DatasetId = String;

/// Identifier of a parent dataset (task) that owns one or more dataset-folds.
pub type TaskId = u32;

/// Maps an ordered list of configurations to a scalar score, lower is better.
///
/// Scorers are treated as opaque and possibly expensive. They are shared
/// read-only across worker threads, so implementations must be `Send + Sync`
/// and must not rely on interior mutation for correctness.
pub trait ConfigScorer: Send + Sync {
    /// Score a portfolio. The order of `configs` must not affect the result.
    fn score(&self, configs: &[ConfigId]) -> ZsResult<f64>;

    /// Build a new scorer with the same semantics restricted to `datasets`.
    /// The receiver is left untouched.
    fn subset(&self, datasets: &[DatasetId]) -> ZsResult<Arc<dyn ConfigScorer>>;

    /// The dataset-folds this scorer is defined over.
    fn datasets(&self) -> &[DatasetId];
}

/// The slice of the simulation context the cross-validation driver needs.
pub trait SimulatorContext {
    /// All candidate configurations known to the context.
    fn configs(&self) -> Vec<ConfigId>;

    /// Parent task of a dataset-fold, or `None` if the context does not know it.
    fn dataset_parent(&self, dataset: &str) -> Option<TaskId>;
}

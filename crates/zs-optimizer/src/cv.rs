//! Cross-validated zero-shot selection.
//!
//! Parent datasets are split into `n_splits` disjoint groups. For each split a
//! portfolio is selected on the train-side datasets only and scored on the
//! held-out side, estimating how well the selection procedure generalises.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use zs_types::{
    config_error, ConfigId, ConfigScorer, DatasetId, SimulatorContext, TaskId, ZsError, ZsResult,
};

use crate::backend::ExecutionBackend;
use crate::config::CrossValidationConfig;
use crate::greedy::{GreedySelector, SelectionRequest};
use crate::kfold::KFold;
use crate::report::{CvReport, FoldResult};

/// Runs greedy selection on each train/test split of the parent datasets.
pub struct ZeroshotSelectorCv {
    config: CrossValidationConfig,
    scorer: Arc<dyn ConfigScorer>,
    configs: Vec<ConfigId>,
    backend: Arc<dyn ExecutionBackend>,
    unique_datasets: Vec<TaskId>,
    parent_to_folds: BTreeMap<TaskId, Vec<DatasetId>>,
}

impl ZeroshotSelectorCv {
    /// Build the driver. `configs` defaults to every configuration the
    /// context knows.
    pub fn new(
        config: CrossValidationConfig,
        context: &dyn SimulatorContext,
        scorer: Arc<dyn ConfigScorer>,
        configs: Option<Vec<ConfigId>>,
    ) -> ZsResult<Self> {
        config.validate()?;

        let mut parent_to_folds: BTreeMap<TaskId, Vec<DatasetId>> = BTreeMap::new();
        for dataset in scorer.datasets() {
            let parent = context.dataset_parent(dataset).ok_or_else(|| {
                ZsError::data_consistency(format!(
                    "dataset {dataset} has no parent task in the simulator context"
                ))
            })?;
            parent_to_folds.entry(parent).or_default().push(dataset.clone());
        }
        for folds in parent_to_folds.values_mut() {
            folds.sort();
            folds.dedup();
        }
        let unique_datasets: Vec<TaskId> = parent_to_folds.keys().copied().collect();

        if config.n_splits > unique_datasets.len() {
            return Err(config_error!(
                "cannot split {} parent datasets into {} folds",
                unique_datasets.len(),
                config.n_splits
            ));
        }

        let configs = configs.unwrap_or_else(|| context.configs());
        let backend = config.mode.backend(&config.workers);

        Ok(Self {
            config,
            scorer,
            configs,
            backend,
            unique_datasets,
            parent_to_folds,
        })
    }

    /// Replace the backend built from the configured execution mode.
    pub fn with_backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Parent datasets, ascending.
    pub fn unique_datasets(&self) -> &[TaskId] {
        &self.unique_datasets
    }

    /// Dataset-folds of a parent dataset, ascending.
    pub fn dataset_folds(&self, parent: TaskId) -> Option<&[DatasetId]> {
        self.parent_to_folds.get(&parent).map(Vec::as_slice)
    }

    /// Train/test parent datasets of every split.
    pub fn splits(&self) -> Vec<(Vec<TaskId>, Vec<TaskId>)> {
        let pick = |idx: &[usize]| -> Vec<TaskId> {
            idx.iter().map(|&i| self.unique_datasets[i]).collect()
        };
        KFold::new(self.config.n_splits)
            .with_random_state(self.config.seed)
            .split(self.unique_datasets.len())
            .into_iter()
            .map(|(train, test)| (pick(&train[..]), pick(&test[..])))
            .collect()
    }

    pub fn run(&self) -> ZsResult<CvReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.backend.ensure_active()?;

        let mut folds = Vec::with_capacity(self.config.n_splits);
        for (i, (train_tasks, test_tasks)) in self.splits().into_iter().enumerate() {
            let fold = i + 1;
            info!(run_id = %run_id, fold, n_splits = self.config.n_splits, "fitting fold");

            let train_datasets = self.expand(&train_tasks)?;
            let test_datasets = self.expand(&test_tasks)?;
            let (selected_configs, score) = self.run_fold(&train_datasets, &test_datasets)?;

            folds.push(FoldResult {
                fold,
                train_tasks,
                test_tasks,
                train_datasets,
                test_datasets,
                selected_configs,
                score,
            });
        }

        let report = CvReport {
            run_id,
            n_splits: self.config.n_splits,
            seed: self.config.seed,
            folds,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            run_id = %run_id,
            mean_score = ?report.mean_score(),
            duration_secs = report.duration_seconds(),
            "cross-validation finished"
        );
        Ok(report)
    }

    /// Select on `train` and score the selection on `test`.
    pub fn run_fold(
        &self,
        train: &[DatasetId],
        test: &[DatasetId],
    ) -> ZsResult<(Vec<ConfigId>, f64)> {
        let scorer_train = self.scorer.subset(train)?;
        let scorer_test = self.scorer.subset(test)?;

        let selector =
            GreedySelector::new(scorer_train, self.configs.clone(), Arc::clone(&self.backend));
        let mut request = SelectionRequest::new(self.config.num_target);
        if self.config.enable_pruning {
            request = request.with_pruning(self.config.pruning_slack);
        }
        if self.config.log_test_scores {
            request = request.with_test_scorer(Arc::clone(&scorer_test));
        }

        let selection = selector.select(&request)?;
        let score = scorer_test.score(&selection.portfolio)?;
        info!(score, selected = selection.portfolio.len(), "fold scored");
        Ok((selection.portfolio, score))
    }

    fn expand(&self, tasks: &[TaskId]) -> ZsResult<Vec<DatasetId>> {
        let mut datasets = Vec::new();
        for task in tasks {
            let folds = self.parent_to_folds.get(task).ok_or_else(|| {
                ZsError::data_consistency(format!("parent dataset {task} has no dataset-folds"))
            })?;
            datasets.extend(folds.iter().cloned());
        }
        Ok(datasets)
    }
}

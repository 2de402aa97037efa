//! Alignment of raw result rows into the dataset/task bookkeeping the
//! selector and the cross-validation driver consume.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;
use zs_types::{
    config_error, ConfigId, DatasetId, ProblemType, ResultRecord, SimulatorContext, TaskId,
    ZsError, ZsResult,
};

/// Counts describing an aligned context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub num_configs: usize,
    pub num_datasets: usize,
    pub num_folds: usize,
    pub folds: Vec<u32>,
    pub num_dataset_folds: usize,
}

/// Results of many configurations over many datasets and folds, restricted
/// to the tasks that were evaluated on every requested fold.
#[derive(Debug, Clone)]
pub struct ZeroshotSimulatorContext {
    folds: Vec<u32>,
    records: Vec<ResultRecord>,
    configs: Vec<ConfigId>,
    dataset_name_to_tid: HashMap<DatasetId, TaskId>,
    dataset_name_to_fold: HashMap<DatasetId, u32>,
    dataset_to_problem_type: HashMap<DatasetId, ProblemType>,
    tid_to_problem_type: HashMap<TaskId, ProblemType>,
    unique_datasets: Vec<TaskId>,
    unique_dataset_folds: Vec<DatasetId>,
}

impl ZeroshotSimulatorContext {
    /// Align `records` on `folds`.
    ///
    /// Rows outside `folds` are dropped, then every task lacking a result on
    /// one of the requested folds is dropped entirely.
    pub fn new(records: Vec<ResultRecord>, folds: &[u32]) -> ZsResult<Self> {
        let folds: Vec<u32> = folds.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if folds.is_empty() {
            return Err(config_error!("at least one fold must be requested"));
        }
        let fold_set: HashSet<u32> = folds.iter().copied().collect();

        let mut folds_per_task: BTreeMap<TaskId, BTreeSet<u32>> = BTreeMap::new();
        for record in records.iter().filter(|r| fold_set.contains(&r.fold)) {
            folds_per_task.entry(record.tid).or_default().insert(record.fold);
        }
        let complete: HashSet<TaskId> = folds_per_task
            .iter()
            .filter(|(_, seen)| seen.len() == folds.len())
            .map(|(tid, _)| *tid)
            .collect();

        let records: Vec<ResultRecord> = records
            .into_iter()
            .filter(|r| fold_set.contains(&r.fold) && complete.contains(&r.tid))
            .collect();

        let mut configs = Vec::new();
        let mut seen_configs = HashSet::new();
        let mut dataset_name_to_tid = HashMap::new();
        let mut dataset_name_to_fold = HashMap::new();
        let mut dataset_to_problem_type = HashMap::new();
        let mut tid_to_problem_type = HashMap::new();

        for record in &records {
            if seen_configs.insert(record.framework.clone()) {
                configs.push(record.framework.clone());
            }
            if let Some(prev) = dataset_name_to_tid.insert(record.dataset.clone(), record.tid) {
                if prev != record.tid {
                    return Err(ZsError::data_consistency(format!(
                        "dataset {} is mapped to tasks {} and {}",
                        record.dataset, prev, record.tid
                    )));
                }
            }
            if let Some(prev) = dataset_name_to_fold.insert(record.dataset.clone(), record.fold) {
                if prev != record.fold {
                    return Err(ZsError::data_consistency(format!(
                        "dataset {} is recorded under folds {} and {}",
                        record.dataset, prev, record.fold
                    )));
                }
            }
            dataset_to_problem_type.insert(record.dataset.clone(), record.problem_type);
            if let Some(prev) = tid_to_problem_type.insert(record.tid, record.problem_type) {
                if prev != record.problem_type {
                    return Err(ZsError::data_consistency(format!(
                        "task {} has conflicting problem types {} and {}",
                        record.tid, prev, record.problem_type
                    )));
                }
            }
        }

        let mut unique_datasets: Vec<TaskId> = complete.into_iter().collect();
        unique_datasets.sort_unstable();
        let mut unique_dataset_folds: Vec<DatasetId> = dataset_name_to_tid.keys().cloned().collect();
        unique_dataset_folds.sort();

        let context = Self {
            folds,
            records,
            configs,
            dataset_name_to_tid,
            dataset_name_to_fold,
            dataset_to_problem_type,
            tid_to_problem_type,
            unique_datasets,
            unique_dataset_folds,
        };
        context.log_info();
        Ok(context)
    }

    pub fn folds(&self) -> &[u32] {
        &self.folds
    }

    /// Aligned result rows.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// All valid configurations, in first-seen order.
    pub fn configs(&self) -> Vec<ConfigId> {
        self.configs.clone()
    }

    /// Parent tasks, ascending, optionally restricted to one problem type.
    pub fn datasets(&self, problem_type: Option<ProblemType>) -> Vec<TaskId> {
        self.unique_datasets
            .iter()
            .copied()
            .filter(|tid| match problem_type {
                Some(pt) => self.tid_to_problem_type.get(tid) == Some(&pt),
                None => true,
            })
            .collect()
    }

    /// Dataset-fold identifiers, ascending, optionally restricted to one
    /// problem type.
    pub fn dataset_folds(&self, problem_type: Option<ProblemType>) -> Vec<DatasetId> {
        self.unique_dataset_folds
            .iter()
            .filter(|d| match problem_type {
                Some(pt) => self.dataset_to_problem_type.get(*d) == Some(&pt),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Parent task of a dataset-fold.
    pub fn dataset_parent(&self, dataset: &str) -> Option<TaskId> {
        self.dataset_name_to_tid.get(dataset).copied()
    }

    /// Upstream fold index of a dataset-fold.
    pub fn dataset_fold(&self, dataset: &str) -> Option<u32> {
        self.dataset_name_to_fold.get(dataset).copied()
    }

    pub fn dataset_name_to_tid(&self) -> &HashMap<DatasetId, TaskId> {
        &self.dataset_name_to_tid
    }

    /// Verify an upstream collection keyed by task covers every aligned task
    /// on every requested fold.
    pub fn check_coverage(&self, available: &HashMap<TaskId, Vec<u32>>) -> ZsResult<()> {
        for tid in &self.unique_datasets {
            let Some(present) = available.get(tid) else {
                return Err(ZsError::data_consistency(format!(
                    "missing expected dataset {tid}"
                )));
            };
            for fold in &self.folds {
                if !present.contains(fold) {
                    return Err(ZsError::data_consistency(format!(
                        "missing expected fold {fold} in dataset {tid}: expected {:?}, actual {:?}",
                        self.folds, present
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            num_configs: self.configs.len(),
            num_datasets: self.unique_datasets.len(),
            num_folds: self.folds.len(),
            folds: self.folds.clone(),
            num_dataset_folds: self.unique_dataset_folds.len(),
        }
    }

    fn log_info(&self) {
        let summary = self.summary();
        info!(
            configs = summary.num_configs,
            datasets = summary.num_datasets,
            folds = ?summary.folds,
            dataset_folds = summary.num_dataset_folds,
            "zeroshot simulator context aligned"
        );
    }
}

impl SimulatorContext for ZeroshotSimulatorContext {
    fn configs(&self) -> Vec<ConfigId> {
        ZeroshotSimulatorContext::configs(self)
    }

    fn dataset_parent(&self, dataset: &str) -> Option<TaskId> {
        ZeroshotSimulatorContext::dataset_parent(self, dataset)
    }
}

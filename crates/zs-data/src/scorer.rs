//! In-memory reference scoring oracle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use zs_types::{scorer_error, ConfigId, ConfigScorer, DatasetId, ResultRecord, ZsError, ZsResult};

use crate::context::ZeroshotSimulatorContext;

type ErrorTable = HashMap<DatasetId, HashMap<ConfigId, f64>>;

/// Scores a portfolio by the mean, over datasets, of the lowest error any
/// portfolio member reaches on that dataset (oracle best-of-portfolio).
///
/// A dataset on which no member has a result counts as the worst error any
/// configuration reaches there, unless a fixed penalty is set with
/// [`BestErrorScorer::with_missing_penalty`]. Either way the score stays
/// finite, so sparse results still rank portfolios.
#[derive(Debug, Clone)]
pub struct BestErrorScorer {
    datasets: Vec<DatasetId>,
    errors: Arc<ErrorTable>,
    worst: Arc<HashMap<DatasetId, f64>>,
    missing_penalty: Option<f64>,
}

impl BestErrorScorer {
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let mut errors: ErrorTable = HashMap::new();
        for record in records {
            errors
                .entry(record.dataset.clone())
                .or_default()
                .insert(record.framework.clone(), record.metric_error);
        }
        let mut datasets: Vec<DatasetId> = errors.keys().cloned().collect();
        datasets.sort();
        let worst = errors
            .iter()
            .map(|(dataset, by_config)| {
                let max = by_config.values().copied().fold(f64::NEG_INFINITY, f64::max);
                (dataset.clone(), max)
            })
            .collect();
        Self {
            datasets,
            errors: Arc::new(errors),
            worst: Arc::new(worst),
            missing_penalty: None,
        }
    }

    pub fn from_context(context: &ZeroshotSimulatorContext) -> Self {
        Self::from_records(context.records())
    }

    pub fn with_missing_penalty(mut self, penalty: f64) -> Self {
        self.missing_penalty = Some(penalty);
        self
    }

    fn missing_error(&self, dataset: &str) -> f64 {
        self.missing_penalty
            .or_else(|| self.worst.get(dataset).copied())
            .unwrap_or(f64::INFINITY)
    }

    fn dataset_error(&self, dataset: &str, configs: &[ConfigId]) -> f64 {
        let Some(by_config) = self.errors.get(dataset) else {
            return self.missing_error(dataset);
        };
        configs
            .iter()
            .filter_map(|c| by_config.get(c).copied())
            .fold(None, |best: Option<f64>, e| match best {
                Some(b) if b <= e => Some(b),
                _ => Some(e),
            })
            .unwrap_or_else(|| self.missing_error(dataset))
    }
}

impl ConfigScorer for BestErrorScorer {
    fn score(&self, configs: &[ConfigId]) -> ZsResult<f64> {
        if self.datasets.is_empty() {
            return Err(scorer_error!("scorer has no datasets to score on"));
        }
        let total: f64 = self
            .datasets
            .iter()
            .map(|d| self.dataset_error(d, configs))
            .sum();
        Ok(total / self.datasets.len() as f64)
    }

    fn subset(&self, datasets: &[DatasetId]) -> ZsResult<Arc<dyn ConfigScorer>> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            if !self.errors.contains_key(dataset) {
                return Err(ZsError::data_consistency(format!(
                    "dataset {dataset} is not known to the scorer"
                )));
            }
            if seen.insert(dataset) {
                kept.push(dataset.clone());
            }
        }
        Ok(Arc::new(Self {
            datasets: kept,
            errors: Arc::clone(&self.errors),
            worst: Arc::clone(&self.worst),
            missing_penalty: self.missing_penalty,
        }))
    }

    fn datasets(&self) -> &[DatasetId] {
        &self.datasets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zs_types::ProblemType;

    fn scorer() -> BestErrorScorer {
        let rows = vec![
            ResultRecord::new(1, 0, "A", ProblemType::Binary, 0.4),
            ResultRecord::new(1, 0, "B", ProblemType::Binary, 0.2),
            ResultRecord::new(2, 0, "A", ProblemType::Binary, 0.1),
            ResultRecord::new(2, 0, "B", ProblemType::Binary, 0.3),
        ];
        BestErrorScorer::from_records(&rows)
    }

    fn ids(names: &[&str]) -> Vec<ConfigId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn takes_best_member_per_dataset() {
        let s = scorer();
        assert!((s.score(&ids(&["A"])).unwrap() - 0.25).abs() < 1e-12);
        assert!((s.score(&ids(&["A", "B"])).unwrap() - 0.15).abs() < 1e-12);
        assert_eq!(
            s.score(&ids(&["A", "B"])).unwrap(),
            s.score(&ids(&["B", "A"])).unwrap()
        );
    }

    #[test]
    fn missing_results_count_as_worst_observed_error() {
        let s = scorer();
        assert!((s.score(&[]).unwrap() - 0.35).abs() < 1e-12);
        assert!((s.score(&ids(&["unknown"])).unwrap() - 0.35).abs() < 1e-12);
    }

    #[test]
    fn better_covered_config_ranks_first() {
        let rows = vec![
            ResultRecord::new(1, 0, "A", ProblemType::Binary, 0.1),
            ResultRecord::new(2, 0, "B", ProblemType::Binary, 0.1),
            ResultRecord::new(2, 0, "C", ProblemType::Binary, 0.9),
        ];
        let s = BestErrorScorer::from_records(&rows);
        let b = s.score(&ids(&["B"])).unwrap();
        let c = s.score(&ids(&["C"])).unwrap();
        assert!(b.is_finite() && c.is_finite());
        assert!(b < c);
        assert!((b - 0.1).abs() < 1e-12);
        assert!((c - 0.5).abs() < 1e-12);
    }

    #[test]
    fn fixed_penalty_overrides_worst_error() {
        let s = scorer().with_missing_penalty(1.0);
        assert_eq!(s.score(&[]).unwrap(), 1.0);
        assert!((s.score(&ids(&["unknown"])).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn subset_is_a_new_restricted_scorer() {
        let s = scorer();
        let restricted = s.subset(&["2_0".to_string()]).unwrap();
        assert_eq!(restricted.datasets(), &["2_0".to_string()]);
        assert!((restricted.score(&ids(&["A"])).unwrap() - 0.1).abs() < 1e-12);
        // The parent scorer keeps its full scope.
        assert_eq!(s.datasets().len(), 2);
    }

    #[test]
    fn subset_rejects_unknown_dataset() {
        let err = scorer().subset(&["9_0".to_string()]).err().expect("expected an error");
        assert!(matches!(err, ZsError::DataConsistency { .. }));
    }

    #[test]
    fn empty_scope_is_a_scorer_error() {
        let empty = scorer().subset(&[]).unwrap();
        assert!(matches!(empty.score(&ids(&["A"])), Err(ZsError::Scorer { .. })));
    }
}

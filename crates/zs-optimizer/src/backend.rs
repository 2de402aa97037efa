//! Task distribution for scoring batches of candidate portfolios.
//!
//! A forward-selection step (or a pruning round) is a batch of independent
//! [`ScoreTask`]s evaluated against one registered scorer. Backends differ
//! only in where the tasks run; results always come back in submission
//! order so the arg-min maps back to a candidate unambiguously.

use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use zs_types::{config_error, scorer_error, ConfigId, ConfigScorer, ZsError, ZsResult};

/// Configuration for the worker thread pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of worker threads (`None` = one per logical core).
    pub num_threads: Option<usize>,

    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "zs-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }
}

/// How candidate evaluations of one step are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One candidate at a time on the calling thread.
    #[default]
    Sequential,
    /// One task per candidate on a worker pool.
    Parallel,
}

impl ExecutionMode {
    /// Build a backend for this mode. Parallel backends start uninitialised.
    pub fn backend(self, workers: &WorkerPoolConfig) -> Arc<dyn ExecutionBackend> {
        match self {
            Self::Sequential => Arc::new(LocalBackend),
            Self::Parallel => Arc::new(ThreadPoolBackend::new(workers.clone())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// Shared reference to a scorer registered with a backend.
///
/// Cloning the handle never clones the scorer.
#[derive(Clone)]
pub struct ScorerHandle {
    scorer: Arc<dyn ConfigScorer>,
}

impl ScorerHandle {
    pub fn scorer(&self) -> &dyn ConfigScorer {
        self.scorer.as_ref()
    }
}

impl fmt::Debug for ScorerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScorerHandle")
            .field("datasets", &self.scorer.datasets().len())
            .finish()
    }
}

/// The single edit a task applies to its portfolio snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskChange {
    Append(ConfigId),
    Remove(ConfigId),
}

/// One unit of work: score an immutable portfolio snapshot with one edit.
#[derive(Debug, Clone)]
pub struct ScoreTask {
    base: Arc<[ConfigId]>,
    change: TaskChange,
}

impl ScoreTask {
    pub fn append(base: &Arc<[ConfigId]>, candidate: ConfigId) -> Self {
        Self {
            base: Arc::clone(base),
            change: TaskChange::Append(candidate),
        }
    }

    pub fn remove(base: &Arc<[ConfigId]>, config: ConfigId) -> Self {
        Self {
            base: Arc::clone(base),
            change: TaskChange::Remove(config),
        }
    }

    pub fn change(&self) -> &TaskChange {
        &self.change
    }

    /// The portfolio this task scores.
    pub fn portfolio(&self) -> Vec<ConfigId> {
        match &self.change {
            TaskChange::Append(candidate) => {
                let mut configs = Vec::with_capacity(self.base.len() + 1);
                configs.extend(self.base.iter().cloned());
                configs.push(candidate.clone());
                configs
            }
            TaskChange::Remove(config) => {
                self.base.iter().filter(|c| *c != config).cloned().collect()
            }
        }
    }

    pub fn run(&self, scorer: &dyn ConfigScorer) -> ZsResult<f64> {
        checked_score(scorer, &self.portfolio())
    }
}

/// Score `configs`, reporting a NaN score as a scorer failure since it cannot
/// take part in an arg-min.
pub fn checked_score(scorer: &dyn ConfigScorer, configs: &[ConfigId]) -> ZsResult<f64> {
    let score = scorer.score(configs)?;
    if score.is_nan() {
        return Err(scorer_error!("scorer returned NaN for {:?}", configs));
    }
    Ok(score)
}

/// Executes batches of score tasks.
///
/// Lifecycle is explicit: callers run [`ExecutionBackend::ensure_active`]
/// before the first submission and may [`ExecutionBackend::shutdown`] when
/// done.
pub trait ExecutionBackend: Send + Sync {
    /// Short name used in progress logs.
    fn name(&self) -> &'static str;

    fn is_active(&self) -> bool;

    /// Start the backend. Calling it on an active backend is a no-op.
    fn initialize(&self) -> ZsResult<()>;

    /// Release backend resources. A later `initialize` starts it again.
    fn shutdown(&self);

    fn ensure_active(&self) -> ZsResult<()> {
        if !self.is_active() {
            self.initialize()?;
        }
        Ok(())
    }

    /// Register a scorer once so tasks can refer to it by handle.
    fn register(&self, scorer: Arc<dyn ConfigScorer>) -> ScorerHandle {
        ScorerHandle { scorer }
    }

    /// Run every task and return the scores in submission order. Any failed
    /// task fails the whole batch.
    fn score_batch(&self, scorer: &ScorerHandle, tasks: &[ScoreTask]) -> ZsResult<Vec<f64>>;
}

/// Evaluates tasks one at a time on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn is_active(&self) -> bool {
        true
    }

    fn initialize(&self) -> ZsResult<()> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn score_batch(&self, scorer: &ScorerHandle, tasks: &[ScoreTask]) -> ZsResult<Vec<f64>> {
        tasks.iter().map(|task| task.run(scorer.scorer())).collect()
    }
}

/// Evaluates tasks on a dedicated rayon thread pool.
pub struct ThreadPoolBackend {
    config: WorkerPoolConfig,
    pool: RwLock<Option<Arc<ThreadPool>>>,
}

impl ThreadPoolBackend {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Number of worker threads, if the pool is running.
    pub fn current_num_threads(&self) -> Option<usize> {
        self.pool.read().as_ref().map(|pool| pool.current_num_threads())
    }
}

impl fmt::Debug for ThreadPoolBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolBackend")
            .field("config", &self.config)
            .field("active", &self.is_active())
            .finish()
    }
}

impl ExecutionBackend for ThreadPoolBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn is_active(&self) -> bool {
        self.pool.read().is_some()
    }

    fn initialize(&self) -> ZsResult<()> {
        let mut slot = self.pool.write();
        if slot.is_some() {
            return Ok(());
        }

        let prefix = self.config.thread_name_prefix.clone();
        let mut builder = ThreadPoolBuilder::new().thread_name(move |i| format!("{prefix}-{i}"));
        if let Some(n) = self.config.num_threads {
            if n == 0 {
                return Err(config_error!("worker pool needs at least one thread"));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| ZsError::backend(format!("failed to start worker pool: {e}")))?;

        info!(threads = pool.current_num_threads(), "worker pool started");
        *slot = Some(Arc::new(pool));
        Ok(())
    }

    fn shutdown(&self) {
        if self.pool.write().take().is_some() {
            info!("worker pool shut down");
        }
    }

    fn score_batch(&self, scorer: &ScorerHandle, tasks: &[ScoreTask]) -> ZsResult<Vec<f64>> {
        let pool = self
            .pool
            .read()
            .clone()
            .ok_or_else(|| ZsError::backend("worker pool is not initialized"))?;

        debug!(tasks = tasks.len(), "dispatching score batch");
        pool.install(|| {
            tasks
                .par_iter()
                .map(|task| task.run(scorer.scorer()))
                .collect::<ZsResult<Vec<f64>>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zs_types::DatasetId;

    /// Scores a portfolio by its length; fails on a configured poison id.
    struct LengthScorer {
        poison: Option<&'static str>,
        nan_on: Option<&'static str>,
    }

    impl ConfigScorer for LengthScorer {
        fn score(&self, configs: &[ConfigId]) -> ZsResult<f64> {
            if let Some(p) = self.poison {
                if configs.iter().any(|c| c == p) {
                    return Err(scorer_error!("cannot score {p}"));
                }
            }
            if let Some(n) = self.nan_on {
                if configs.iter().any(|c| c == n) {
                    return Ok(f64::NAN);
                }
            }
            Ok(configs.len() as f64 + configs.first().map_or(0.0, |c| c.len() as f64) / 10.0)
        }

        fn subset(&self, _datasets: &[DatasetId]) -> ZsResult<Arc<dyn ConfigScorer>> {
            Ok(Arc::new(LengthScorer {
                poison: self.poison,
                nan_on: self.nan_on,
            }))
        }

        fn datasets(&self) -> &[DatasetId] {
            &[]
        }
    }

    fn handle(backend: &dyn ExecutionBackend, poison: Option<&'static str>) -> ScorerHandle {
        backend.register(Arc::new(LengthScorer {
            poison,
            nan_on: None,
        }))
    }

    fn base(names: &[&str]) -> Arc<[ConfigId]> {
        names.iter().map(|s| s.to_string()).collect::<Vec<_>>().into()
    }

    #[test]
    fn task_edits_snapshot_without_mutating_it() {
        let snapshot = base(&["A", "B"]);
        let append = ScoreTask::append(&snapshot, "C".into());
        let remove = ScoreTask::remove(&snapshot, "A".into());
        assert_eq!(append.portfolio(), vec!["A", "B", "C"]);
        assert_eq!(remove.portfolio(), vec!["B"]);
        assert_eq!(remove.change(), &TaskChange::Remove("A".into()));
        assert_eq!(&*snapshot, &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn thread_pool_requires_initialization() {
        let backend = ThreadPoolBackend::new(WorkerPoolConfig::default().with_threads(2));
        assert!(!backend.is_active());

        let h = handle(&backend, None);
        let tasks = vec![ScoreTask::append(&base(&[]), "A".into())];
        assert!(matches!(
            backend.score_batch(&h, &tasks),
            Err(ZsError::Backend { .. })
        ));

        backend.ensure_active().unwrap();
        backend.ensure_active().unwrap();
        assert_eq!(backend.current_num_threads(), Some(2));
        assert!(backend.score_batch(&h, &tasks).is_ok());

        backend.shutdown();
        assert!(!backend.is_active());
        assert_eq!(backend.current_num_threads(), None);
    }

    #[test]
    fn zero_threads_is_a_config_error() {
        let backend = ThreadPoolBackend::new(WorkerPoolConfig::default().with_threads(0));
        assert!(matches!(backend.initialize(), Err(ZsError::Config(_))));
        assert!(!backend.is_active());
    }

    #[test]
    fn parallel_results_follow_submission_order() {
        let parallel = ThreadPoolBackend::new(WorkerPoolConfig::default().with_threads(4));
        parallel.initialize().unwrap();
        let local = LocalBackend;

        let snapshot = base(&["seed"]);
        let tasks: Vec<ScoreTask> = (0..64)
            .map(|i| ScoreTask::remove(&snapshot, format!("c{i}")))
            .chain((0..64).map(|i| ScoreTask::append(&snapshot, "x".repeat(i))))
            .collect();

        let a = local.score_batch(&handle(&local, None), &tasks).unwrap();
        let b = parallel.score_batch(&handle(&parallel, None), &tasks).unwrap();
        assert_eq!(a.len(), tasks.len());
        assert_eq!(a, b);
    }

    #[test]
    fn one_failed_task_fails_the_batch() {
        let parallel = ThreadPoolBackend::new(WorkerPoolConfig::default().with_threads(2));
        parallel.initialize().unwrap();
        let snapshot = base(&[]);
        let tasks: Vec<ScoreTask> = ["A", "B", "bad", "C"]
            .iter()
            .map(|c| ScoreTask::append(&snapshot, c.to_string()))
            .collect();

        let backends: [&dyn ExecutionBackend; 2] = [&parallel, &LocalBackend];
        for backend in backends {
            let h = handle(backend, Some("bad"));
            assert!(matches!(
                backend.score_batch(&h, &tasks),
                Err(ZsError::Scorer { .. })
            ));
        }
    }

    #[test]
    fn nan_scores_are_rejected() {
        let scorer = LengthScorer {
            poison: None,
            nan_on: Some("B"),
        };
        let task = ScoreTask::append(&base(&["A"]), "B".into());
        assert!(matches!(task.run(&scorer), Err(ZsError::Scorer { .. })));
    }

    #[test]
    fn execution_mode_builds_matching_backend() {
        let workers = WorkerPoolConfig::default();
        assert_eq!(ExecutionMode::Sequential.backend(&workers).name(), "sequential");
        assert_eq!(ExecutionMode::Parallel.backend(&workers).name(), "parallel");
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Parallel).unwrap(),
            "\"parallel\""
        );
    }
}

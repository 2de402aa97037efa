//! # zs-optimizer
//!
//! Selection of zero-shot configuration portfolios.
//!
//! Provides greedy forward selection with backward pruning over an opaque
//! scoring oracle, sequential and thread-pool execution backends for the
//! per-step candidate evaluations, and a cross-validation driver that
//! estimates how well the selection generalises to unseen datasets.

mod backend;
mod config;
mod cv;
mod greedy;
mod kfold;
mod report;

pub use backend::{
    checked_score, ExecutionBackend, ExecutionMode, LocalBackend, ScoreTask, ScorerHandle,
    TaskChange, ThreadPoolBackend, WorkerPoolConfig,
};
pub use config::{CrossValidationConfig, SelectionConfig};
pub use cv::ZeroshotSelectorCv;
pub use greedy::{GreedySelector, SelectionRequest};
pub use kfold::KFold;
pub use report::{
    CvReport, FoldResult, IterationRecord, Pruning, RemovalRecord, RunId, Selection,
};

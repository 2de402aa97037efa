//! Greedy forward selection of a zero-shot portfolio with optional backward
//! pruning.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use zs_types::{validation_error, ConfigId, ConfigScorer, ZsError, ZsResult};

use crate::backend::{checked_score, ExecutionBackend, LocalBackend, ScoreTask, ScorerHandle};
use crate::config::SelectionConfig;
use crate::report::{IterationRecord, Pruning, RemovalRecord, Selection};

/// Arguments of one selection run.
#[derive(Clone)]
pub struct SelectionRequest {
    pub num_target: usize,
    /// Portfolio to extend. Its order is kept.
    pub prior_portfolio: Vec<ConfigId>,
    pub enable_pruning: bool,
    pub pruning_slack: f64,
    /// Held-out scorer evaluated on every partial portfolio for reporting.
    pub test_scorer: Option<Arc<dyn ConfigScorer>>,
}

impl SelectionRequest {
    pub fn new(num_target: usize) -> Self {
        Self {
            num_target,
            prior_portfolio: Vec::new(),
            enable_pruning: false,
            pruning_slack: 0.0,
            test_scorer: None,
        }
    }

    pub fn with_prior(mut self, prior: Vec<ConfigId>) -> Self {
        self.prior_portfolio = prior;
        self
    }

    pub fn with_pruning(mut self, slack: f64) -> Self {
        self.enable_pruning = true;
        self.pruning_slack = slack;
        self
    }

    pub fn with_test_scorer(mut self, scorer: Arc<dyn ConfigScorer>) -> Self {
        self.test_scorer = Some(scorer);
        self
    }
}

impl From<&SelectionConfig> for SelectionRequest {
    fn from(config: &SelectionConfig) -> Self {
        Self {
            num_target: config.num_target,
            prior_portfolio: Vec::new(),
            enable_pruning: config.enable_pruning,
            pruning_slack: config.pruning_slack,
            test_scorer: None,
        }
    }
}

/// Greedy portfolio selector over a fixed candidate pool.
pub struct GreedySelector {
    scorer: Arc<dyn ConfigScorer>,
    configs: Vec<ConfigId>,
    backend: Arc<dyn ExecutionBackend>,
}

impl GreedySelector {
    pub fn new(
        scorer: Arc<dyn ConfigScorer>,
        configs: Vec<ConfigId>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            scorer,
            configs,
            backend,
        }
    }

    /// Selector evaluating candidates on the calling thread.
    pub fn sequential(scorer: Arc<dyn ConfigScorer>, configs: Vec<ConfigId>) -> Self {
        Self::new(scorer, configs, Arc::new(LocalBackend))
    }

    /// Selector whose backend follows `config.mode`.
    pub fn for_config(
        scorer: Arc<dyn ConfigScorer>,
        configs: Vec<ConfigId>,
        config: &SelectionConfig,
    ) -> Self {
        Self::new(scorer, configs, config.mode.backend(&config.workers))
    }

    /// The candidate pool.
    pub fn configs(&self) -> &[ConfigId] {
        &self.configs
    }

    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    /// Grow `request.prior_portfolio` one best-scoring configuration at a
    /// time until it holds `request.num_target` entries or the pool runs
    /// out, then prune if requested.
    pub fn select(&self, request: &SelectionRequest) -> ZsResult<Selection> {
        let mut portfolio = request.prior_portfolio.clone();
        let mut seen = HashSet::with_capacity(portfolio.len());
        for config in &portfolio {
            if !seen.insert(config.as_str()) {
                return Err(validation_error!(
                    "prior portfolio lists {config} more than once"
                ));
            }
        }
        if request.enable_pruning && request.pruning_slack.is_nan() {
            return Err(validation_error!("pruning slack must not be NaN"));
        }

        let needs_forward = portfolio.len() < request.num_target;
        if !needs_forward && !request.enable_pruning {
            return Ok(Selection {
                portfolio,
                iterations: Vec::new(),
                removals: Vec::new(),
            });
        }

        self.backend.ensure_active()?;
        let handle = self.backend.register(Arc::clone(&self.scorer));

        let mut iterations = Vec::new();
        while portfolio.len() < request.num_target {
            let iteration = iterations.len() + 1;
            let chosen: HashSet<&ConfigId> = portfolio.iter().collect();
            let remaining: Vec<ConfigId> = self
                .configs
                .iter()
                .filter(|c| !chosen.contains(c))
                .cloned()
                .collect();
            if remaining.is_empty() {
                info!(
                    selected = portfolio.len(),
                    target = request.num_target,
                    "candidate pool exhausted before reaching target size"
                );
                break;
            }

            let started = Instant::now();
            let (best_idx, best_score) = self.best_addition(&handle, &portfolio, &remaining)?;
            let elapsed_secs = started.elapsed().as_secs_f64();

            let winner = remaining[best_idx].clone();
            portfolio.push(winner.clone());

            let test_score = request
                .test_scorer
                .as_ref()
                .map(|scorer| scorer.score(&portfolio))
                .transpose()?;

            info!(
                iteration,
                score = best_score,
                elapsed_secs,
                backend = self.backend.name(),
                test_score = ?test_score,
                config = %winner,
                "selected configuration"
            );

            iterations.push(IterationRecord {
                iteration,
                config: winner,
                score: best_score,
                elapsed_secs,
                backend: self.backend.name().to_string(),
                test_score,
            });
        }

        let removals = if request.enable_pruning {
            let pruned = self.prune_with(&handle, &portfolio, request.pruning_slack)?;
            portfolio = pruned.portfolio;
            pruned.removals
        } else {
            Vec::new()
        };

        info!(portfolio = ?portfolio, "greedy selection finished");
        Ok(Selection {
            portfolio,
            iterations,
            removals,
        })
    }

    /// Score every `portfolio + [candidate]` and return the position and
    /// score of the lowest one. Ties go to the earliest candidate.
    fn best_addition(
        &self,
        handle: &ScorerHandle,
        portfolio: &[ConfigId],
        remaining: &[ConfigId],
    ) -> ZsResult<(usize, f64)> {
        let base: Arc<[ConfigId]> = portfolio.into();
        let tasks: Vec<ScoreTask> = remaining
            .iter()
            .map(|candidate| ScoreTask::append(&base, candidate.clone()))
            .collect();
        let scores = self.backend.score_batch(handle, &tasks)?;
        if scores.len() != tasks.len() {
            return Err(ZsError::backend(format!(
                "backend returned {} scores for {} tasks",
                scores.len(),
                tasks.len()
            )));
        }
        arg_min(&scores).ok_or_else(|| ZsError::backend("no candidate was scored"))
    }

    /// Repeatedly drop the configuration whose removal scores lowest, as long
    /// as the first qualifying removal of a round stays within
    /// `slack` of the current score.
    ///
    /// Within a round, removals are visited in portfolio order. Until one is
    /// accepted a removal must score `<= current + slack`; afterwards a
    /// removal must score `<=` the best accepted one, so among exact ties the
    /// later removal wins.
    pub fn prune(&self, portfolio: &[ConfigId], slack: f64) -> ZsResult<Pruning> {
        if portfolio.is_empty() {
            return Ok(Pruning {
                portfolio: Vec::new(),
                removals: Vec::new(),
            });
        }
        self.backend.ensure_active()?;
        let handle = self.backend.register(Arc::clone(&self.scorer));
        self.prune_with(&handle, portfolio, slack)
    }

    /// Pruning rounds against an already registered scorer.
    fn prune_with(
        &self,
        handle: &ScorerHandle,
        portfolio: &[ConfigId],
        slack: f64,
    ) -> ZsResult<Pruning> {
        let mut portfolio = portfolio.to_vec();
        let mut removals = Vec::new();
        if portfolio.is_empty() {
            return Ok(Pruning {
                portfolio,
                removals,
            });
        }

        let mut best_score = checked_score(handle.scorer(), &portfolio)?;

        let mut round = 0;
        while !portfolio.is_empty() {
            round += 1;
            let base: Arc<[ConfigId]> = portfolio.as_slice().into();
            let tasks: Vec<ScoreTask> = portfolio
                .iter()
                .map(|config| ScoreTask::remove(&base, config.clone()))
                .collect();
            let scores = self.backend.score_batch(handle, &tasks)?;

            let threshold = best_score + slack;
            let mut accepted: Option<usize> = None;
            for (idx, &score) in scores.iter().enumerate() {
                let qualifies = match accepted {
                    None => score <= threshold,
                    Some(_) => score <= best_score,
                };
                if qualifies {
                    best_score = score;
                    accepted = Some(idx);
                }
            }

            let Some(idx) = accepted else {
                break;
            };
            let removed = portfolio.remove(idx);
            info!(round, score = best_score, config = %removed, "removing configuration");
            removals.push(RemovalRecord {
                round,
                config: removed,
                score: best_score,
            });
        }

        Ok(Pruning {
            portfolio,
            removals,
        })
    }
}

/// Position and value of the smallest score; the first one wins ties.
fn arg_min(scores: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, current)) if score >= current => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

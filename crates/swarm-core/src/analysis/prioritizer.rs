//! Prioritizer - folds the weighted heuristic set into one ordered job list.

use std::sync::Arc;

use tracing::{debug, info};

use super::{
    ApiCallHeuristic, CallerCountHeuristic, EntryPointHeuristic, FunctionSizeHeuristic,
    Heuristic, InternalCalleeHeuristic, StringHeavyHeuristic,
};
use crate::config::HeuristicConfig;
use crate::domain::{ConfigError, Job, Target};
use crate::ports::BinaryView;

/// Entries logged after each prioritization.
const LOG_TOP: usize = 5;

const NO_SIGNAL_REASON: &str = "standard_priority";

/// A heuristic together with its configured weight.
pub struct WeightedHeuristic {
    heuristic: Box<dyn Heuristic>,
    weight: f64,
    enabled: bool,
}

impl WeightedHeuristic {
    pub fn new(heuristic: impl Heuristic + 'static, weight: f64) -> Self {
        Self {
            heuristic: Box::new(heuristic),
            weight,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.heuristic.name()
    }
}

impl std::fmt::Debug for WeightedHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedHeuristic")
            .field("name", &self.name())
            .field("weight", &self.weight)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Scores targets against a `BinaryView`.
///
/// `prioritize` has no side effects: the same targets against the same view
/// and heuristic set always produce the same list, so it can be called again
/// with a different configuration to compare plans.
pub struct Prioritizer {
    view: Arc<dyn BinaryView>,
    heuristics: Vec<WeightedHeuristic>,
}

impl Prioritizer {
    /// Empty heuristic set; add entries with [`Prioritizer::with`].
    pub fn new(view: Arc<dyn BinaryView>) -> Self {
        Self {
            view,
            heuristics: Vec::new(),
        }
    }

    /// The six standard heuristics with the weights and toggles in `config`.
    pub fn from_config(
        view: Arc<dyn BinaryView>,
        config: &HeuristicConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let toggle = |w: WeightedHeuristic, enabled: bool| if enabled { w } else { w.disabled() };

        Ok(Self::new(view)
            .with(toggle(
                WeightedHeuristic::new(ApiCallHeuristic, config.api_call.weight),
                config.api_call.enabled,
            ))
            .with(toggle(
                WeightedHeuristic::new(CallerCountHeuristic, config.caller_count.weight),
                config.caller_count.enabled,
            ))
            .with(toggle(
                WeightedHeuristic::new(
                    StringHeavyHeuristic::new(config.string_heavy.min_string_length),
                    config.string_heavy.weight,
                ),
                config.string_heavy.enabled,
            ))
            .with(toggle(
                WeightedHeuristic::new(FunctionSizeHeuristic, config.function_size.weight),
                config.function_size.enabled,
            ))
            .with(toggle(
                WeightedHeuristic::new(InternalCalleeHeuristic, config.internal_callee.weight),
                config.internal_callee.enabled,
            ))
            .with(toggle(
                WeightedHeuristic::new(
                    EntryPointHeuristic::new(config.entry_point.mode),
                    config.entry_point.weight,
                ),
                config.entry_point.enabled,
            )))
    }

    pub fn with(mut self, heuristic: WeightedHeuristic) -> Self {
        self.heuristics.push(heuristic);
        self
    }

    /// Score one target.
    pub fn score(&self, target: Target) -> Job {
        let view = self.view.as_ref();
        let mut total = 0.0;
        let mut reasons = Vec::new();
        let mut metrics = Vec::new();

        for h in self.heuristics.iter().filter(|h| h.enabled) {
            let contribution = h.heuristic.score(view, target) * h.weight;
            if contribution == 0.0 {
                continue;
            }
            total += contribution;
            metrics.push(format!("{}={:+.1}", h.name(), contribution));
            if let Some(why) = h.heuristic.explain(view, target) {
                reasons.push(format!("{}:{}", h.name(), why));
            }
        }

        let reason = if reasons.is_empty() {
            NO_SIGNAL_REASON.to_string()
        } else {
            reasons.join(", ")
        };

        Job::new(target, total, reason, metrics)
    }

    /// Score every target and sort by score, highest first.
    ///
    /// Equal scores keep their input order. Each job's rank is its position in
    /// the returned list.
    pub fn prioritize(&self, targets: &[Target]) -> Vec<Job> {
        let mut jobs: Vec<Job> = targets.iter().map(|&t| self.score(t)).collect();

        // Vec::sort_by is stable.
        jobs.sort_by(|a, b| b.score().total_cmp(&a.score()));

        let jobs: Vec<Job> = jobs
            .into_iter()
            .enumerate()
            .map(|(rank, job)| job.with_rank(rank))
            .collect();

        info!(count = jobs.len(), "prioritized targets");
        for job in jobs.iter().take(LOG_TOP) {
            info!(
                rank = job.rank(),
                target = %job.target(),
                name = %self.view.display_name(job.target()),
                score = job.score(),
                reason = job.reason(),
                "top target"
            );
        }
        debug!(
            heuristics = ?self.heuristics,
            "prioritization used heuristic set"
        );

        jobs
    }
}

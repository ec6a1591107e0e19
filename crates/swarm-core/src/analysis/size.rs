use super::Heuristic;
use crate::domain::Target;
use crate::ports::BinaryView;

/// `(exclusive upper bound in bytes, score, label)`; the last bucket catches
/// everything else.
const BUCKETS: &[(u64, f64, &str)] = &[
    (100, 400.0, "tiny"),
    (500, 200.0, "small"),
    (1_000, 0.0, "medium"),
    (5_000, -100.0, "large"),
];
const HUGE: (f64, &str) = (-200.0, "huge");

/// Small functions are quick wins; huge ones are expensive and benefit from
/// named callees.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionSizeHeuristic;

impl FunctionSizeHeuristic {
    fn bucket(size: u64) -> (f64, &'static str) {
        BUCKETS
            .iter()
            .find(|(bound, _, _)| size < *bound)
            .map(|&(_, score, label)| (score, label))
            .unwrap_or(HUGE)
    }
}

impl Heuristic for FunctionSizeHeuristic {
    fn name(&self) -> &'static str {
        "FunctionSize"
    }

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64 {
        view.function(target)
            .map(|f| Self::bucket(f.size).0)
            .unwrap_or(0.0)
    }

    fn explain(&self, view: &dyn BinaryView, target: Target) -> Option<String> {
        view.function(target)
            .map(|f| Self::bucket(f.size).1.to_string())
    }
}

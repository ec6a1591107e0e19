//! Heuristic trait - one named scoring signal over a target.

use crate::domain::Target;
use crate::ports::BinaryView;

/// A pure scoring function.
///
/// Scores are read from the `BinaryView` only. Scoring the same target twice
/// against an unchanged database yields the same value.
///
/// Positive scores pull a target towards the front of the queue, negative
/// scores push it back. The prioritizer multiplies by a configured weight.
pub trait Heuristic: Send + Sync {
    /// Stable name used in reasons and metrics (e.g. `"APICall"`).
    fn name(&self) -> &'static str;

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64;

    /// Short explanation of a non-zero score (e.g. `"3_api_calls"`).
    fn explain(&self, _view: &dyn BinaryView, _target: Target) -> Option<String> {
        None
    }
}

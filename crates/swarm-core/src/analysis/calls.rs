//! Call-graph heuristics: outgoing API calls, incoming callers and outgoing
//! internal calls.

use std::collections::BTreeSet;

use super::Heuristic;
use crate::domain::{CallSite, Target};
use crate::ports::BinaryView;

/// Distinct call sites, so a view reporting the same instruction twice does
/// not inflate a count.
fn distinct_sites(sites: impl IntoIterator<Item = CallSite>) -> usize {
    sites.into_iter().map(|c| c.site).collect::<BTreeSet<_>>().len()
}

fn callee_is_library(view: &dyn BinaryView, callee: Target) -> bool {
    view.function(callee).is_some_and(|f| f.is_library())
}

fn callee_is_internal(view: &dyn BinaryView, callee: Target) -> bool {
    view.function(callee).is_some_and(|f| !f.is_library())
}

/// Calls into library/imported code reveal what a function does.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiCallHeuristic;

impl ApiCallHeuristic {
    fn count(view: &dyn BinaryView, target: Target) -> usize {
        distinct_sites(
            view.calls_from(target)
                .into_iter()
                .filter(|c| callee_is_library(view, c.callee)),
        )
    }
}

impl Heuristic for ApiCallHeuristic {
    fn name(&self) -> &'static str {
        "APICall"
    }

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64 {
        Self::count(view, target) as f64 * 200.0
    }

    fn explain(&self, view: &dyn BinaryView, target: Target) -> Option<String> {
        match Self::count(view, target) {
            0 => None,
            n => Some(format!("{n}_api_calls")),
        }
    }
}

/// Widely-called functions are utilities; naming them early helps every caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerCountHeuristic;

impl CallerCountHeuristic {
    fn count(view: &dyn BinaryView, target: Target) -> usize {
        distinct_sites(view.calls_to(target))
    }
}

impl Heuristic for CallerCountHeuristic {
    fn name(&self) -> &'static str {
        "CallerCount"
    }

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64 {
        (Self::count(view, target) as f64 * 30.0).min(600.0)
    }

    fn explain(&self, view: &dyn BinaryView, target: Target) -> Option<String> {
        match Self::count(view, target) {
            0 => None,
            n => Some(format!("{n}_callers")),
        }
    }
}

/// Functions calling many unanalyzed internal functions are better done after
/// their callees.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalCalleeHeuristic;

impl InternalCalleeHeuristic {
    fn count(view: &dyn BinaryView, target: Target) -> usize {
        distinct_sites(
            view.calls_from(target)
                .into_iter()
                .filter(|c| callee_is_internal(view, c.callee)),
        )
    }
}

impl Heuristic for InternalCalleeHeuristic {
    fn name(&self) -> &'static str {
        "InternalCallee"
    }

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64 {
        -(Self::count(view, target) as f64) * 50.0
    }

    fn explain(&self, view: &dyn BinaryView, target: Target) -> Option<String> {
        match Self::count(view, target) {
            0 => None,
            n => Some(format!("{n}_internal_calls")),
        }
    }
}

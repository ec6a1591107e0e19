use std::collections::BTreeSet;

use super::Heuristic;
use crate::domain::Target;
use crate::ports::BinaryView;

const PER_STRING: f64 = 50.0;
const CAP: f64 = 500.0;

pub const DEFAULT_MIN_STRING_LENGTH: usize = 10;

/// Functions referencing many long strings are usually easy to name
/// (error messages, format strings, protocol keywords).
#[derive(Debug, Clone)]
pub struct StringHeavyHeuristic {
    min_length: usize,
}

impl StringHeavyHeuristic {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Distinct string literals at least `min_length` characters long.
    fn long_strings(&self, view: &dyn BinaryView, target: Target) -> usize {
        view.string_refs(target)
            .into_iter()
            .filter(|s| s.text.chars().count() >= self.min_length)
            .map(|s| s.address)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl Default for StringHeavyHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_STRING_LENGTH)
    }
}

impl Heuristic for StringHeavyHeuristic {
    fn name(&self) -> &'static str {
        "StringHeavy"
    }

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64 {
        (self.long_strings(view, target) as f64 * PER_STRING).min(CAP)
    }

    fn explain(&self, view: &dyn BinaryView, target: Target) -> Option<String> {
        match self.long_strings(view, target) {
            0 => None,
            n => Some(format!("{n}_long_strings")),
        }
    }
}

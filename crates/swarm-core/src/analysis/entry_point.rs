//! EntryPoint heuristic.
//!
//! Entry points sit at the top of the call graph. In bottom-up mode (default)
//! they are analyzed last so that their callees already carry good names and
//! types; top-down mode does the opposite.

use serde::{Deserialize, Serialize};

use super::Heuristic;
use crate::domain::Target;
use crate::ports::BinaryView;

/// Names treated as the program's main function.
const MAIN_NAMES: &[&str] = &[
    "main", "wmain", "_main", "_wmain", "WinMain", "wWinMain", "DllMain", "start", "_start",
];

const MAIN_SCORE: f64 = 1000.0;
const ENTRY_SCORE: f64 = 800.0;
const EXPORT_SCORE: f64 = 600.0;

/// Sign applied to entry point scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPointMode {
    /// Entry points last (negative score).
    #[default]
    BottomUp,

    /// Entry points first (positive score).
    TopDown,

    /// No adjustment.
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Main,
    Entry,
    Export,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPointHeuristic {
    mode: EntryPointMode,
}

impl EntryPointHeuristic {
    pub fn new(mode: EntryPointMode) -> Self {
        Self { mode }
    }

    fn classify(&self, view: &dyn BinaryView, target: Target) -> Option<EntryKind> {
        let is_main = view
            .function(target)
            .and_then(|f| f.name)
            .is_some_and(|name| MAIN_NAMES.contains(&name.as_str()));

        if is_main {
            Some(EntryKind::Main)
        } else if view.is_entry_point(target) {
            Some(EntryKind::Entry)
        } else if view.is_exported(target) {
            Some(EntryKind::Export)
        } else {
            None
        }
    }
}

impl Heuristic for EntryPointHeuristic {
    fn name(&self) -> &'static str {
        "EntryPoint"
    }

    fn score(&self, view: &dyn BinaryView, target: Target) -> f64 {
        let base = match self.classify(view, target) {
            Some(EntryKind::Main) => MAIN_SCORE,
            Some(EntryKind::Entry) => ENTRY_SCORE,
            Some(EntryKind::Export) => EXPORT_SCORE,
            None => return 0.0,
        };

        match self.mode {
            EntryPointMode::TopDown => base,
            EntryPointMode::BottomUp => -base,
            EntryPointMode::Neutral => 0.0,
        }
    }

    fn explain(&self, view: &dyn BinaryView, target: Target) -> Option<String> {
        let label = match self.classify(view, target)? {
            EntryKind::Main => "main_function",
            EntryKind::Entry => "entry_point",
            EntryKind::Export => "exported",
        };
        Some(label.to_string())
    }
}

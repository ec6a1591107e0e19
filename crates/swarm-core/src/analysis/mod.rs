//! Prioritization: heuristics and the prioritizer that combines them.
//!
//! Everything here is pure with respect to the `BinaryView`. Nothing is
//! cached, so a changed database is picked up by the next `prioritize` call.

pub mod calls;
pub mod entry_point;
pub mod heuristic;
pub mod prioritizer;
pub mod size;
pub mod strings;

pub use calls::{ApiCallHeuristic, CallerCountHeuristic, InternalCalleeHeuristic};
pub use entry_point::{EntryPointHeuristic, EntryPointMode};
pub use heuristic::Heuristic;
pub use prioritizer::{Prioritizer, WeightedHeuristic};
pub use size::FunctionSizeHeuristic;
pub use strings::{DEFAULT_MIN_STRING_LENGTH, StringHeavyHeuristic};

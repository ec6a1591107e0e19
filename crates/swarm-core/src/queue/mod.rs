//! Scheduler bookkeeping: the pending queue, retry counters and in-flight
//! assignments.
//!
//! These are plain single-owner structures. The scheduler owns one of each and
//! mutates them only inside its transitions.

mod assignment;
mod pending;
mod retry;

pub use assignment::{ActiveAssignments, AssignmentConflict};
pub use pending::JobQueue;
pub use retry::{RetryBook, RetryDecision, RetryPolicy, RetryState};

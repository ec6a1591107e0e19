//! Pending job queue.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use crate::domain::{Job, Target};

/// Heap entry.
///
/// Higher score first; equal scores dispatch in prioritized-list order
/// (lower rank first).
#[derive(Debug, Clone)]
struct QueuedJob(Job);

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .score()
            .total_cmp(&other.0.score())
            // Reverse: lower rank is the higher priority
            .then_with(|| other.0.rank().cmp(&self.0.rank()))
    }
}

/// Max-heap of pending jobs with at most one live entry per target.
#[derive(Debug, Default)]
pub struct JobQueue {
    heap: BinaryHeap<QueuedJob>,
    members: BTreeSet<Target>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `job`. Returns `false` (and drops the job) if its target is
    /// already queued.
    pub fn push(&mut self, job: Job) -> bool {
        if !self.members.insert(job.target()) {
            return false;
        }
        self.heap.push(QueuedJob(job));
        true
    }

    /// Remove and return the highest-priority job.
    pub fn pop(&mut self) -> Option<Job> {
        let QueuedJob(job) = self.heap.pop()?;
        self.members.remove(&job.target());
        Some(job)
    }

    pub fn contains(&self, target: Target) -> bool {
        self.members.contains(&target)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.members.clear();
    }
}

impl Extend<Job> for JobQueue {
    fn extend<I: IntoIterator<Item = Job>>(&mut self, iter: I) {
        for job in iter {
            self.push(job);
        }
    }
}

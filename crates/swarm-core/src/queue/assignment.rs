//! In-flight jobs, keyed by worker handle.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::{Job, Target, WorkerHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentConflict {
    #[error("handle {0} is already assigned")]
    DuplicateHandle(WorkerHandle),

    #[error("target {target} is already active under {handle}")]
    DuplicateTarget { target: Target, handle: WorkerHandle },
}

/// Handle -> job map with a reverse target index.
///
/// A target is never active under two handles, and a handle never carries two
/// targets.
#[derive(Debug, Default)]
pub struct ActiveAssignments {
    by_handle: BTreeMap<WorkerHandle, Job>,
    by_target: BTreeMap<Target, WorkerHandle>,
}

impl ActiveAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Would inserting `handle -> target` break the one-to-one mapping?
    pub fn check(&self, handle: &WorkerHandle, target: Target) -> Result<(), AssignmentConflict> {
        if self.by_handle.contains_key(handle) {
            return Err(AssignmentConflict::DuplicateHandle(handle.clone()));
        }
        if let Some(existing) = self.by_target.get(&target) {
            return Err(AssignmentConflict::DuplicateTarget {
                target,
                handle: existing.clone(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, handle: WorkerHandle, job: Job) -> Result<(), AssignmentConflict> {
        self.check(&handle, job.target())?;
        self.by_target.insert(job.target(), handle.clone());
        self.by_handle.insert(handle, job);
        Ok(())
    }

    pub fn remove(&mut self, handle: &WorkerHandle) -> Option<Job> {
        let job = self.by_handle.remove(handle)?;
        self.by_target.remove(&job.target());
        Some(job)
    }

    pub fn handle_for(&self, target: Target) -> Option<&WorkerHandle> {
        self.by_target.get(&target)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Handles in sorted order, detached from the map so callers can mutate
    /// while walking them.
    pub fn handles(&self) -> Vec<WorkerHandle> {
        self.by_handle.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<WorkerHandle, Target> {
        self.by_handle
            .iter()
            .map(|(h, job)| (h.clone(), job.target()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(addr: u64) -> Job {
        Job::new(Target::new(addr), 0.0, "test", Vec::new())
    }

    #[test]
    fn insert_and_remove_roundtrip() {
        let mut active = ActiveAssignments::new();
        active.insert(WorkerHandle::new("agent-1"), job(0x10)).unwrap();

        assert_eq!(active.len(), 1);
        assert_eq!(
            active.handle_for(Target::new(0x10)),
            Some(&WorkerHandle::new("agent-1"))
        );

        let removed = active.remove(&WorkerHandle::new("agent-1")).unwrap();
        assert_eq!(removed.target(), Target::new(0x10));
        assert!(active.is_empty());
        assert!(active.handle_for(Target::new(0x10)).is_none());
        assert!(active.remove(&WorkerHandle::new("agent-1")).is_none());
    }

    #[test]
    fn duplicate_handle_is_rejected() {
        let mut active = ActiveAssignments::new();
        active.insert(WorkerHandle::new("agent-1"), job(0x10)).unwrap();
        let err = active
            .insert(WorkerHandle::new("agent-1"), job(0x20))
            .unwrap_err();
        assert_eq!(err, AssignmentConflict::DuplicateHandle(WorkerHandle::new("agent-1")));
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let mut active = ActiveAssignments::new();
        active.insert(WorkerHandle::new("agent-1"), job(0x10)).unwrap();
        let err = active
            .insert(WorkerHandle::new("agent-2"), job(0x10))
            .unwrap_err();
        assert!(matches!(err, AssignmentConflict::DuplicateTarget { .. }));
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn snapshot_maps_handles_to_targets() {
        let mut active = ActiveAssignments::new();
        active.insert(WorkerHandle::new("agent-b"), job(0x20)).unwrap();
        active.insert(WorkerHandle::new("agent-a"), job(0x10)).unwrap();

        let snap = active.snapshot();
        let entries: Vec<_> = snap.iter().collect();
        assert_eq!(entries[0], (&WorkerHandle::new("agent-a"), &Target::new(0x10)));
        assert_eq!(entries[1], (&WorkerHandle::new("agent-b"), &Target::new(0x20)));
    }
}

//! SimulatedSwarm - プロセス内のエージェントランチャー代替
//!
//! # 実装
//! - `Dispatcher` と `LivenessCheck` の両方を実装する
//! - 実際には何も動かない。「エージェント」はただの記録で、結末は呼び出し側が
//!   `finish` / `kill` / `revive` で決める
//! - CLI は tokio タスクから、テストは直接操作する

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::domain::{DispatchError, Job, LivenessError, Target, WorkerHandle};
use crate::ports::{Dispatcher, HandleMinter, LivenessCheck, SequentialMinter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Running,

    /// 完了。結果はまだスケジューラへ向かっている途中かもしれない
    Finished,

    /// 何も言わずに消えた
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedAgent {
    pub handle: WorkerHandle,
    pub target: Target,
    pub status: AgentStatus,
}

#[derive(Debug, Default)]
struct SwarmState {
    agents: BTreeMap<WorkerHandle, SimulatedAgent>,
    latest: BTreeMap<Target, WorkerHandle>,
    dispatch_log: Vec<Target>,
    reject_next: usize,
    liveness_failures: bool,
}

pub struct SimulatedSwarm {
    minter: Box<dyn HandleMinter>,
    capacity: Option<usize>,
    state: Mutex<SwarmState>,
}

impl SimulatedSwarm {
    pub fn new(minter: impl HandleMinter + 'static) -> Self {
        Self {
            minter: Box::new(minter),
            capacity: None,
            state: Mutex::new(SwarmState::default()),
        }
    }

    /// `limit` 件動いている間は `CapacityExhausted` で拒否する
    pub fn with_capacity(mut self, limit: usize) -> Self {
        self.capacity = Some(limit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SwarmState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 次の `n` 回のディスパッチを拒否する
    pub fn reject_next(&self, n: usize) {
        self.lock().reject_next = n;
    }

    /// 解除するまで生存確認をすべて失敗させる
    pub fn fail_liveness_checks(&self, on: bool) {
        self.lock().liveness_failures = on;
    }

    fn set_status(&self, handle: &WorkerHandle, status: AgentStatus) -> Option<Target> {
        let mut state = self.lock();
        let agent = state.agents.get_mut(handle)?;
        agent.status = status;
        Some(agent.target)
    }

    /// エージェントが解析を終えた。ターゲットを返す
    pub fn finish(&self, handle: &WorkerHandle) -> Option<Target> {
        self.set_status(handle, AgentStatus::Finished)
    }

    /// エージェントが通知なしに死ぬ。ターゲットを返す
    pub fn kill(&self, handle: &WorkerHandle) -> Option<Target> {
        self.set_status(handle, AgentStatus::Dead)
    }

    pub fn revive(&self, handle: &WorkerHandle) -> Option<Target> {
        self.set_status(handle, AgentStatus::Running)
    }

    /// 動作中のエージェント（ハンドル順）
    pub fn running(&self) -> Vec<SimulatedAgent> {
        self.lock()
            .agents
            .values()
            .filter(|a| a.status == AgentStatus::Running)
            .cloned()
            .collect()
    }

    /// `target` に対して最後に発行したハンドル
    pub fn handle_for(&self, target: Target) -> Option<WorkerHandle> {
        self.lock().latest.get(&target).cloned()
    }

    /// ディスパッチに成功した順のターゲット
    pub fn dispatch_log(&self) -> Vec<Target> {
        self.lock().dispatch_log.clone()
    }
}

impl Default for SimulatedSwarm {
    fn default() -> Self {
        Self::new(SequentialMinter::new())
    }
}

impl Dispatcher for SimulatedSwarm {
    fn dispatch(&self, job: &Job) -> Result<WorkerHandle, DispatchError> {
        let mut state = self.lock();

        if state.reject_next > 0 {
            state.reject_next -= 1;
            return Err(DispatchError::Rejected("simulated launch failure".to_string()));
        }
        if let Some(limit) = self.capacity {
            let running = state
                .agents
                .values()
                .filter(|a| a.status == AgentStatus::Running)
                .count();
            if running >= limit {
                return Err(DispatchError::CapacityExhausted { limit });
            }
        }

        let handle = self.minter.mint();
        debug!(%handle, target = %job.target(), "simulated agent launched");
        state.agents.insert(
            handle.clone(),
            SimulatedAgent {
                handle: handle.clone(),
                target: job.target(),
                status: AgentStatus::Running,
            },
        );
        state.latest.insert(job.target(), handle.clone());
        state.dispatch_log.push(job.target());
        Ok(handle)
    }
}

impl LivenessCheck for SimulatedSwarm {
    /// 完了したエージェントは生存扱い（結果が配送中）
    fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, LivenessError> {
        let state = self.lock();
        if state.liveness_failures {
            return Err(LivenessError(format!("liveness check for {handle} timed out")));
        }
        Ok(state
            .agents
            .get(handle)
            .is_some_and(|a| a.status != AgentStatus::Dead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(addr: u64) -> Job {
        Job::new(Target::new(addr), 0.0, "test", Vec::new())
    }

    #[test]
    fn dispatch_mints_sequential_handles() {
        let swarm = SimulatedSwarm::default();
        let h1 = swarm.dispatch(&job(0x10)).unwrap();
        let h2 = swarm.dispatch(&job(0x20)).unwrap();

        assert_eq!(h1.as_str(), "agent-1");
        assert_eq!(h2.as_str(), "agent-2");
        assert_eq!(swarm.dispatch_log(), vec![Target::new(0x10), Target::new(0x20)]);
        assert_eq!(swarm.handle_for(Target::new(0x20)), Some(h2));
    }

    #[test]
    fn capacity_limit_counts_running_agents_only() {
        let swarm = SimulatedSwarm::default().with_capacity(1);
        let h1 = swarm.dispatch(&job(0x10)).unwrap();
        assert_eq!(
            swarm.dispatch(&job(0x20)),
            Err(DispatchError::CapacityExhausted { limit: 1 })
        );

        swarm.finish(&h1);
        assert!(swarm.dispatch(&job(0x20)).is_ok());
    }

    #[test]
    fn rejects_requested_number_of_dispatches() {
        let swarm = SimulatedSwarm::default();
        swarm.reject_next(2);
        assert!(matches!(swarm.dispatch(&job(0x10)), Err(DispatchError::Rejected(_))));
        assert!(matches!(swarm.dispatch(&job(0x10)), Err(DispatchError::Rejected(_))));
        assert!(swarm.dispatch(&job(0x10)).is_ok());
    }

    #[test]
    fn liveness_follows_agent_status() {
        let swarm = SimulatedSwarm::default();
        let h = swarm.dispatch(&job(0x10)).unwrap();
        assert_eq!(swarm.is_alive(&h), Ok(true));

        swarm.kill(&h);
        assert_eq!(swarm.is_alive(&h), Ok(false));

        swarm.revive(&h);
        swarm.finish(&h);
        assert_eq!(swarm.is_alive(&h), Ok(true));

        assert_eq!(swarm.is_alive(&WorkerHandle::new("agent-404")), Ok(false));
    }

    #[test]
    fn liveness_failures_are_errors() {
        let swarm = SimulatedSwarm::default();
        let h = swarm.dispatch(&job(0x10)).unwrap();
        swarm.fail_liveness_checks(true);
        assert!(swarm.is_alive(&h).is_err());
    }
}

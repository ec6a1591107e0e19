//! Scheduler - 同時実行数に上限のある状態機械
//!
//! 待ちキュー、実行中の割り当て、リトライ管理、進捗カウンタを所有します。
//!
//! # Thread Safety
//! 公開メソッドはそれぞれ1つの遷移です。呼び出しを交互に挟んではいけません。
//! 複数スレッドから通知が来る場合は `SchedulerService` か mutex で包みます。
//!
//! # 処理フロー
//! 1. `start` が列挙したターゲットを優先順位付けし、`max_concurrency` まで埋める
//! 2. 完了・クラッシュのたびに枠が空く。死んだワーカーをスイープし、補充し、
//!    実行が終わったかを確認する
//! 3. キューと割り当てが両方空になれば `completed` イベントで終了。
//!    `stop` の後は `stopped = true` で終了

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::status::{ProgressModel, ProgressSnapshot};
use crate::analysis::Prioritizer;
use crate::config::SwarmConfig;
use crate::domain::{
    FailureCause, FailureReason, Job, SchedulerError, SchedulerEvent, SchedulerState, Target,
    TargetState, WorkerHandle,
};
use crate::ports::{BinaryView, Clock, Dispatcher, EventSink, LivenessCheck, TargetEnumerator};
use crate::queue::{ActiveAssignments, JobQueue, RetryBook, RetryDecision, RetryPolicy};

/// 帳簿の不変条件違反。バグでしか起きない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error(
        "conservation broken: completed={completed} failed={failed} active={active} queued={queued} total={total}"
    )]
    Conservation {
        completed: usize,
        failed: usize,
        active: usize,
        queued: usize,
        total: usize,
    },

    #[error("target {target} is held in {places} places at once")]
    MultipleResidency { target: Target, places: usize },

    #[error("target {target} is neither pending, active, completed nor failed")]
    Vanished { target: Target },

    #[error("target {target} has {attempts} retries, budget is {max_retries}")]
    RetryBudgetExceeded {
        target: Target,
        attempts: u32,
        max_retries: u32,
    },

    #[error("{active} jobs in flight, limit is {limit}")]
    OverCapacity { active: usize, limit: usize },

    #[error("progress counters ({counted}) disagree with the {kind} set ({held})")]
    CounterMismatch {
        kind: &'static str,
        counted: usize,
        held: usize,
    },
}

pub struct Scheduler {
    config: SwarmConfig,
    view: Arc<dyn BinaryView>,
    enumerator: Arc<dyn TargetEnumerator>,
    dispatcher: Arc<dyn Dispatcher>,
    liveness: Arc<dyn LivenessCheck>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,

    state: SchedulerState,
    policy: RetryPolicy,
    targets: BTreeSet<Target>,
    queue: JobQueue,
    active: ActiveAssignments,
    retries: RetryBook,
    completed: BTreeSet<Target>,
    failed: BTreeSet<Target>,
    progress: ProgressModel,
}

impl Scheduler {
    /// ポートのワイヤリングには [`SchedulerBuilder`](super::SchedulerBuilder) も使える
    pub fn new(
        config: SwarmConfig,
        view: Arc<dyn BinaryView>,
        enumerator: Arc<dyn TargetEnumerator>,
        dispatcher: Arc<dyn Dispatcher>,
        liveness: Arc<dyn LivenessCheck>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = RetryPolicy::new(config.scheduler.max_retries);
        Self {
            config,
            view,
            enumerator,
            dispatcher,
            liveness,
            events,
            clock,
            state: SchedulerState::Idle,
            policy,
            targets: BTreeSet::new(),
            queue: JobQueue::new(),
            active: ActiveAssignments::new(),
            retries: RetryBook::new(),
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            progress: ProgressModel::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// 次の `start` で使う設定を差し替える
    pub fn reconfigure(&mut self, config: SwarmConfig) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.config = config;
        Ok(())
    }

    /// ターゲットを列挙して実行を開始する
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.config.validate()?;
        let targets = self.enumerator.enumerate();
        self.start_with(targets)
    }

    /// 明示したターゲットリストで実行を開始する
    ///
    /// 重複は除去する（最初の出現を残す）。空リストなら即座に
    /// `completed` イベント（`total = 0`）で終わる。
    pub fn start_with(&mut self, targets: Vec<Target>) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.config.validate()?;
        let prioritizer = Prioritizer::from_config(self.view.clone(), &self.config.heuristics)?;

        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(targets.len());
        for target in targets {
            if seen.insert(target) {
                unique.push(target);
            } else {
                warn!(%target, "duplicate target in input, keeping the first");
            }
        }

        let jobs = prioritizer.prioritize(&unique);

        self.policy = RetryPolicy::new(self.config.scheduler.max_retries);
        self.targets = seen;
        self.queue.clear();
        self.active = ActiveAssignments::new();
        self.retries.clear();
        self.completed.clear();
        self.failed.clear();

        let now = self.clock.now();
        self.progress.reset(jobs.len(), now);
        for job in jobs {
            self.retries.seed(job.target());
            self.queue.push(job);
        }

        let total = self.targets.len();
        if total == 0 {
            info!("no targets to analyze");
            self.finish_run(false);
            return Ok(());
        }

        self.state = SchedulerState::Running;
        info!(
            total,
            max_concurrency = self.config.scheduler.max_concurrency,
            max_retries = self.policy.max_retries,
            "analysis started"
        );
        self.events.emit(SchedulerEvent::Started { total });

        self.pump();
        self.check_invariants();
        Ok(())
    }

    /// ワーカーが成功を報告した
    ///
    /// 通知を無視した場合（未知または処理済みのハンドル、実行中でない）は `false`。
    pub fn on_job_completed(&mut self, handle: &WorkerHandle) -> bool {
        if !self.is_running() {
            debug!(%handle, "completion outside a run ignored");
            return false;
        }
        let Some(job) = self.active.remove(handle) else {
            warn!(%handle, "completion for unknown handle ignored");
            return false;
        };

        let target = job.target();
        self.retries.discard(target);
        self.completed.insert(target);
        self.progress.record_completed(target);
        info!(
            %handle,
            %target,
            completed = self.progress.completed(),
            total = self.progress.total(),
            "analysis completed"
        );
        self.emit_progress(Some(target));

        self.pump();
        self.check_invariants();
        true
    }

    /// ワーカーがクラッシュを報告した。ガードは [`Scheduler::on_job_completed`] と同じ
    pub fn on_job_crashed(&mut self, handle: &WorkerHandle) -> bool {
        if !self.is_running() {
            debug!(%handle, "crash outside a run ignored");
            return false;
        }
        let Some(job) = self.active.remove(handle) else {
            warn!(%handle, "crash for unknown handle ignored");
            return false;
        };

        warn!(%handle, target = %job.target(), "agent crashed");
        self.settle_failure(job, Some(handle.clone()), FailureCause::Crashed);

        self.pump();
        self.check_invariants();
        true
    }

    /// 実行中の全ワーカーの生存を確認し、死んだものを回収して空き枠を補充する
    ///
    /// 戻り値は回収したハンドル数。いつ呼んでもよい（回収したハンドルは
    /// 割り当てから外れるので、後の確認やクラッシュ報告は何もしない）。
    /// 実行中が無い状態でディスパッチに失敗した後は、これがディスパッチを再開する。
    pub fn health_sweep(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }
        let reclaimed = self.reclaim_dead_workers();
        self.fill_capacity();
        self.finish_if_drained();
        self.check_invariants();
        reclaimed
    }

    /// ディスパッチを止める
    ///
    /// 実行中のワーカーは動き続けるが、以後の通知は無視する。
    /// 実行中でなければ `false`。
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        let dropped = self.queue.len();
        self.queue.clear();
        self.retries.clear();
        info!(
            dropped,
            in_flight = self.active.len(),
            "analysis stopped, in-flight agents left to finish"
        );
        self.finish_run(true);
        true
    }

    /// 現在の進捗。ブロックしない
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress
            .snapshot(self.clock.now(), self.active.snapshot())
    }

    /// 現在（または直前）の実行における `target` の状態
    ///
    /// 実行に含まれないターゲットと `stop` で捨てたターゲットは `None`。
    pub fn target_state(&self, target: Target) -> Option<TargetState> {
        if self.completed.contains(&target) {
            Some(TargetState::Completed)
        } else if self.failed.contains(&target) {
            Some(TargetState::PermanentlyFailed)
        } else if self.active.handle_for(target).is_some() {
            Some(TargetState::Active)
        } else if self.queue.contains(target) {
            Some(TargetState::Pending)
        } else {
            None
        }
    }

    /// まだ処理中のターゲットが使ったリトライ回数
    pub fn retry_attempts(&self, target: Target) -> u32 {
        self.retries.attempts(target)
    }

    /// 帳簿の不変条件を検査する
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        if self.progress.completed() != self.completed.len() {
            return Err(InvariantViolation::CounterMismatch {
                kind: "completed",
                counted: self.progress.completed(),
                held: self.completed.len(),
            });
        }
        if self.progress.failed() != self.failed.len() {
            return Err(InvariantViolation::CounterMismatch {
                kind: "failed",
                counted: self.progress.failed(),
                held: self.failed.len(),
            });
        }

        let limit = self.config.scheduler.max_concurrency;
        if self.is_running() && self.active.len() > limit {
            return Err(InvariantViolation::OverCapacity {
                active: self.active.len(),
                limit,
            });
        }

        if let Some((target, state)) = self
            .retries
            .iter()
            .find(|(_, s)| s.attempts > self.policy.max_retries)
        {
            return Err(InvariantViolation::RetryBudgetExceeded {
                target,
                attempts: state.attempts,
                max_retries: self.policy.max_retries,
            });
        }

        for &target in &self.targets {
            let places = [
                self.queue.contains(target),
                self.active.handle_for(target).is_some(),
                self.completed.contains(&target),
                self.failed.contains(&target),
            ]
            .into_iter()
            .filter(|held| *held)
            .count();

            if places > 1 {
                return Err(InvariantViolation::MultipleResidency { target, places });
            }
            if places == 0 && self.is_running() {
                return Err(InvariantViolation::Vanished { target });
            }
        }

        if self.is_running() {
            let (completed, failed, active, queued) = (
                self.completed.len(),
                self.failed.len(),
                self.active.len(),
                self.queue.len(),
            );
            let total = self.progress.total();
            if completed + failed + active + queued != total {
                return Err(InvariantViolation::Conservation {
                    completed,
                    failed,
                    active,
                    queued,
                    total,
                });
            }
        }
        Ok(())
    }

    fn check_invariants(&self) {
        if cfg!(debug_assertions)
            && let Err(violation) = self.verify()
        {
            error!(%violation, "scheduler invariant violated");
        }
    }

    /// スイープ、補充、残りが無ければ実行を終える
    fn pump(&mut self) {
        if !self.is_running() {
            return;
        }
        self.reclaim_dead_workers();
        self.fill_capacity();
        self.finish_if_drained();
    }

    fn reclaim_dead_workers(&mut self) -> usize {
        let mut reclaimed = 0;
        for handle in self.active.handles() {
            match self.liveness.is_alive(&handle) {
                Ok(true) => {}
                Ok(false) => {
                    if let Some(job) = self.active.remove(&handle) {
                        warn!(%handle, target = %job.target(), "agent unresponsive, reclaiming");
                        self.settle_failure(job, Some(handle), FailureCause::Unresponsive);
                        reclaimed += 1;
                    }
                }
                Err(e) => {
                    // Inconclusive; checked again on the next sweep.
                    warn!(%handle, error = %e, "liveness check failed");
                }
            }
        }
        reclaimed
    }

    fn fill_capacity(&mut self) {
        let limit = self.config.scheduler.max_concurrency;
        while self.is_running() && self.active.len() < limit {
            let Some(job) = self.queue.pop() else {
                break;
            };
            let target = job.target();

            let handle = match self.dispatcher.dispatch(&job) {
                Ok(handle) => handle,
                Err(e) => {
                    // The round ends here; the next notification or sweep refills.
                    warn!(%target, error = %e, "dispatch failed");
                    self.settle_failure(job, None, FailureCause::DispatchFailed);
                    break;
                }
            };

            if let Err(conflict) = self.active.check(&handle, target) {
                error!(%handle, %target, %conflict, "dispatcher returned a conflicting handle");
                self.settle_failure(job, None, FailureCause::DispatchFailed);
                break;
            }

            debug!(
                %handle,
                %target,
                score = job.score(),
                reason = job.reason(),
                "dispatched"
            );
            if let Err(conflict) = self.active.insert(handle, job) {
                // check() above rules this out
                error!(%conflict, "assignment insert failed after check");
                continue;
            }
            self.emit_progress(None);
        }
    }

    /// 終わらなかった Job をリトライか失敗に振り分ける
    ///
    /// 呼び出し前に Job を割り当てから外しておくこと。
    fn settle_failure(&mut self, job: Job, handle: Option<WorkerHandle>, cause: FailureCause) {
        let target = job.target();
        if !self.retries.contains(target) {
            warn!(%target, "no retry state for dispatched target, starting from zero");
        }

        match self.retries.record_crash(target, self.policy) {
            RetryDecision::Retry { attempt } => {
                warn!(
                    %target,
                    attempt,
                    max_retries = self.policy.max_retries,
                    ?cause,
                    "retrying target"
                );
                self.queue.push(job);
                self.events.emit(SchedulerEvent::Retry {
                    target,
                    handle,
                    attempt,
                    max_retries: self.policy.max_retries,
                    cause,
                });
            }
            RetryDecision::Exhausted { attempts } => {
                error!(%target, attempts, ?cause, "target failed permanently");
                self.failed.insert(target);
                self.progress.record_failed();
                self.events.emit(SchedulerEvent::Failure {
                    target,
                    reason: FailureReason::MaxRetriesExceeded,
                    attempts,
                });
            }
        }
        self.emit_progress(None);
    }

    fn finish_if_drained(&mut self) {
        if self.is_running() && self.queue.is_empty() && self.active.is_empty() {
            self.finish_run(false);
        }
    }

    fn finish_run(&mut self, stopped: bool) {
        self.state = SchedulerState::Idle;
        self.progress.finish(self.clock.now(), stopped);

        let snapshot = self.progress();
        if !stopped {
            info!(
                completed = snapshot.completed,
                failed = snapshot.failed,
                total = snapshot.total,
                elapsed_seconds = snapshot.elapsed_seconds,
                "analysis finished"
            );
        }
        self.events.emit(SchedulerEvent::Completed {
            total: snapshot.total,
            completed: snapshot.completed,
            failed: snapshot.failed,
            elapsed_seconds: snapshot.elapsed_seconds,
            stopped,
        });
    }

    fn emit_progress(&self, completed_target: Option<Target>) {
        let active = self.active.len();
        self.events.emit(SchedulerEvent::Progress {
            total: self.progress.total(),
            completed: self.progress.completed(),
            failed: self.progress.failed(),
            active,
            pending: self.progress.pending(active),
            percent_complete: self.progress.percent_complete(),
            active_assignments: self.active.snapshot(),
            completed_target,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SchedulerBuilder;
    use crate::config::SchedulerConfig;
    use crate::domain::{ConfigError, FunctionInfo};
    use crate::impls::{InMemoryBinary, RecordingEventSink, SimulatedSwarm};
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Distinct size buckets give distinct scores:
    // 0x3000 > 0x2000 > 0x5000 > 0x4000 > 0x1000
    const HUGE: Target = Target::new(0x1000);
    const SMALL: Target = Target::new(0x2000);
    const TINY: Target = Target::new(0x3000);
    const LARGE: Target = Target::new(0x4000);
    const MEDIUM: Target = Target::new(0x5000);

    fn five_functions() -> InMemoryBinary {
        InMemoryBinary::new()
            .with_function(FunctionInfo::new(0x1000, 9_000))
            .with_function(FunctionInfo::new(0x2000, 200))
            .with_function(FunctionInfo::new(0x3000, 50))
            .with_function(FunctionInfo::new(0x4000, 2_000))
            .with_function(FunctionInfo::new(0x5000, 700))
    }

    struct Fixture {
        scheduler: Scheduler,
        swarm: Arc<SimulatedSwarm>,
        events: Arc<RecordingEventSink>,
        clock: Arc<FixedClock>,
    }

    fn fixture_with(binary: InMemoryBinary, max_concurrency: usize, max_retries: u32) -> Fixture {
        let config = SwarmConfig {
            scheduler: SchedulerConfig {
                max_concurrency,
                max_retries,
                ..Default::default()
            },
            ..Default::default()
        };
        let swarm = Arc::new(SimulatedSwarm::default());
        let events = Arc::new(RecordingEventSink::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let scheduler = SchedulerBuilder::new(config)
            .binary(Arc::new(binary))
            .workers(swarm.clone())
            .events(events.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Fixture {
            scheduler,
            swarm,
            events,
            clock,
        }
    }

    fn fixture(max_concurrency: usize, max_retries: u32) -> Fixture {
        fixture_with(five_functions(), max_concurrency, max_retries)
    }

    fn h(s: &str) -> WorkerHandle {
        WorkerHandle::new(s)
    }

    #[test]
    fn start_dispatches_top_jobs_up_to_concurrency() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        assert_eq!(f.scheduler.state(), SchedulerState::Running);
        assert_eq!(f.swarm.dispatch_log(), vec![TINY, SMALL]);
        assert_eq!(f.scheduler.target_state(TINY), Some(TargetState::Active));
        assert_eq!(f.scheduler.target_state(MEDIUM), Some(TargetState::Pending));

        let progress = f.scheduler.progress();
        assert_eq!((progress.total, progress.active, progress.pending), (5, 2, 3));
        assert_eq!(f.events.of_kind("started"), vec![SchedulerEvent::Started { total: 5 }]);
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn completion_dispatches_next_highest_and_respects_limit() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        assert!(f.scheduler.on_job_completed(&h("agent-1")));
        assert_eq!(f.swarm.dispatch_log(), vec![TINY, SMALL, MEDIUM]);
        assert_eq!(f.scheduler.target_state(TINY), Some(TargetState::Completed));

        for event in f.events.of_kind("progress") {
            if let SchedulerEvent::Progress { active, .. } = event {
                assert!(active <= 2);
            }
        }
        let completed_progress = f.events.events().into_iter().find(|e| {
            matches!(e, SchedulerEvent::Progress { completed_target: Some(t), .. } if *t == TINY)
        });
        assert!(completed_progress.is_some());
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn full_run_completes_in_priority_order() {
        let mut f = fixture(1, 3);
        f.scheduler.start().unwrap();

        for n in 1..=5 {
            f.clock.advance(Duration::seconds(10));
            assert!(f.scheduler.on_job_completed(&h(&format!("agent-{n}"))));
            f.scheduler.verify().unwrap();
        }

        assert_eq!(f.swarm.dispatch_log(), vec![TINY, SMALL, MEDIUM, LARGE, HUGE]);
        assert_eq!(f.scheduler.state(), SchedulerState::Idle);

        let done = f.events.of_kind("completed");
        assert_eq!(
            done,
            vec![SchedulerEvent::Completed {
                total: 5,
                completed: 5,
                failed: 0,
                elapsed_seconds: 50.0,
                stopped: false,
            }]
        );
        let progress = f.scheduler.progress();
        assert_eq!(progress.percent_complete, 100.0);
        assert_eq!(progress.completed_targets, vec![TINY, SMALL, MEDIUM, LARGE, HUGE]);
    }

    #[test]
    fn crashing_target_is_retried_then_fails_permanently() {
        let binary = InMemoryBinary::new().with_function(FunctionInfo::new(0x7000, 64));
        let x = Target::new(0x7000);
        let mut f = fixture_with(binary, 1, 3);
        f.scheduler.start().unwrap();

        for n in 1..=3 {
            assert!(f.scheduler.on_job_crashed(&h(&format!("agent-{n}"))));
            assert_eq!(f.scheduler.retry_attempts(x), n);
            assert_eq!(f.scheduler.target_state(x), Some(TargetState::Active));
        }
        assert!(f.scheduler.on_job_crashed(&h("agent-4")));

        assert_eq!(f.scheduler.target_state(x), Some(TargetState::PermanentlyFailed));
        assert_eq!(f.scheduler.progress().failed, 1);
        assert_eq!(f.swarm.dispatch_log().len(), 4);
        assert_eq!(f.events.of_kind("retry").len(), 3);
        assert_eq!(
            f.events.of_kind("failure"),
            vec![SchedulerEvent::Failure {
                target: x,
                reason: FailureReason::MaxRetriesExceeded,
                attempts: 3,
            }]
        );
        assert_eq!(f.scheduler.state(), SchedulerState::Idle);
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn retry_keeps_original_job() {
        let mut f = fixture(1, 3);
        f.scheduler.start().unwrap();

        f.scheduler.on_job_crashed(&h("agent-1"));
        // Highest score again, so it is redispatched straight away.
        assert_eq!(f.swarm.dispatch_log(), vec![TINY, TINY]);
        match &f.events.of_kind("retry")[0] {
            SchedulerEvent::Retry {
                target,
                handle,
                attempt,
                max_retries,
                cause,
            } => {
                assert_eq!(*target, TINY);
                assert_eq!(handle.as_ref(), Some(&h("agent-1")));
                assert_eq!((*attempt, *max_retries), (1, 3));
                assert_eq!(*cause, FailureCause::Crashed);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn health_sweep_reclaims_silently_dead_worker_once() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        f.swarm.kill(&h("agent-1"));
        assert_eq!(f.scheduler.health_sweep(), 1);
        assert_eq!(f.scheduler.retry_attempts(TINY), 1);
        assert_eq!(f.swarm.handle_for(TINY), Some(h("agent-3")));

        // Late crash report for the reclaimed handle changes nothing.
        assert!(!f.scheduler.on_job_crashed(&h("agent-1")));
        assert_eq!(f.scheduler.health_sweep(), 0);
        assert_eq!(f.scheduler.retry_attempts(TINY), 1);
        assert_eq!(f.events.of_kind("retry").len(), 1);

        match &f.events.of_kind("retry")[0] {
            SchedulerEvent::Retry { cause, .. } => assert_eq!(*cause, FailureCause::Unresponsive),
            other => panic!("unexpected event {other:?}"),
        }
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn notifications_also_trigger_sweep() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        f.swarm.kill(&h("agent-2"));
        f.scheduler.on_job_completed(&h("agent-1"));

        assert_eq!(f.scheduler.retry_attempts(SMALL), 1);
        assert_eq!(f.scheduler.target_state(SMALL), Some(TargetState::Active));
        assert_eq!(f.scheduler.progress().active, 2);
    }

    #[test]
    fn failed_liveness_check_is_inconclusive() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        f.swarm.kill(&h("agent-1"));
        f.swarm.fail_liveness_checks(true);
        assert_eq!(f.scheduler.health_sweep(), 0);
        assert_eq!(f.scheduler.target_state(TINY), Some(TargetState::Active));

        f.swarm.fail_liveness_checks(false);
        assert_eq!(f.scheduler.health_sweep(), 1);
    }

    #[test]
    fn duplicate_completion_counts_once() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        assert!(f.scheduler.on_job_completed(&h("agent-1")));
        assert!(!f.scheduler.on_job_completed(&h("agent-1")));
        assert!(!f.scheduler.on_job_crashed(&h("agent-1")));
        assert_eq!(f.scheduler.progress().completed, 1);
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn unknown_handle_is_ignored() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();
        let before = f.events.events().len();

        assert!(!f.scheduler.on_job_completed(&h("agent-999")));
        assert!(!f.scheduler.on_job_crashed(&h("agent-999")));
        assert_eq!(f.events.events().len(), before);
    }

    #[test]
    fn empty_input_completes_immediately() {
        let mut f = fixture_with(InMemoryBinary::new(), 2, 3);
        f.scheduler.start().unwrap();

        assert_eq!(f.scheduler.state(), SchedulerState::Idle);
        assert!(f.swarm.dispatch_log().is_empty());
        assert_eq!(
            f.events.events(),
            vec![SchedulerEvent::Completed {
                total: 0,
                completed: 0,
                failed: 0,
                elapsed_seconds: 0.0,
                stopped: false,
            }]
        );
        assert_eq!(f.scheduler.progress().percent_complete, 0.0);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();
        assert!(matches!(f.scheduler.start(), Err(SchedulerError::AlreadyRunning)));
        assert!(matches!(
            f.scheduler.start_with(vec![TINY]),
            Err(SchedulerError::AlreadyRunning)
        ));
        assert_eq!(f.swarm.dispatch_log().len(), 2);
    }

    #[test]
    fn invalid_config_leaves_scheduler_idle() {
        let mut f = fixture(0, 3);
        let err = f.scheduler.start().unwrap_err();

        assert!(matches!(err, SchedulerError::Config(ConfigError::ZeroConcurrency)));
        assert_eq!(f.scheduler.state(), SchedulerState::Idle);
        assert!(f.events.events().is_empty());
    }

    #[test]
    fn reconfigure_applies_to_next_run() {
        let mut f = fixture(0, 3);
        assert!(f.scheduler.start().is_err());

        let mut config = f.scheduler.config().clone();
        config.scheduler.max_concurrency = 3;
        f.scheduler.reconfigure(config).unwrap();
        f.scheduler.start().unwrap();

        assert_eq!(f.scheduler.progress().active, 3);
        assert!(matches!(
            f.scheduler.reconfigure(SwarmConfig::default()),
            Err(SchedulerError::AlreadyRunning)
        ));
    }

    #[test]
    fn stop_ignores_late_notifications() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();

        assert!(f.scheduler.stop());
        assert_eq!(f.scheduler.state(), SchedulerState::Idle);
        assert_eq!(
            f.events.of_kind("completed"),
            vec![SchedulerEvent::Completed {
                total: 5,
                completed: 0,
                failed: 0,
                elapsed_seconds: 0.0,
                stopped: true,
            }]
        );

        assert!(!f.scheduler.on_job_completed(&h("agent-1")));
        assert!(!f.scheduler.on_job_crashed(&h("agent-2")));
        assert_eq!(f.scheduler.health_sweep(), 0);
        assert_eq!(f.swarm.dispatch_log().len(), 2);
        assert_eq!(f.scheduler.progress().completed, 0);
        assert!(f.scheduler.progress().stopped);
        assert_eq!(f.scheduler.target_state(MEDIUM), None);
        assert!(!f.scheduler.stop());
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn restart_after_stop_resets_run() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();
        f.scheduler.on_job_completed(&h("agent-1"));
        f.scheduler.stop();

        f.scheduler.start().unwrap();
        let progress = f.scheduler.progress();
        assert_eq!((progress.total, progress.completed, progress.active), (5, 0, 2));
        assert!(progress.running);
        assert!(!f.scheduler.on_job_completed(&h("agent-2")));
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn duplicate_input_targets_are_dropped() {
        let mut f = fixture(5, 3);
        f.scheduler.start_with(vec![TINY, SMALL, TINY]).unwrap();
        assert_eq!(f.scheduler.progress().total, 2);
        assert_eq!(f.swarm.dispatch_log(), vec![TINY, SMALL]);
    }

    #[test]
    fn dispatch_failure_consumes_a_retry() {
        let mut f = fixture(1, 3);
        f.swarm.reject_next(1);
        f.scheduler.start().unwrap();

        assert!(f.swarm.dispatch_log().is_empty());
        assert_eq!(f.scheduler.retry_attempts(TINY), 1);
        assert_eq!(f.scheduler.target_state(TINY), Some(TargetState::Pending));
        assert!(f.scheduler.is_running());

        f.scheduler.health_sweep();
        assert_eq!(f.swarm.dispatch_log(), vec![TINY]);
        match &f.events.of_kind("retry")[0] {
            SchedulerEvent::Retry { handle, cause, .. } => {
                assert!(handle.is_none());
                assert_eq!(*cause, FailureCause::DispatchFailed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn failing_dispatcher_still_terminates() {
        let mut f = fixture(2, 2);
        f.swarm.reject_next(usize::MAX);
        f.scheduler.start().unwrap();

        // One failed dispatch per round.
        assert_eq!(f.events.of_kind("retry").len(), 1);
        let mut sweeps = 0;
        while f.scheduler.is_running() {
            sweeps += 1;
            assert!(sweeps <= 100, "run did not terminate");
            f.scheduler.health_sweep();
            f.scheduler.verify().unwrap();
        }

        assert_eq!(sweeps, 14);
        assert_eq!(f.scheduler.state(), SchedulerState::Idle);
        assert_eq!(f.scheduler.progress().failed, 5);
        assert_eq!(f.events.of_kind("failure").len(), 5);
        assert_eq!(f.events.of_kind("retry").len(), 10);
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn restart_while_old_agents_hold_capacity_waits_instead_of_failing() {
        let mut f = fixture(1, 3);
        let swarm = Arc::new(SimulatedSwarm::default().with_capacity(1));
        f.scheduler = SchedulerBuilder::new(f.scheduler.config().clone())
            .binary(Arc::new(five_functions()))
            .workers(swarm.clone())
            .events(f.events.clone())
            .build()
            .unwrap();

        f.scheduler.start().unwrap();
        assert!(f.scheduler.stop());
        // agent-1 from the stopped run still holds the only slot.
        f.scheduler.start().unwrap();

        let progress = f.scheduler.progress();
        assert!(progress.running);
        assert_eq!((progress.failed, progress.active, progress.pending), (0, 0, 5));
        assert_eq!(f.scheduler.retry_attempts(TINY), 1);
        assert!(f.events.of_kind("failure").is_empty());
        f.scheduler.verify().unwrap();

        swarm.finish(&h("agent-1"));
        assert!(!f.scheduler.on_job_completed(&h("agent-1")));
        f.scheduler.health_sweep();

        assert_eq!(swarm.dispatch_log(), vec![TINY, TINY]);
        assert_eq!(f.scheduler.target_state(TINY), Some(TargetState::Active));
        assert_eq!(f.scheduler.progress().failed, 0);
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn dispatch_failure_with_work_in_flight_waits_for_next_event() {
        let mut f = fixture(2, 3);
        let swarm = Arc::new(SimulatedSwarm::default().with_capacity(1));
        f.scheduler = SchedulerBuilder::new(f.scheduler.config().clone())
            .binary(Arc::new(five_functions()))
            .workers(swarm.clone())
            .events(f.events.clone())
            .build()
            .unwrap();
        f.scheduler.start().unwrap();

        // One slot taken, the second dispatch hit the capacity limit.
        assert_eq!(swarm.dispatch_log(), vec![TINY]);
        assert_eq!(f.scheduler.retry_attempts(SMALL), 1);
        assert_eq!(f.scheduler.target_state(SMALL), Some(TargetState::Pending));

        swarm.finish(&h("agent-1"));
        f.scheduler.on_job_completed(&h("agent-1"));
        assert_eq!(swarm.dispatch_log(), vec![TINY, SMALL]);
        f.scheduler.verify().unwrap();
    }

    #[test]
    fn progress_events_match_the_snapshot() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();
        f.scheduler.on_job_completed(&h("agent-1"));
        f.scheduler.on_job_crashed(&h("agent-2"));

        let snap = f.scheduler.progress();
        match f.events.of_kind("progress").pop() {
            Some(SchedulerEvent::Progress {
                total,
                completed,
                failed,
                active,
                pending,
                percent_complete,
                active_assignments,
                ..
            }) => {
                assert_eq!(
                    (total, completed, failed, active, pending),
                    (snap.total, snap.completed, snap.failed, snap.active, snap.pending)
                );
                assert_eq!(percent_complete, snap.percent_complete);
                assert_eq!(active_assignments, snap.active_assignments);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn progress_reports_rate_after_first_completion() {
        let mut f = fixture(2, 3);
        f.scheduler.start().unwrap();
        assert_eq!(f.scheduler.progress().rate_per_minute, -1.0);

        f.clock.advance(Duration::seconds(30));
        f.scheduler.on_job_completed(&h("agent-1"));
        let progress = f.scheduler.progress();
        assert_eq!(progress.rate_per_minute, 2.0);
        // 2 pending at one every 30 seconds
        assert_eq!(progress.estimated_remaining_seconds, 60.0);
    }

    #[test]
    fn random_event_sequences_keep_invariants() {
        for seed in 0..8u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut binary = InMemoryBinary::new();
            for i in 0..20u64 {
                let size = rng.gen_range(1..8_000);
                binary = binary.with_function(FunctionInfo::new(0x1000 + i * 0x100, size));
            }
            let mut f = fixture_with(binary, 3, 2);
            f.scheduler.start().unwrap();

            let mut seen: Vec<WorkerHandle> = Vec::new();
            let mut steps = 0;
            while f.scheduler.is_running() {
                steps += 1;
                assert!(steps < 10_000, "seed {seed}: run did not terminate");

                let active: Vec<WorkerHandle> =
                    f.scheduler.progress().active_assignments.into_keys().collect();
                seen.extend(active.iter().cloned());
                let pick =
                    |rng: &mut StdRng, v: &[WorkerHandle]| v[rng.gen_range(0..v.len())].clone();

                match rng.gen_range(0..6) {
                    0 | 1 if !active.is_empty() => {
                        f.scheduler.on_job_completed(&pick(&mut rng, &active));
                    }
                    2 if !active.is_empty() => {
                        f.scheduler.on_job_crashed(&pick(&mut rng, &active));
                    }
                    3 if !active.is_empty() => {
                        f.swarm.kill(&pick(&mut rng, &active));
                        f.scheduler.health_sweep();
                    }
                    4 if !seen.is_empty() => {
                        let stale = pick(&mut rng, &seen);
                        if rng.gen_bool(0.5) {
                            f.scheduler.on_job_completed(&stale);
                        } else {
                            f.scheduler.on_job_crashed(&stale);
                        }
                    }
                    _ => {
                        f.scheduler.health_sweep();
                    }
                }

                if let Err(v) = f.scheduler.verify() {
                    panic!("seed {seed}, step {steps}: {v}");
                }
                let p = f.scheduler.progress();
                assert_eq!(p.completed + p.failed + p.active + p.pending, p.total);
                assert!(p.active <= 3);
            }

            let p = f.scheduler.progress();
            assert_eq!(p.completed + p.failed, 20, "seed {seed}");
        }
    }
}

//! SchedulerBuilder - ポートのワイヤリングと `Scheduler` の構築
//!
//! # Fail-fast 設計
//! - 必須ポートが欠けていれば `build()` がエラーを返す
//! - 設定の検証はここでは行わない（`Scheduler::start` が検証する）

use std::sync::Arc;

use super::Scheduler;
use crate::config::SwarmConfig;
use crate::ports::{
    BinaryView, Clock, Dispatcher, EventSink, LivenessCheck, NoopEventSink, SystemClock,
    TargetEnumerator,
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing port: {0}. Set it on the builder before build().")]
    MissingPort(&'static str),
}

/// [`Scheduler`] を構築する
///
/// # 使用例
/// ```ignore
/// let binary = Arc::new(InMemoryBinary::from(image));
/// let swarm = Arc::new(SimulatedSwarm::default());
/// let scheduler = SchedulerBuilder::new(config)
///     .binary(binary)
///     .workers(swarm)
///     .events(Arc::new(BroadcastEventSink::default()))
///     .build()?;
/// ```
///
/// イベントの既定は [`NoopEventSink`]、時刻の既定は [`SystemClock`]。
pub struct SchedulerBuilder {
    config: SwarmConfig,
    view: Option<Arc<dyn BinaryView>>,
    enumerator: Option<Arc<dyn TargetEnumerator>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    liveness: Option<Arc<dyn LivenessCheck>>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl SchedulerBuilder {
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            config,
            view: None,
            enumerator: None,
            dispatcher: None,
            liveness: None,
            events: Arc::new(NoopEventSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// スコア計算と列挙の両方に使うデータベース
    pub fn binary<B>(self, binary: Arc<B>) -> Self
    where
        B: BinaryView + TargetEnumerator + 'static,
    {
        let view: Arc<dyn BinaryView> = binary.clone();
        self.view(view).enumerator(binary)
    }

    pub fn view(mut self, view: Arc<dyn BinaryView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn enumerator(mut self, enumerator: Arc<dyn TargetEnumerator>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// 生存確認にも答えるランチャー
    pub fn workers<W>(self, workers: Arc<W>) -> Self
    where
        W: Dispatcher + LivenessCheck + 'static,
    {
        let dispatcher: Arc<dyn Dispatcher> = workers.clone();
        self.dispatcher(dispatcher).liveness(workers)
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn liveness(mut self, liveness: Arc<dyn LivenessCheck>) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Scheduler, BuildError> {
        Ok(Scheduler::new(
            self.config,
            self.view.ok_or(BuildError::MissingPort("binary view"))?,
            self.enumerator
                .ok_or(BuildError::MissingPort("target enumerator"))?,
            self.dispatcher.ok_or(BuildError::MissingPort("dispatcher"))?,
            self.liveness.ok_or(BuildError::MissingPort("liveness check"))?,
            self.events,
            self.clock,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchedulerState;
    use crate::impls::{InMemoryBinary, SimulatedSwarm};

    #[test]
    fn builds_with_all_ports() {
        let scheduler = SchedulerBuilder::new(SwarmConfig::default())
            .binary(Arc::new(InMemoryBinary::new()))
            .workers(Arc::new(SimulatedSwarm::default()))
            .build()
            .unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn missing_dispatcher_fails_fast() {
        let result = SchedulerBuilder::new(SwarmConfig::default())
            .binary(Arc::new(InMemoryBinary::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingPort("dispatcher"))));
    }

    #[test]
    fn missing_view_fails_fast() {
        let result = SchedulerBuilder::new(SwarmConfig::default())
            .workers(Arc::new(SimulatedSwarm::default()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingPort("binary view"))));
    }
}

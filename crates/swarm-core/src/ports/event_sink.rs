//! EventSink port - スケジューライベントの送出先
//!
//! # 契約
//! - `emit` はブロックしない、呼び出し側を失敗させない
//! - 購読者ゼロは正常（`NoopEventSink`）
//!
//! チャネル版・記録版の実装は `impls::sinks` にあります。

use crate::domain::SchedulerEvent;

/// スケジューライベントを受け取る
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

/// すべて捨てる
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: SchedulerEvent) {}
}

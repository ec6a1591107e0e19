//! EventSink の実装

use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::domain::SchedulerEvent;
use crate::ports::EventSink;

/// 任意数の tokio 購読者にイベントを配る
///
/// 送信はブロックしない。購読者がいなければ捨てる。遅い購読者は
/// スケジューラを止めず、遅れた分のイベントを読み飛ばす。
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: SchedulerEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

/// 全イベントをメモリに保持する
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `kind()` が `kind` のイベント
    pub fn of_kind(&self, kind: &str) -> Vec<SchedulerEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    pub fn take(&self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: SchedulerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_tolerates_zero_subscribers() {
        let sink = BroadcastEventSink::new(4);
        sink.emit(SchedulerEvent::Started { total: 1 });
    }

    #[tokio::test]
    async fn broadcast_delivers_to_each_subscriber() {
        let sink = BroadcastEventSink::new(4);
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();

        sink.emit(SchedulerEvent::Started { total: 3 });

        assert_eq!(a.recv().await.unwrap(), SchedulerEvent::Started { total: 3 });
        assert_eq!(b.recv().await.unwrap(), SchedulerEvent::Started { total: 3 });
    }

    #[test]
    fn recording_sink_filters_by_kind() {
        let sink = RecordingEventSink::new();
        sink.emit(SchedulerEvent::Started { total: 2 });
        sink.emit(SchedulerEvent::Completed {
            total: 2,
            completed: 2,
            failed: 0,
            elapsed_seconds: 1.0,
            stopped: false,
        });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.of_kind("completed").len(), 1);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }
}

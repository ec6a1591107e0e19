//! Status - 進捗モデルと読み取り専用スナップショット
//!
//! スケジューラが遷移のたびに同期的に更新します。
//! タイマーは使わず、派生値はスナップショット取得時に計算します。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Target, WorkerHandle};

/// 最初の完了までレートと ETA が返す値
pub const UNDEFINED: f64 = -1.0;

/// 実行の進捗の不変ビュー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub active: usize,
    pub pending: usize,

    /// `(completed + failed) / total * 100`, 0 for an empty run.
    pub percent_complete: f64,

    pub elapsed_seconds: f64,

    /// 1分あたりの完了数。最初の完了までは [`UNDEFINED`]
    pub rate_per_minute: f64,

    /// `pending / rate`, [`UNDEFINED`] while the rate is undefined.
    pub estimated_remaining_seconds: f64,

    pub running: bool,

    /// 直前の実行が `stop()` で終わった
    pub stopped: bool,

    pub active_assignments: BTreeMap<WorkerHandle, Target>,

    /// 完了順
    pub completed_targets: Vec<Target>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            total: 0,
            completed: 0,
            failed: 0,
            active: 0,
            pending: 0,
            percent_complete: 0.0,
            elapsed_seconds: 0.0,
            rate_per_minute: UNDEFINED,
            estimated_remaining_seconds: UNDEFINED,
            running: false,
            stopped: false,
            active_assignments: BTreeMap::new(),
            completed_targets: Vec::new(),
        }
    }
}

impl ProgressSnapshot {
    /// 1行の状態表示（例: `Completed: 3 / 10 | Active: 2 | Pending: 5`）
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Completed: {} / {} | Active: {} | Pending: {}",
            self.completed, self.total, self.active, self.pending
        );
        if self.failed > 0 {
            line.push_str(&format!(" | Failed: {}", self.failed));
        }
        line.push_str(&format!(" | Elapsed: {}", format_duration(self.elapsed_seconds)));
        if self.estimated_remaining_seconds >= 0.0 {
            line.push_str(&format!(
                " | ETA: {}",
                format_duration(self.estimated_remaining_seconds)
            ));
        }
        line
    }
}

/// `42s`, `3m 5s`, `1h 2m`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// 現在（または直前）の実行のカウンタ
///
/// `active` と `pending` は保持しない。`active` はスケジューラの割り当て数、
/// `pending` は残り全部。
#[derive(Debug, Default)]
pub struct ProgressModel {
    total: usize,
    completed: usize,
    failed: usize,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    running: bool,
    stopped: bool,
    completed_targets: Vec<Target>,
}

impl ProgressModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// `total` 件で新しい実行を始める
    pub fn reset(&mut self, total: usize, now: DateTime<Utc>) {
        *self = Self {
            total,
            started_at: Some(now),
            running: true,
            ..Self::default()
        };
    }

    pub fn record_completed(&mut self, target: Target) {
        self.completed += 1;
        self.completed_targets.push(target);
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// 実行を終える。経過時間は `now` で固定
    pub fn finish(&mut self, now: DateTime<Utc>, stopped: bool) {
        self.running = false;
        self.stopped = stopped;
        self.finished_at = Some(now);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 実行中 `active` 件を除いた残り
    pub fn pending(&self, active: usize) -> usize {
        self.total
            .saturating_sub(self.completed + self.failed + active)
    }

    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed + self.failed) as f64 * 100.0 / self.total as f64
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        let Some(start) = self.started_at else {
            return 0.0;
        };
        let end = self.finished_at.unwrap_or(now);
        let millis = (end - start).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    pub fn snapshot(
        &self,
        now: DateTime<Utc>,
        active_assignments: BTreeMap<WorkerHandle, Target>,
    ) -> ProgressSnapshot {
        let active = active_assignments.len();
        let pending = self.pending(active);
        let elapsed = self.elapsed_seconds(now);

        let (rate_per_minute, estimated_remaining_seconds) = if self.completed == 0 || elapsed <= 0.0
        {
            (UNDEFINED, UNDEFINED)
        } else {
            let completed = self.completed as f64;
            (completed * 60.0 / elapsed, pending as f64 * elapsed / completed)
        };

        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            active,
            pending,
            percent_complete: self.percent_complete(),
            elapsed_seconds: elapsed,
            rate_per_minute,
            estimated_remaining_seconds,
            running: self.running,
            stopped: self.stopped,
            active_assignments,
            completed_targets: self.completed_targets.clone(),
        }
    }
}

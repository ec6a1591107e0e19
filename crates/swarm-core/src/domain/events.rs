//! Events - スケジューラが送出するイベント
//!
//! 購読者（UI、ログ転送、テスト）への投げっぱなしの通知です。
//! スケジューラは消費を待ちません。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::{Target, WorkerHandle};

/// ターゲットがキューに戻された理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// 外部チャネルがクラッシュを報告した
    Crashed,

    /// ヘルススイープが結果未報告のまま死んだワーカーを見つけた
    Unresponsive,

    /// ディスパッチャが Job の開始を拒否した
    DispatchFailed,
}

/// ターゲットを諦めた理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    MaxRetriesExceeded,
}

/// スケジューライベント（閉じた列挙）
///
/// `{"type": "progress", ...}` の形でシリアライズされる。UI は `type` で分岐できる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Started {
        total: usize,
    },

    Progress {
        total: usize,
        completed: usize,
        failed: usize,
        active: usize,
        pending: usize,
        percent_complete: f64,
        active_assignments: BTreeMap<WorkerHandle, Target>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_target: Option<Target>,
    },

    Retry {
        target: Target,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handle: Option<WorkerHandle>,
        attempt: u32,
        max_retries: u32,
        cause: FailureCause,
    },

    Failure {
        target: Target,
        reason: FailureReason,
        attempts: u32,
    },

    Completed {
        total: usize,
        completed: usize,
        failed: usize,
        elapsed_seconds: f64,
        stopped: bool,
    },
}

impl SchedulerEvent {
    /// 短い名前（シリアライズ時の `type` タグと同じ）
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerEvent::Started { .. } => "started",
            SchedulerEvent::Progress { .. } => "progress",
            SchedulerEvent::Retry { .. } => "retry",
            SchedulerEvent::Failure { .. } => "failure",
            SchedulerEvent::Completed { .. } => "completed",
        }
    }

    /// 実行の終端イベントか（完了または停止）
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerEvent::Completed { .. })
    }
}

//! State - ターゲットとスケジューラの状態

use serde::{Deserialize, Serialize};

/// TargetState はターゲット1つの現在の居場所
///
/// # 状態遷移
/// - Pending -> Active -> Completed
/// - Pending -> Active -> Pending（クラッシュ後のリトライ、max_retries まで繰り返す）
/// - Pending -> Active -> PermanentlyFailed（リトライ上限）
///
/// 列挙されたターゲットは常にちょうど1つの状態にある。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// 優先度キューで待機中
    Pending,

    /// ワーカーにディスパッチ済み、結果待ち
    Active,

    /// 解析成功
    Completed,

    /// リトライ上限に達して諦めた
    PermanentlyFailed,
}

impl TargetState {
    /// 終端状態か（これ以上遷移しない）
    pub fn is_terminal(self) -> bool {
        matches!(self, TargetState::Completed | TargetState::PermanentlyFailed)
    }
}

/// スケジューラ全体の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// 未開始・完了・停止
    #[default]
    Idle,

    /// 通知を受け付け、作業をディスパッチ中
    Running,
}

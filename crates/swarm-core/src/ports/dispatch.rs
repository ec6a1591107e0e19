//! Dispatcher port - Job に対して解析エージェントを起動
//!
//! スケジューラは `dispatch` をすぐ返る呼び出しとして扱います。
//!
//! # 契約
//! - プロセス起動などの重い処理は非同期で行い、結果は後から通知で返す
//! - `dispatch` の中からスケジューラを呼び返してはいけない

use crate::domain::{DispatchError, Job, WorkerHandle};

/// 外部ワーカー上で Job を1件開始
pub trait Dispatcher: Send + Sync {
    /// 後続の通知と突き合わせるためのハンドルを返す
    fn dispatch(&self, job: &Job) -> Result<WorkerHandle, DispatchError>;
}

//! TargetEnumerator port - 1回の解析ランの対象を列挙
//!
//! `Scheduler::start` ごとに1回だけ呼ばれます（遅くてもよいが読み取り専用）。

use crate::domain::Target;

pub trait TargetEnumerator: Send + Sync {
    /// 安定した順序で返す。同点の Job はこの順でディスパッチされる
    fn enumerate(&self) -> Vec<Target>;
}

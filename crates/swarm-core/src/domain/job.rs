//! Job - ターゲットと計算済みの優先度

use serde::{Deserialize, Serialize};

use super::ids::Target;

/// Job はスケジュール可能な作業単位
///
/// # 設計
/// - Prioritizer が一度だけ生成し、以後は変更しない
/// - リトライでは同じ値を再投入する（スコアと理由は元のまま、再スコアしない）
/// - `rank` は優先順位リスト上の位置。同点のときは rank が小さい方が先
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    target: Target,
    score: f64,
    reason: String,
    metrics: Vec<String>,
    #[serde(default)]
    rank: usize,
}

impl Job {
    pub fn new(target: Target, score: f64, reason: impl Into<String>, metrics: Vec<String>) -> Self {
        Self {
            target,
            score,
            reason: reason.into(),
            metrics,
            rank: 0,
        }
    }

    /// 同点時の順位を確定する。rank を付けるのは Prioritizer だけ
    pub(crate) fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// 大きいほど先にディスパッチされる
    pub fn score(&self) -> f64 {
        self.score
    }

    /// 人が読む説明（監査・デバッグ用）
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// どのヒューリスティックがどれだけ寄与したか（ヒューリスティック順）
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_exposes_its_priority() {
        let job = Job::new(
            Target::new(0x1000),
            250.0,
            "APICall:1_api_calls",
            vec!["APICall=+400.0".to_string()],
        )
        .with_rank(3);

        assert_eq!(job.target(), Target::new(0x1000));
        assert_eq!(job.score(), 250.0);
        assert_eq!(job.reason(), "APICall:1_api_calls");
        assert_eq!(job.metrics().len(), 1);
        assert_eq!(job.rank(), 3);
    }
}

//! Error types - エラー型の定義
//!
//! # 方針
//! - 呼び出し側に返るのは設定エラーと誤用（実行中の `start`）だけ
//! - ターゲットごとの失敗はイベントと進捗で観測する

use thiserror::Error;

/// 設定エラー。`start()` から同期的に返る
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("health_check_interval_ms must be at least 1")]
    ZeroHealthCheckInterval,

    #[error("no heuristics are enabled; at least one is required to prioritize targets")]
    NoHeuristicsEnabled,

    #[error("weight for heuristic '{heuristic}' must be a finite number")]
    InvalidWeight { heuristic: String },

    #[error("min_string_length must be at least 1")]
    ZeroMinStringLength,

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// スケジューラの公開操作が返すエラー
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("analysis is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("scheduler service has shut down")]
    ServiceClosed,
}

/// ディスパッチャが Job を開始できなかった
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no worker capacity left (limit={limit})")]
    CapacityExhausted { limit: usize },

    #[error("dispatch rejected: {0}")]
    Rejected(String),
}

/// 生存確認が答えを返せなかった
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("liveness check failed: {0}")]
pub struct LivenessError(pub String);

//! App - スケジューラ本体と実行環境
//!
//! # コンポーネント
//! - **Scheduler**: シングルスレッドの状態機械（start、通知、ヘルススイープ、stop）
//! - **SchedulerBuilder**: ポートのワイヤリング（fail-fast）
//! - **SchedulerService**: 遷移を直列化し、定期スイープを回す tokio タスク
//! - **ProgressModel**: カウンタと派生する進捗値

pub mod builder;
pub mod scheduler;
pub mod service;
pub mod status;

pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::scheduler::{InvariantViolation, Scheduler};
pub use self::service::{SchedulerClient, SchedulerService};
pub use self::status::{ProgressModel, ProgressSnapshot, format_duration};

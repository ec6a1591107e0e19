//! Domain - ドメインモデル
//!
//! - ids: Target, WorkerHandle
//! - job: Job
//! - state: TargetState, SchedulerState
//! - events: SchedulerEvent
//! - errors: エラー型
//! - binary: バイナリの関数・文字列・呼び出し情報

pub mod binary;
pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod state;

pub use binary::{CallSite, FunctionFlags, FunctionInfo, StringRef};
pub use errors::{ConfigError, DispatchError, LivenessError, SchedulerError};
pub use events::{FailureCause, FailureReason, SchedulerEvent};
pub use ids::{Target, WorkerHandle};
pub use job::Job;
pub use state::{SchedulerState, TargetState};

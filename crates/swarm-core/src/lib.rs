//! swarm-core
//!
//! 1つのバイナリの関数を解析エージェント群に割り振るスケジューラ。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, job, state, events, errors, binary）
//! - **ports**: 抽象化レイヤー（BinaryView, Dispatcher, LivenessCheck, など）
//! - **analysis**: ヒューリスティックと Prioritizer
//! - **queue**: 待ちキュー、リトライ管理、実行中の割り当て
//! - **app**: スケジューラ本体、builder、tokio サービス、進捗
//! - **impls**: 実装（インメモリのバイナリ、シミュレーション、イベント sink）
//! - **config**: JSON 設定と検証

pub mod analysis;
pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{
    ProgressSnapshot, Scheduler, SchedulerBuilder, SchedulerClient, SchedulerService,
};
pub use config::SwarmConfig;
pub use domain::{SchedulerError, SchedulerEvent, Target, WorkerHandle};

//! Impls - ポートの実装
//!
//! # 含まれる実装
//! - **InMemoryBinary**: JSON から読む解析データベース（`BinaryView` + `TargetEnumerator`）
//! - **SimulatedSwarm**: 結末を台本で決めるランチャー兼生存確認
//! - **BroadcastEventSink** / **RecordingEventSink**: イベントの購読
//!
//! 実運用では逆アセンブラのデータベースとエージェントのプロセス管理を
//! 同じポートに差し込む。

pub mod inmem_binary;
pub mod simulated;
pub mod sinks;

pub use self::inmem_binary::{BinaryImage, InMemoryBinary, StringUse};
pub use self::simulated::{AgentStatus, SimulatedAgent, SimulatedSwarm};
pub use self::sinks::{BroadcastEventSink, RecordingEventSink};

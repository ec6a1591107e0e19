//! Ports - 外部世界とのインターフェース（抽象化レイヤー）
//!
//! スケジューラが依存するが所有しない外部能力を trait として定義します。
//! - BinaryView / TargetEnumerator: 解析データベース
//! - Dispatcher / LivenessCheck: エージェントの起動と生存確認
//! - EventSink: イベントの購読者
//! - Clock / HandleMinter: 時刻とハンドル生成
//!
//! すべて object-safe で、`Arc<dyn _>` として保持します。

pub mod binary_view;
pub mod clock;
pub mod dispatch;
pub mod enumerator;
pub mod event_sink;
pub mod id_generator;
pub mod liveness;

pub use self::binary_view::BinaryView;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dispatch::Dispatcher;
pub use self::enumerator::TargetEnumerator;
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{HandleMinter, SequentialMinter, UlidMinter};
pub use self::liveness::LivenessCheck;

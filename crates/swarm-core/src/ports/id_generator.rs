//! HandleMinter port - ワーカーハンドル生成の抽象化
//!
//! ワーカーに自然な ID が無いディスパッチャ（プロセス内シミュレーション、
//! スレッドプールなど）はここでハンドルを発行します。
//!
//! # 実装
//! - **UlidMinter**: ULID ベース（生成時刻でソート可能）
//! - **SequentialMinter**: `agent-1`, `agent-2`, ...（テストで読みやすい）

use std::sync::atomic::{AtomicU64, Ordering};

use ulid::Ulid;

use crate::domain::WorkerHandle;
use crate::ports::Clock;

/// 一意なワーカーハンドルを生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait HandleMinter: Send + Sync {
    fn mint(&self) -> WorkerHandle;
}

/// ULID ベースの発行器: `agent-<ULID>`
///
/// タイムスタンプ部は注入した Clock から取ります。
/// `FixedClock` ならタイムスタンプが揃い、ランダム部だけが異なります。
pub struct UlidMinter<C> {
    clock: C,
}

impl<C: Clock> UlidMinter<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> HandleMinter for UlidMinter<C> {
    fn mint(&self) -> WorkerHandle {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        WorkerHandle::new(format!("agent-{ulid}"))
    }
}

#[derive(Debug, Default)]
pub struct SequentialMinter {
    next: AtomicU64,
}

impl SequentialMinter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandleMinter for SequentialMinter {
    fn mint(&self) -> WorkerHandle {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        WorkerHandle::new(format!("agent-{n}"))
    }
}

//! LivenessCheck port - ハンドルの先のワーカーが生きているか
//!
//! ヘルススイープだけが使います。
//! - `Ok(false)`: クラッシュとして扱う
//! - `Err`: 判定不能。アクティブのまま、次のスイープで再確認

use crate::domain::{LivenessError, WorkerHandle};

pub trait LivenessCheck: Send + Sync {
    fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, LivenessError>;
}

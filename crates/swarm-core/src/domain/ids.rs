//! Domain identifiers (strongly-typed IDs).
//!
//! # ID の種類
//! - `Target`: 解析対象（関数の開始アドレス）
//! - `WorkerHandle`: ディスパッチャが実行中エージェントごとに発行する不透明な ID。
//!   スケジューラは中身を解釈しない

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target は解析の単位（開始アドレスで識別される関数1つ）
///
/// 生成後は不変。表示は逆アセンブル表示に合わせて大文字16進（`0x401000`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(u64);

impl Target {
    pub const fn new(address: u64) -> Self {
        Self(address)
    }

    pub const fn address(self) -> u64 {
        self.0
    }
}

impl From<u64> for Target {
    fn from(address: u64) -> Self {
        Self(address)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// WorkerHandle はディスパッチ済みワーカーの不透明なハンドル
///
/// 突き合わせ専用: 完了・クラッシュ通知と生存確認はこの値でワーカーを指す。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerHandle(String);

impl WorkerHandle {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WorkerHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

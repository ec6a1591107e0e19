//! Binary facts - 解析対象バイナリの読み取り専用データ
//!
//! `BinaryView` がヒューリスティックに渡す値です。
//! インメモリのデータベースを JSON から読めるように、ただのデータにしています。

use serde::{Deserialize, Serialize};

use super::ids::Target;

/// 解析データベースが関数に付けるフラグ
///
/// すべて既定値 `false`。記述には立っているフラグだけ書けばよい。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionFlags {
    /// ライブラリ関数として認識済み（シグネチャ照合など）
    pub library: bool,

    /// インポートスタブまたはジャンプ thunk
    pub thunk: bool,

    /// 別関数の継続チャンク
    pub tail: bool,

    /// アウトライン化されたコード（本物の関数ではない）
    pub outlined: bool,

    pub hidden: bool,

    /// 外部・インポートセグメントにある
    pub external: bool,
}

/// 解析データベース上の関数1つ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub address: Target,

    #[serde(default)]
    pub name: Option<String>,

    /// コードサイズ（バイト）
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub flags: FunctionFlags,
}

impl FunctionInfo {
    pub fn new(address: u64, size: u64) -> Self {
        Self {
            address: Target::new(address),
            name: None,
            size,
            flags: FunctionFlags::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// プログラム外で解決されるか（ライブラリコードまたはインポート）
    pub fn is_library(&self) -> bool {
        self.flags.library || self.flags.external
    }

    /// エージェントを割く価値があるか（プログラム自身の本物のコード）
    pub fn is_analyzable(&self) -> bool {
        let f = self.flags;
        !(f.library || f.thunk || f.tail || f.outlined || f.hidden || f.external)
    }
}

/// 関数内から参照される文字列定数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRef {
    /// 文字列リテラルのアドレス
    pub address: u64,
    pub text: String,
}

/// call 命令1つ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    /// call 命令自体のアドレス
    pub site: u64,
    pub caller: Target,
    pub callee: Target,
}

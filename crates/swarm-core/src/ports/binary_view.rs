//! BinaryView port - 解析データベースへの読み取り専用アクセス
//!
//! ヒューリスティックはこの trait 経由でのみ読みます。
//!
//! # 設計
//! - 下のデータベースが変わらない限り、同じ問いには同じ答えを返すこと
//! - これによりスコアリングが決定的になる

use crate::domain::{CallSite, FunctionInfo, StringRef, Target};

pub trait BinaryView: Send + Sync {
    /// 関数のメタデータ（`target` から始まる関数が無ければ `None`）
    fn function(&self, target: Target) -> Option<FunctionInfo>;

    /// 登録済みのエントリポイントか（エントリテーブル由来など）
    fn is_entry_point(&self, target: Target) -> bool;

    /// エクスポートされたシンボルか
    fn is_exported(&self, target: Target) -> bool;

    /// 関数内から参照される文字列リテラル
    fn string_refs(&self, target: Target) -> Vec<StringRef>;

    /// 関数内の call 命令
    fn calls_from(&self, target: Target) -> Vec<CallSite>;

    /// この関数を呼ぶ call 命令（バイナリ全体から）
    fn calls_to(&self, target: Target) -> Vec<CallSite>;

    /// シンボル名。名前の無い関数は `sub_<ADDR>`
    fn display_name(&self, target: Target) -> String {
        self.function(target)
            .and_then(|f| f.name)
            .unwrap_or_else(|| format!("sub_{:X}", target.address()))
    }
}

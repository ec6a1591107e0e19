//! InMemoryBinary - BinaryView / TargetEnumerator のインメモリ実装
//!
//! # 実装
//! - JSON の `BinaryImage` から読み込む（CLI）か、`with_*` で組み立てる（テスト）
//! - インデックスは一度だけ作る。検索は戻り値以外の確保をしない

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{CallSite, FunctionInfo, StringRef, Target};
use crate::ports::{BinaryView, TargetEnumerator};

/// 文字列リテラルとそれを参照する関数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringUse {
    pub function: Target,
    pub address: u64,
    pub text: String,
}

/// バイナリのシリアライズ可能な記述
///
/// ```json
/// {
///   "functions": [{ "address": 4096, "name": "main", "size": 320 }],
///   "calls": [{ "site": 4112, "caller": 4096, "callee": 8192 }],
///   "strings": [{ "function": 4096, "address": 36864, "text": "usage: %s" }],
///   "entry_points": [4096],
///   "exports": []
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryImage {
    pub functions: Vec<FunctionInfo>,
    pub calls: Vec<CallSite>,
    pub strings: Vec<StringUse>,
    pub entry_points: Vec<Target>,
    pub exports: Vec<Target>,
}

impl BinaryImage {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBinary {
    functions: BTreeMap<Target, FunctionInfo>,
    calls_from: BTreeMap<Target, Vec<CallSite>>,
    calls_to: BTreeMap<Target, Vec<CallSite>>,
    strings: BTreeMap<Target, Vec<StringRef>>,
    entry_points: BTreeSet<Target>,
    exports: BTreeSet<Target>,
}

impl InMemoryBinary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同じアドレスは後のエントリで上書き
    pub fn with_function(mut self, function: FunctionInfo) -> Self {
        self.functions.insert(function.address, function);
        self
    }

    pub fn with_call(mut self, site: u64, caller: u64, callee: u64) -> Self {
        self.add_call(CallSite {
            site,
            caller: Target::new(caller),
            callee: Target::new(callee),
        });
        self
    }

    pub fn with_string(mut self, function: u64, address: u64, text: impl Into<String>) -> Self {
        self.strings
            .entry(Target::new(function))
            .or_default()
            .push(StringRef {
                address,
                text: text.into(),
            });
        self
    }

    pub fn with_entry_point(mut self, address: u64) -> Self {
        self.entry_points.insert(Target::new(address));
        self
    }

    pub fn with_export(mut self, address: u64) -> Self {
        self.exports.insert(Target::new(address));
        self
    }

    fn add_call(&mut self, call: CallSite) {
        self.calls_from.entry(call.caller).or_default().push(call);
        self.calls_to.entry(call.callee).or_default().push(call);
    }
}

impl From<BinaryImage> for InMemoryBinary {
    fn from(image: BinaryImage) -> Self {
        let mut binary = InMemoryBinary {
            entry_points: image.entry_points.into_iter().collect(),
            exports: image.exports.into_iter().collect(),
            ..Default::default()
        };
        for f in image.functions {
            binary.functions.insert(f.address, f);
        }
        for call in image.calls {
            binary.add_call(call);
        }
        for s in image.strings {
            binary.strings.entry(s.function).or_default().push(StringRef {
                address: s.address,
                text: s.text,
            });
        }
        binary
    }
}

impl BinaryView for InMemoryBinary {
    fn function(&self, target: Target) -> Option<FunctionInfo> {
        self.functions.get(&target).cloned()
    }

    fn is_entry_point(&self, target: Target) -> bool {
        self.entry_points.contains(&target)
    }

    fn is_exported(&self, target: Target) -> bool {
        self.exports.contains(&target)
    }

    fn string_refs(&self, target: Target) -> Vec<StringRef> {
        self.strings.get(&target).cloned().unwrap_or_default()
    }

    fn calls_from(&self, target: Target) -> Vec<CallSite> {
        self.calls_from.get(&target).cloned().unwrap_or_default()
    }

    fn calls_to(&self, target: Target) -> Vec<CallSite> {
        self.calls_to.get(&target).cloned().unwrap_or_default()
    }
}

impl TargetEnumerator for InMemoryBinary {
    /// プログラム自身の関数（アドレス昇順）
    fn enumerate(&self) -> Vec<Target> {
        self.functions
            .values()
            .filter(|f| f.is_analyzable())
            .map(|f| f.address)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FunctionFlags;

    #[test]
    fn enumeration_skips_library_and_stub_code() {
        let thunk = FunctionFlags {
            thunk: true,
            ..Default::default()
        };
        let import = FunctionFlags {
            external: true,
            ..Default::default()
        };
        let binary = InMemoryBinary::new()
            .with_function(FunctionInfo::new(0x3000, 10))
            .with_function(FunctionInfo::new(0x1000, 10))
            .with_function(FunctionInfo::new(0x2000, 10).with_flags(thunk))
            .with_function(FunctionInfo::new(0x9000, 10).with_flags(import));

        assert_eq!(
            binary.enumerate(),
            vec![Target::new(0x1000), Target::new(0x3000)]
        );
    }

    #[test]
    fn loads_from_json_image() {
        let json = r#"
        {
          "functions": [
            { "address": 4096, "name": "main", "size": 320 },
            { "address": 8192, "size": 40 },
            { "address": 12288, "name": "strlen", "flags": { "library": true } }
          ],
          "calls": [
            { "site": 4112, "caller": 4096, "callee": 8192 },
            { "site": 4128, "caller": 4096, "callee": 12288 }
          ],
          "strings": [{ "function": 4096, "address": 36864, "text": "usage: %s <file>" }],
          "entry_points": [4096]
        }"#;
        let binary = InMemoryBinary::from(BinaryImage::from_json_str(json).unwrap());

        assert!(binary.function(Target::new(12288)).is_some_and(|f| f.flags.library));
        assert!(binary.is_entry_point(Target::new(4096)));
        assert!(!binary.is_exported(Target::new(4096)));
        assert_eq!(binary.calls_from(Target::new(4096)).len(), 2);
        assert_eq!(binary.calls_to(Target::new(8192)).len(), 1);
        assert_eq!(binary.string_refs(Target::new(4096))[0].text, "usage: %s <file>");
        assert_eq!(binary.display_name(Target::new(8192)), "sub_2000");
        assert_eq!(binary.enumerate(), vec![Target::new(4096), Target::new(8192)]);
    }

    #[test]
    fn unknown_target_has_no_facts() {
        let binary = InMemoryBinary::new();
        let t = Target::new(0x42);
        assert!(binary.function(t).is_none());
        assert!(binary.string_refs(t).is_empty());
        assert!(binary.calls_from(t).is_empty());
        assert!(binary.calls_to(t).is_empty());
    }
}

//! Config - Prioritizer とスケジューラの設定
//!
//! コンストラクタに明示的に渡す値です（プロセス全体の状態は持たない）。
//! 全フィールドに既定値があるので、JSON には変えたいキーだけ書けばよい:
//!
//! ```json
//! {
//!   "scheduler": { "max_concurrency": 8 },
//!   "heuristics": { "entry_point": { "mode": "top_down" } }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::EntryPointMode;
use crate::domain::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub scheduler: SchedulerConfig,
    pub heuristics: HeuristicConfig,
}

impl SwarmConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.heuristics.validate()
    }
}

/// ディスパッチ上限とリトライ回数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 同時に動かすエージェントの最大数
    pub max_concurrency: usize,

    /// 失敗扱いにするまでのターゲットごとのリトライ回数
    pub max_retries: u32,

    /// バックグラウンドのヘルススイープ周期（サービスループのみ）
    pub health_check_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_retries: 3,
            health_check_interval_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.health_check_interval_ms == 0 {
            return Err(ConfigError::ZeroHealthCheckInterval);
        }
        Ok(())
    }
}

/// ヒューリスティック1つの有効フラグと重み
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicToggle {
    pub enabled: bool,
    pub weight: f64,
}

impl HeuristicToggle {
    pub fn enabled(weight: f64) -> Self {
        Self {
            enabled: true,
            weight,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            weight: 0.0,
        }
    }
}

impl Default for HeuristicToggle {
    fn default() -> Self {
        Self::enabled(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryPointSettings {
    pub enabled: bool,
    pub weight: f64,
    pub mode: EntryPointMode,
}

impl Default for EntryPointSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            mode: EntryPointMode::BottomUp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringHeavySettings {
    pub enabled: bool,
    pub weight: f64,

    /// これより短い文字列（文字数）は無視する
    pub min_string_length: usize,
}

impl Default for StringHeavySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 2.0,
            min_string_length: 10,
        }
    }
}

/// ヒューリスティックごとの設定
///
/// 既定値は API 呼び出し・文字列が多い関数、小さい関数、多く呼ばれる関数を優先し、
/// エントリポイントと内部呼び出しの多い関数を後ろに回す（bottom-up）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub api_call: HeuristicToggle,
    pub caller_count: HeuristicToggle,
    pub string_heavy: StringHeavySettings,
    pub function_size: HeuristicToggle,
    pub internal_callee: HeuristicToggle,
    pub entry_point: EntryPointSettings,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            api_call: HeuristicToggle::enabled(2.0),
            caller_count: HeuristicToggle::enabled(1.5),
            string_heavy: StringHeavySettings::default(),
            function_size: HeuristicToggle::enabled(1.5),
            internal_callee: HeuristicToggle::enabled(1.0),
            entry_point: EntryPointSettings::default(),
        }
    }
}

impl HeuristicConfig {
    /// `(name, enabled, weight)` for every heuristic, in scoring order.
    pub fn toggles(&self) -> [(&'static str, bool, f64); 6] {
        [
            ("APICall", self.api_call.enabled, self.api_call.weight),
            ("CallerCount", self.caller_count.enabled, self.caller_count.weight),
            ("StringHeavy", self.string_heavy.enabled, self.string_heavy.weight),
            ("FunctionSize", self.function_size.enabled, self.function_size.weight),
            ("InternalCallee", self.internal_callee.enabled, self.internal_callee.weight),
            ("EntryPoint", self.entry_point.enabled, self.entry_point.weight),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let toggles = self.toggles();
        if let Some((name, _, _)) = toggles.iter().find(|(_, _, w)| !w.is_finite()) {
            return Err(ConfigError::InvalidWeight {
                heuristic: name.to_string(),
            });
        }
        if !toggles.iter().any(|(_, enabled, _)| *enabled) {
            return Err(ConfigError::NoHeuristicsEnabled);
        }
        if self.string_heavy.enabled && self.string_heavy.min_string_length == 0 {
            return Err(ConfigError::ZeroMinStringLength);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SwarmConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scheduler.max_concurrency, 4);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.heuristics.api_call.weight, 2.0);
        assert_eq!(config.heuristics.entry_point.mode, EntryPointMode::BottomUp);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"
        {
          "scheduler": { "max_concurrency": 8 },
          "heuristics": { "entry_point": { "mode": "top_down" } }
        }"#;
        let config = SwarmConfig::from_json_str(json).unwrap();
        assert_eq!(config.scheduler.max_concurrency, 8);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.heuristics.entry_point.mode, EntryPointMode::TopDown);
        assert_eq!(config.heuristics.entry_point.weight, 1.0);
        assert_eq!(config.heuristics.caller_count.weight, 1.5);
    }

    #[test]
    fn empty_json_is_default() {
        let config = SwarmConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SwarmConfig::default());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = SwarmConfig::default();
        config.scheduler.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroConcurrency)));
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let mut config = SwarmConfig::default();
        config.scheduler.health_check_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroHealthCheckInterval)));
    }

    #[test]
    fn all_heuristics_disabled_is_rejected() {
        let mut h = HeuristicConfig::default();
        h.api_call = HeuristicToggle::disabled();
        h.caller_count = HeuristicToggle::disabled();
        h.string_heavy.enabled = false;
        h.function_size = HeuristicToggle::disabled();
        h.internal_callee = HeuristicToggle::disabled();
        h.entry_point.enabled = false;
        assert!(matches!(h.validate(), Err(ConfigError::NoHeuristicsEnabled)));
    }

    #[test]
    fn non_finite_weight_is_rejected() {
        let mut h = HeuristicConfig::default();
        h.caller_count.weight = f64::NAN;
        assert!(matches!(
            h.validate(),
            Err(ConfigError::InvalidWeight { heuristic }) if heuristic == "CallerCount"
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SwarmConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

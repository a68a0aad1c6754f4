//! Per-instance transpilation configuration

use serde::{Deserialize, Serialize};

use lode_backend::OutputLevel;

/// Compiler settings that shape backend invocations.
///
/// Fields mirror the configuration surface the CLI/config layer hands over;
/// level and module kind stay as the raw configured strings and are mapped
/// (with fail-fast validation) when a transpilation is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspileConfig {
    /// Backend identifier resolved against the registry
    pub backend: String,
    /// Requested output level ("es2015" ... "esnext")
    pub target: String,
    /// Configured module kind for graph-format output
    pub module_kind: String,
    /// Factory callee for markup lowering
    pub jsx_factory: Option<String>,
    /// Accept decorator syntax
    pub decorators: bool,
    /// Force the strict prologue on script-kind output
    pub always_strict: bool,
    /// Suppress the implicit strict prologue script-kind output would
    /// otherwise receive
    pub no_implicit_use_strict: bool,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        Self {
            backend: "strip".to_string(),
            target: "es2022".to_string(),
            module_kind: "esnext".to_string(),
            jsx_factory: None,
            decorators: false,
            always_strict: false,
            no_implicit_use_strict: false,
        }
    }
}

impl TranspileConfig {
    /// The configured target parsed to a level, before capability probing
    pub fn target_level(&self) -> Result<OutputLevel, crate::TranspileError> {
        self.target
            .parse()
            .map_err(|_| crate::TranspileError::InvalidTarget(self.target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let config = TranspileConfig::default();
        assert_eq!(config.target_level().unwrap(), OutputLevel::Es2022);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: TranspileConfig =
            serde_json::from_str(r#"{"target":"es2015","decorators":true}"#).unwrap();
        assert_eq!(config.target, "es2015");
        assert!(config.decorators);
        assert_eq!(config.backend, "strip");
    }

    #[test]
    fn test_invalid_target_fails() {
        let config = TranspileConfig {
            target: "es1999".to_string(),
            ..Default::default()
        };
        assert!(config.target_level().is_err());
    }
}

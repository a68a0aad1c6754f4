//! Registered compiler instances
//!
//! Each instance pairs a transpilation configuration with an ownership
//! scope. Instances move through registered -> enabled/disabled ->
//! unregistered; while disabled, an instance still claims its scope but
//! defers every interception to the host.

use std::path::PathBuf;

use lode_backend::{Backend, OutputLevel};
use lode_resolve::ModuleFormat;
use lode_transpile::TranspileConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegisterError;

/// Configuration handed over at registration time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Scope directory this instance claims, or `None` for the global
    /// default instance
    pub scope: Option<PathBuf>,
    /// Whether interception starts enabled
    pub enabled: bool,
    pub transpile: TranspileConfig,
    /// Fallback format when the detection chain reaches its last step
    #[serde(with = "format_name")]
    pub default_format: ModuleFormat,
    /// Also attempt suffix/index resolution for bare relative specifiers
    pub classic_resolution: bool,
    /// Treat host-context anomalies as fatal instead of warning
    pub strict_compat: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            scope: None,
            enabled: true,
            transpile: TranspileConfig::default(),
            default_format: ModuleFormat::Script,
            classic_resolution: false,
            strict_compat: false,
        }
    }
}

mod format_name {
    use lode_resolve::ModuleFormat;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(f: &ModuleFormat, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(f.wire_name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ModuleFormat, D::Error> {
        let name = String::deserialize(d)?;
        match name.as_str() {
            "module" => Ok(ModuleFormat::Module),
            "commonjs" => Ok(ModuleFormat::Script),
            other => Err(serde::de::Error::custom(format!(
                "unknown module format '{other}'"
            ))),
        }
    }
}

/// A live registered instance
#[derive(Debug)]
pub struct CompilerInstance {
    pub config: InstanceConfig,
    enabled: bool,
    /// Capability-probed output level, fixed at first use for the lifetime
    /// of the registration
    probed: Option<OutputLevel>,
}

impl CompilerInstance {
    pub fn new(config: InstanceConfig) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            enabled,
            probed: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle interception. Idempotent in either direction.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The output level this instance actually emits at.
    ///
    /// The requested target is probed against the backend's capabilities on
    /// first use and the answer cached; later reconfiguration of the target
    /// requires re-registration.
    pub fn probed_level(&mut self, backend: &dyn Backend) -> Result<OutputLevel, RegisterError> {
        if let Some(level) = self.probed {
            return Ok(level);
        }
        let requested = self
            .config
            .transpile
            .target_level()
            .map_err(|_| RegisterError::InvalidTarget(self.config.transpile.target.clone()))?;
        let level = lode_backend::probe(backend, requested)
            .map_err(|e| RegisterError::BackendUnavailable(e.to_string()))?;
        if level != requested {
            debug!(%requested, %level, "output level downgraded after capability probe");
        }
        self.probed = Some(level);
        Ok(level)
    }
}

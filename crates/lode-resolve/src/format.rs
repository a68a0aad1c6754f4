//! Module format detection

use std::path::Path;

use tracing::debug;
use url::Url;

use crate::manifest::ManifestCache;

/// How the host evaluates a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    /// Graph-resolved unit with static import/export edges
    Module,
    /// Eagerly, synchronously loaded unit
    Script,
}

impl ModuleFormat {
    /// The host protocol's wire name for this format
    pub fn wire_name(self) -> &'static str {
        match self {
            ModuleFormat::Module => "module",
            ModuleFormat::Script => "commonjs",
        }
    }
}

/// Which step of the detection chain decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Extension,
    Assertion,
    Manifest,
    InstanceDefault,
}

/// Outcome of format detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Format(ModuleFormat, DetectionSource),
    /// The identity's scheme or file kind is not owned by this pipeline;
    /// the host's default resolver must handle it (and its errors must not
    /// be swallowed).
    Defer,
}

/// Ordered format-detection chain: extension, context assertion, nearest
/// manifest's declared type, instance default. First applicable step wins.
#[derive(Debug, Default)]
pub struct FormatDetector {
    manifests: ManifestCache,
}

impl FormatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect the format of `identity` (a `file:` URL or plain path).
    ///
    /// `asserted` is an explicit format assertion from the hook context;
    /// `instance_default` is the owning instance's configured fallback.
    pub fn detect(
        &mut self,
        identity: &str,
        asserted: Option<ModuleFormat>,
        instance_default: ModuleFormat,
    ) -> Detection {
        let path_string = match identity_to_path(identity) {
            Some(path) => path,
            None => {
                debug!(identity, "foreign scheme, deferring to host");
                return Detection::Defer;
            }
        };
        let path = Path::new(&path_string);

        // 1. Extensions that pin a format outright.
        match extension_of(path) {
            Some("mts") | Some("mjs") => {
                return Detection::Format(ModuleFormat::Module, DetectionSource::Extension)
            }
            Some("cts") | Some("cjs") => {
                return Detection::Format(ModuleFormat::Script, DetectionSource::Extension)
            }
            // File kinds the host loads natively.
            Some("json") | Some("node") | Some("wasm") => return Detection::Defer,
            _ => {}
        }

        // 2. Explicit assertion from the hook context.
        if let Some(format) = asserted {
            return Detection::Format(format, DetectionSource::Assertion);
        }

        // 3. Nearest ancestor manifest with a declared type.
        if let Some(manifest) = self.manifests.nearest(path) {
            if let Some(declared) = manifest.package_type.as_deref() {
                let format = if declared == "module" {
                    ModuleFormat::Module
                } else {
                    ModuleFormat::Script
                };
                return Detection::Format(format, DetectionSource::Manifest);
            }
        }

        // 4. Instance default; a wrong guess is the caller's fallback-retry
        // problem.
        Detection::Format(instance_default, DetectionSource::InstanceDefault)
    }
}

/// Convert a module identity to a filesystem path, or `None` for schemes
/// this pipeline does not own
fn identity_to_path(identity: &str) -> Option<String> {
    match identity.split_once(':') {
        Some((scheme, _)) if is_scheme(scheme) => {
            if scheme != "file" {
                return None;
            }
            let parsed = Url::parse(identity).ok()?;
            parsed.to_file_path().ok().map(|p| p.display().to_string())
        }
        _ => Some(identity.to_string()),
    }
}

/// A URL scheme: alphabetic start, more than one character (so Windows
/// drive letters stay paths)
fn is_scheme(s: &str) -> bool {
    s.len() > 1
        && s.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

//! Transpile dispatch: derive backend options and invoke the backend

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use lode_backend::{Backend, BackendError, BackendOptions, ModuleKind, OutputLevel};
use lode_resolve::ModuleFormat;
use lode_sourcemap::{PositionMap, PositionMapBuilder};

use crate::config::TranspileConfig;

/// Extension class of a source file, selecting the transformation variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Plain annotated source
    Plain,
    /// Markup-embedding source (`.tsx` / `.jsx`)
    Markup,
    /// Declaration file: no runtime code
    Declaration,
}

/// Classify a path by extension
pub fn source_kind(path: &Path) -> SourceKind {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
        return SourceKind::Declaration;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsx") | Some("jsx") => SourceKind::Markup,
        _ => SourceKind::Plain,
    }
}

/// Result of a dispatched transpilation
#[derive(Debug)]
pub struct Transpiled {
    pub compiled_text: String,
    pub position_map: PositionMap,
    /// `name@version` stamp of the backend invocation that produced both
    pub backend_stamp: String,
    pub level: OutputLevel,
}

#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("module kind '{0}' is not representable by this pipeline")]
    UnsupportedModuleKind(String),

    #[error("invalid output target '{0}'")]
    InvalidTarget(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Map the configured module kind onto the backend enumeration for the
/// detected format. Unrepresentable kinds fail here, before any backend
/// work.
pub fn module_kind_for(
    config: &TranspileConfig,
    format: ModuleFormat,
) -> Result<ModuleKind, TranspileError> {
    match format {
        ModuleFormat::Script => Ok(ModuleKind::CommonJs),
        ModuleFormat::Module => {
            let kind: ModuleKind = config
                .module_kind
                .parse()
                .map_err(|_| TranspileError::UnsupportedModuleKind(config.module_kind.clone()))?;
            if kind == ModuleKind::CommonJs {
                // Graph-format output cannot be emitted as script-kind text.
                return Err(TranspileError::UnsupportedModuleKind(
                    config.module_kind.clone(),
                ));
            }
            Ok(kind)
        }
    }
}

/// Derive the full backend options for one invocation.
///
/// Deterministic in (config, level, format, kind): the strict prologue
/// applies only to script-kind output, where an explicit `always_strict`
/// wins and an explicit `no_implicit_use_strict` suppresses the default.
pub fn derive_options(
    config: &TranspileConfig,
    level: OutputLevel,
    format: ModuleFormat,
    kind: SourceKind,
) -> Result<BackendOptions, TranspileError> {
    let module_kind = module_kind_for(config, format)?;
    let use_strict_prologue = match module_kind {
        ModuleKind::CommonJs => config.always_strict || !config.no_implicit_use_strict,
        _ => false,
    };
    let jsx_factory = match kind {
        SourceKind::Markup => Some(
            config
                .jsx_factory
                .clone()
                .unwrap_or_else(|| "React.createElement".to_string()),
        ),
        _ => None,
    };
    Ok(BackendOptions {
        level,
        module_kind,
        use_strict_prologue,
        jsx_factory,
        decorators: config.decorators,
    })
}

/// Transpile one module through `backend`.
///
/// `level` is the capability-probed output level for the owning instance;
/// `format` the detected module format. Declaration files short-circuit to
/// empty output without a backend invocation.
pub fn transpile(
    backend: &dyn Backend,
    config: &TranspileConfig,
    level: OutputLevel,
    format: ModuleFormat,
    source: &str,
    path: &Path,
) -> Result<Transpiled, TranspileError> {
    let stamp = format!("{}@{}", backend.name(), backend.version());
    let kind = source_kind(path);

    if kind == SourceKind::Declaration {
        debug!(path = %path.display(), "declaration file, emitting empty module");
        return Ok(Transpiled {
            compiled_text: String::new(),
            position_map: PositionMapBuilder::new(path.display().to_string()).finish(),
            backend_stamp: stamp,
            level,
        });
    }

    let options = derive_options(config, level, format, kind)?;
    debug!(
        path = %path.display(),
        backend = backend.name(),
        level = %options.level,
        module_kind = %options.module_kind,
        "dispatching transpilation"
    );
    let file = path.display().to_string();
    let output = backend.transpile(source, &file, &options)?;
    Ok(Transpiled {
        compiled_text: output.compiled_text,
        position_map: output.position_map,
        backend_stamp: stamp,
        level,
    })
}

//! Failure modes for the interception pipeline

use std::io;
use std::path::PathBuf;

use lode_resolve::scope::ScopeError;
use thiserror::Error;

use crate::context::ContextAnomaly;

/// An error raised while intercepting a resolve or load call
#[derive(Debug, Error)]
pub enum LoadError {
    /// The backend rejected the source with diagnostics.
    #[error("compilation failed: {0}")]
    Compilation(String),

    /// No probed output level worked for the configured backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The host refused a CommonJS require of an ES module. The host's own
    /// message is preserved verbatim so callers see familiar text.
    #[error("{0}")]
    IncompatibleFormat(String),

    /// The host passed a context that deviates from the documented contract
    /// while an instance demands strict compatibility.
    #[error("{0}")]
    ContextAnomaly(ContextAnomaly),

    /// The delegated host chain failed.
    #[error("host error: {0}")]
    Host(String),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("transpilation failed: {0}")]
    Transpile(#[from] lode_transpile::TranspileError),
}

/// An error raised while registering or reconfiguring an instance
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("no registered instance with id {0}")]
    UnknownInstance(u64),

    #[error("invalid target level: {0}")]
    InvalidTarget(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

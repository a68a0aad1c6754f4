//! Backend error types

use thiserror::Error;

use crate::options::OutputLevel;

/// A single diagnostic reported by a backend, positioned in the original
/// source the backend was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the source with diagnostics
    #[error("compilation failed:\n{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The backend does not accept this output level
    #[error("backend '{backend}' does not support output level {level}")]
    UnsupportedLevel {
        backend: String,
        level: OutputLevel,
    },

    /// No output level worked, or the backend cannot run at all
    #[error("backend '{backend}' is unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    /// No backend registered under this identifier
    #[error("unknown backend: '{0}'")]
    UnknownBackend(String),
}

fn format_diagnostics(diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

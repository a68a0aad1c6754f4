//! Transpile dispatch for the lode pipeline.
//!
//! Turns a compiler instance's configuration plus a detected module format
//! into one deterministic backend invocation: variant selection by extension
//! class, module-kind mapping with fail-fast validation, and strict-flag
//! precedence.

pub mod config;
pub mod dispatcher;

pub use config::TranspileConfig;
pub use dispatcher::{
    derive_options, module_kind_for, source_kind, transpile, SourceKind, Transpiled,
    TranspileError,
};

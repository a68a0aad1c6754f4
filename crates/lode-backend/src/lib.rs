//! Pluggable transpilation backends for the lode pipeline.
//!
//! A backend turns superset source text into host-native JavaScript plus a
//! position map, behind the [`Backend`] trait. Backends are constructed
//! through the name-keyed [`BackendRegistry`]; [`probe`] discovers the
//! highest output level a backend actually accepts.

pub mod error;
pub mod null;
pub mod options;
pub mod probe;
pub mod registry;
pub mod strip;

pub use error::{BackendError, Diagnostic};
pub use null::NullBackend;
pub use options::{BackendOptions, ModuleKind, OutputLevel};
pub use probe::probe;
pub use registry::{Backend, BackendOutput, BackendRegistry};
pub use strip::StripBackend;

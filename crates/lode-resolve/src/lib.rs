//! Scope and format resolution for the lode pipeline.
//!
//! Decides which compiler instance owns a file path (directory-scoped,
//! longest prefix wins) and how a candidate module should be evaluated
//! (graph-resolved module vs eagerly loaded script), with the package
//! manifest walk and the classic extension-less resolution ladder.

pub mod classic;
pub mod format;
pub mod manifest;
pub mod scope;

pub use classic::resolve_classic;
pub use format::{Detection, DetectionSource, FormatDetector, ModuleFormat};
pub use manifest::{ManifestCache, PackageManifest};
pub use scope::{InstanceId, ScopeError, ScopeHit, ScopeMap};

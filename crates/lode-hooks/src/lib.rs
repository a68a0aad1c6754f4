//! Module-load interception for a host runtime
//!
//! The registrar in this crate exposes the host's two hook protocol shapes
//! and routes every managed module-load request through scope dispatch,
//! format detection, transpilation, and the record/source-map caches that
//! keep diagnostics faithful to the original source.

pub mod context;
pub mod error;
pub mod identity;
pub mod instance;
pub mod record;
pub mod registrar;

pub use context::{ContextAnomaly, LoadContext, Phase, RawContext, ResolveContext};
pub use error::{LoadError, RegisterError};
pub use identity::ModuleIdentity;
pub use instance::{CompilerInstance, InstanceConfig};
pub use record::{ModuleRecord, RecordStore};
pub use registrar::{HookRegistrar, HostError, InstallHandle, LoadOutput, Resolution};

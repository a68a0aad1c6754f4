//! Backend trait and the name-keyed backend registry

use std::collections::HashMap;

use lode_sourcemap::PositionMap;

use crate::error::BackendError;
use crate::null::NullBackend;
use crate::options::BackendOptions;
use crate::strip::StripBackend;

/// Result of one backend invocation: generated text plus the position map
/// produced by the same invocation. The two always travel together.
#[derive(Debug)]
pub struct BackendOutput {
    pub compiled_text: String,
    pub position_map: PositionMap,
}

/// A pluggable transformer from superset source text to host-native text.
///
/// Backends are constructed by the registry, hold no mutable state, and must
/// be deterministic for identical (source, options, version) triples.
pub trait Backend {
    /// Registry identifier of this backend
    fn name(&self) -> &str;

    /// Version stamp recorded on module records compiled by this backend
    fn version(&self) -> &str;

    /// Transpile one module. `file` is the original source path used for
    /// positions in the output map and in diagnostics.
    fn transpile(
        &self,
        source: &str,
        file: &str,
        options: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

type BackendFactory = Box<dyn Fn() -> Box<dyn Backend>>;

/// Factory registry keyed by backend identifier.
///
/// Backends are resolved explicitly by name at compiler-instance construction
/// time; nothing in the pipeline selects a backend by inspecting types.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// An empty registry with no backends
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The default registry: the `strip` transpiler and the `null`
    /// passthrough backend
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("strip", || Box::new(StripBackend::new()));
        registry.register("null", || Box::new(NullBackend));
        registry
    }

    /// Register a factory under an identifier, replacing any previous one
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Backend> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Construct the backend registered under `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Backend>, BackendError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(BackendError::UnknownBackend(name.to_string())),
        }
    }

    /// Registered backend identifiers, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends_resolve_by_name() {
        let registry = BackendRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["null", "strip"]);

        let backend = registry.create("strip").unwrap();
        assert_eq!(backend.name(), "strip");

        match registry.create("swc") {
            Err(BackendError::UnknownBackend(name)) => assert_eq!(name, "swc"),
            other => panic!("expected UnknownBackend, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = BackendRegistry::empty();
        registry.register("null", || Box::new(NullBackend));
        assert!(registry.create("null").is_ok());
        assert!(registry.create("strip").is_err());
    }
}

//! Directory-scoped instance registry and longest-prefix resolution

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Opaque identifier of a registered compiler instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope directory {0} is already claimed by another instance")]
    DuplicateScope(PathBuf),

    #[error("a global default instance is already registered")]
    DuplicateDefault,

    #[error("ambiguous scope resolution: {0} and {1} match with equal specificity")]
    AmbiguousScope(PathBuf, PathBuf),
}

/// Outcome of resolving a file path to an owning instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeHit {
    /// Owned by the instance claiming the most specific ancestor scope
    Scoped(InstanceId),
    /// No scope matched; the global default instance owns it
    Default(InstanceId),
    /// No scope and no default: the host's own handling applies
    Unmanaged,
}

/// Maps file paths to the owning compiler instance.
///
/// At most one instance claims a given scope directory; nested scopes are
/// allowed and the longest matching directory prefix wins. Releasing an
/// instance frees its claim for re-registration.
#[derive(Debug, Default)]
pub struct ScopeMap {
    scoped: BTreeMap<PathBuf, InstanceId>,
    default: Option<InstanceId>,
}

impl ScopeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a scope directory for an instance
    pub fn register_scoped(&mut self, dir: &Path, id: InstanceId) -> Result<(), ScopeError> {
        let dir = normalize(dir);
        if self.scoped.contains_key(&dir) {
            return Err(ScopeError::DuplicateScope(dir));
        }
        debug!(scope = %dir.display(), instance = id.0, "scope registered");
        self.scoped.insert(dir, id);
        Ok(())
    }

    /// Register the single global default instance
    pub fn register_default(&mut self, id: InstanceId) -> Result<(), ScopeError> {
        if self.default.is_some() {
            return Err(ScopeError::DuplicateDefault);
        }
        self.default = Some(id);
        Ok(())
    }

    /// Release every claim held by an instance
    pub fn release(&mut self, id: InstanceId) {
        self.scoped.retain(|_, owner| *owner != id);
        if self.default == Some(id) {
            self.default = None;
        }
    }

    /// Resolve a file path to its owning instance.
    ///
    /// Scope uniqueness makes a specificity tie impossible; if one is ever
    /// observed the resolution fails loudly instead of picking arbitrarily.
    pub fn resolve(&self, path: &Path) -> Result<ScopeHit, ScopeError> {
        let path = normalize(path);
        let mut best: Option<(&PathBuf, InstanceId)> = None;
        let mut tied: Option<&PathBuf> = None;

        for (dir, id) in &self.scoped {
            if !path.starts_with(dir) {
                continue;
            }
            let depth = dir.components().count();
            match best {
                Some((best_dir, _)) => {
                    let best_depth = best_dir.components().count();
                    if depth > best_depth {
                        best = Some((dir, *id));
                        tied = None;
                    } else if depth == best_depth && dir != best_dir {
                        tied = Some(dir);
                    }
                }
                None => best = Some((dir, *id)),
            }
        }

        if let (Some((best_dir, _)), Some(other)) = (best, tied) {
            return Err(ScopeError::AmbiguousScope(best_dir.clone(), other.clone()));
        }
        Ok(match best {
            Some((_, id)) => ScopeHit::Scoped(id),
            None => match self.default {
                Some(id) => ScopeHit::Default(id),
                None => ScopeHit::Unmanaged,
            },
        })
    }

    /// Whether any instance (scoped or default) is registered
    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty() && self.default.is_none()
    }
}

/// Strip trailing separators and redundant components without touching the
/// filesystem
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins_regardless_of_order() {
        let mut map = ScopeMap::new();
        // Outer scope registered first; inner must still win.
        map.register_scoped(Path::new("/proj/a"), InstanceId(1)).unwrap();
        map.register_scoped(Path::new("/proj/a/b"), InstanceId(2)).unwrap();

        let hit = map.resolve(Path::new("/proj/a/b/mod.ts")).unwrap();
        assert_eq!(hit, ScopeHit::Scoped(InstanceId(2)));

        let hit = map.resolve(Path::new("/proj/a/main.ts")).unwrap();
        assert_eq!(hit, ScopeHit::Scoped(InstanceId(1)));
    }

    #[test]
    fn test_duplicate_scope_rejected() {
        let mut map = ScopeMap::new();
        map.register_scoped(Path::new("/proj"), InstanceId(1)).unwrap();
        let err = map
            .register_scoped(Path::new("/proj/"), InstanceId(2))
            .unwrap_err();
        assert_eq!(err, ScopeError::DuplicateScope(PathBuf::from("/proj")));
    }

    #[test]
    fn test_default_fallback_and_unmanaged() {
        let mut map = ScopeMap::new();
        map.register_scoped(Path::new("/proj"), InstanceId(1)).unwrap();
        assert_eq!(
            map.resolve(Path::new("/elsewhere/x.ts")).unwrap(),
            ScopeHit::Unmanaged
        );

        map.register_default(InstanceId(9)).unwrap();
        assert_eq!(
            map.resolve(Path::new("/elsewhere/x.ts")).unwrap(),
            ScopeHit::Default(InstanceId(9))
        );
        assert_eq!(map.register_default(InstanceId(10)), Err(ScopeError::DuplicateDefault));
    }

    #[test]
    fn test_release_frees_claims() {
        let mut map = ScopeMap::new();
        map.register_scoped(Path::new("/proj"), InstanceId(1)).unwrap();
        map.register_default(InstanceId(1)).unwrap();
        map.release(InstanceId(1));
        assert!(map.is_empty());
        // The directory can be claimed again.
        map.register_scoped(Path::new("/proj"), InstanceId(2)).unwrap();
    }
}

//! Package manifest (`package.json`) loading and the ancestor walk

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, warn};

/// The manifest fields the pipeline consumes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    /// `"module"` marks the package's `.js`/`.ts` files as graph-resolved
    #[serde(rename = "type")]
    pub package_type: Option<String>,
    pub main: Option<String>,
}

impl PackageManifest {
    /// Whether this manifest declares the module (graph-resolved) format
    pub fn declares_module(&self) -> bool {
        self.package_type.as_deref() == Some("module")
    }
}

/// Caching loader for the nearest-ancestor manifest of a file.
///
/// Both hits and misses are cached per directory; a malformed manifest is
/// reported once and treated as absent rather than failing the load.
#[derive(Debug, Default)]
pub struct ManifestCache {
    by_dir: HashMap<PathBuf, Option<Rc<PackageManifest>>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nearest manifest at or above the directory containing `file`
    pub fn nearest(&mut self, file: &Path) -> Option<Rc<PackageManifest>> {
        let start = file.parent()?;
        let mut current = start.to_path_buf();
        let mut walked: Vec<PathBuf> = Vec::new();

        loop {
            if let Some(cached) = self.by_dir.get(&current) {
                let found = cached.clone();
                // Ancestors walked on the way down share the answer.
                for dir in walked {
                    self.by_dir.insert(dir, found.clone());
                }
                return found;
            }

            let candidate = current.join("package.json");
            if candidate.is_file() {
                let manifest = load_manifest(&candidate).map(Rc::new);
                self.by_dir.insert(current.clone(), manifest.clone());
                for dir in walked {
                    self.by_dir.insert(dir, manifest.clone());
                }
                return manifest;
            }

            walked.push(current.clone());
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => {
                    for dir in walked {
                        self.by_dir.insert(dir, None);
                    }
                    return None;
                }
            }
        }
    }
}

fn load_manifest(path: &Path) -> Option<PackageManifest> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read package manifest");
            return None;
        }
    };
    match serde_json::from_str::<PackageManifest>(&content) {
        Ok(manifest) => {
            debug!(path = %path.display(), package_type = ?manifest.package_type, "loaded manifest");
            Some(manifest)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "malformed package manifest ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_nearest_walks_ancestors() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(
            root.join("package.json"),
            r#"{"name":"app","type":"module"}"#,
        )
        .unwrap();
        let nested = root.join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        let mut cache = ManifestCache::new();
        let manifest = cache.nearest(&nested.join("mod.ts")).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("app"));
        assert!(manifest.declares_module());

        // Second lookup is served from the per-directory cache.
        let again = cache.nearest(&nested.join("other.ts")).unwrap();
        assert!(Rc::ptr_eq(&manifest, &again));
    }

    #[test]
    fn test_inner_manifest_shadows_outer() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("package.json"), r#"{"type":"module"}"#).unwrap();
        let pkg = root.join("vendor/legacy");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{"type":"commonjs"}"#).unwrap();

        let mut cache = ManifestCache::new();
        let inner = cache.nearest(&pkg.join("index.ts")).unwrap();
        assert!(!inner.declares_module());
        let outer = cache.nearest(&root.join("main.ts")).unwrap();
        assert!(outer.declares_module());
    }

    #[test]
    fn test_malformed_manifest_treated_as_absent() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("package.json"), "{not json").unwrap();

        let mut cache = ManifestCache::new();
        assert!(cache.nearest(&temp.path().join("x.ts")).is_none());
    }
}

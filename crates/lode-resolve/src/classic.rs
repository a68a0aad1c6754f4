//! Classic (extension-less, CommonJS-style) specifier resolution
//!
//! When an instance enables the legacy resolution mode, relative specifiers
//! without an extension are completed by probing known extensions and
//! directory index files, in order.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Extensions probed in order for extension-less specifiers
const EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

/// Complete an extension-less relative or absolute specifier against the
/// importing file's directory. Returns `None` when nothing on disk matches
/// (the caller defers to the host's own resolution error).
pub fn resolve_classic(specifier: &str, parent: &Path) -> Option<PathBuf> {
    if !(specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/'))
    {
        return None;
    }

    let base = if specifier.starts_with('/') {
        PathBuf::from(specifier)
    } else {
        parent.parent()?.join(specifier)
    };

    // Exact file as written.
    if base.is_file() {
        return Some(base);
    }

    // The path with each known extension appended. Appending, not
    // replacing: `./util.config` probes `util.config.ts`, never `util.ts`.
    for ext in EXTENSIONS {
        let with_ext = append_extension(&base, ext);
        if with_ext.is_file() {
            debug!(specifier, resolved = %with_ext.display(), "classic resolution matched");
            return Some(with_ext);
        }
    }

    // A directory with an index file.
    if base.is_dir() {
        for ext in EXTENSIONS {
            let index = base.join(format!("index.{ext}"));
            if index.is_file() {
                debug!(specifier, resolved = %index.display(), "classic resolution matched index");
                return Some(index);
            }
        }
    }

    None
}

fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{ext}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extension_probing_order() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("util.ts"), "export const x = 1;").unwrap();
        fs::write(root.join("util.js"), "exports.x = 1;").unwrap();

        let parent = root.join("main.ts");
        let resolved = resolve_classic("./util", &parent).unwrap();
        // .ts beats .js in probe order.
        assert_eq!(resolved, root.join("util.ts"));
    }

    #[test]
    fn test_directory_index() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("lib/index.tsx"), "export {};").unwrap();

        let resolved = resolve_classic("./lib", &root.join("main.ts")).unwrap();
        assert_eq!(resolved, root.join("lib/index.tsx"));
    }

    #[test]
    fn test_bare_specifiers_decline() {
        let temp = tempfile::tempdir().unwrap();
        assert!(resolve_classic("lodash", &temp.path().join("main.ts")).is_none());
    }

    #[test]
    fn test_dotted_specifier_appends_extension() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("util.config.ts"), "export {};").unwrap();

        let resolved = resolve_classic("./util.config", &root.join("main.ts")).unwrap();
        assert_eq!(resolved, root.join("util.config.ts"));
    }

    #[test]
    fn test_dotted_specifier_never_swaps_suffix() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        // Only `util.ts` exists; `./util.config` must not resolve to it.
        fs::write(root.join("util.ts"), "export {};").unwrap();

        assert!(resolve_classic("./util.config", &root.join("main.ts")).is_none());
    }
}

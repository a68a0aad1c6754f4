//! Module identity: normalized URL plus distinguishing suffix

use std::fmt;
use std::path::PathBuf;

use url::Url;

/// The cache key for a module record.
///
/// Two identities with the same base path but different query/fragment
/// suffixes are distinct: each is independently transpiled and independently
/// executed by the host. Appending a fresh suffix is the sanctioned way to
/// re-run a module's top-level side effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    url: Url,
}

impl ModuleIdentity {
    /// Parse a `file:` URL (suffix preserved). Returns `None` for schemes
    /// this pipeline does not own.
    pub fn parse(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        if parsed.scheme() != "file" {
            return None;
        }
        Some(Self { url: parsed })
    }

    /// Identity for a filesystem path with an optional suffix
    pub fn from_path(path: &std::path::Path, suffix: Option<&str>) -> Option<Self> {
        let mut url = Url::from_file_path(path).ok()?;
        if let Some(suffix) = suffix {
            match suffix.split_once('#') {
                Some((query, fragment)) => {
                    if !query.is_empty() {
                        url.set_query(Some(query));
                    }
                    url.set_fragment(Some(fragment));
                }
                None => url.set_query(Some(suffix)),
            }
        }
        Some(Self { url })
    }

    /// Full normalized URL, including any suffix
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The distinguishing suffix (query string), if any
    pub fn suffix(&self) -> Option<&str> {
        self.url.query()
    }

    /// Filesystem path of the underlying file, percent-decoded
    pub fn path(&self) -> Option<PathBuf> {
        self.url.to_file_path().ok()
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_suffix_distinguishes_identities() {
        let plain = ModuleIdentity::parse("file:///src/task.ts").unwrap();
        let v1 = ModuleIdentity::parse("file:///src/task.ts?v=1").unwrap();
        let v2 = ModuleIdentity::parse("file:///src/task.ts?v=2").unwrap();

        assert_ne!(plain, v1);
        assert_ne!(v1, v2);
        // Same underlying file for all three.
        assert_eq!(plain.path(), v1.path());
        assert_eq!(v1.suffix(), Some("v=1"));
    }

    #[test]
    fn test_foreign_schemes_rejected() {
        assert!(ModuleIdentity::parse("data:text/javascript,1").is_none());
        assert!(ModuleIdentity::parse("node:fs").is_none());
        assert!(ModuleIdentity::parse("not a url").is_none());
    }

    #[test]
    fn test_from_path_round_trip() {
        let id = ModuleIdentity::from_path(Path::new("/src/my app.ts"), Some("v=1")).unwrap();
        assert_eq!(id.as_str(), "file:///src/my%20app.ts?v=1");
        assert_eq!(id.path().unwrap(), Path::new("/src/my app.ts"));
    }
}

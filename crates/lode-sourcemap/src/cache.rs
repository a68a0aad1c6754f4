//! Per-module source map cache and stack frame rewriting

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;
use url::Url;

use crate::position_map::{OriginalPosition, PositionMap};

/// Stores the position map for every compiled module and rewrites stack
/// frames that point into generated text back to original source positions.
///
/// Maps are recorded once per module identity and never replaced; the cache
/// is append-only so re-entrant loads observe either nothing or the finished
/// map, never a partial one.
#[derive(Debug, Default)]
pub struct SourceMapCache {
    maps: HashMap<String, Rc<PositionMap>>,
}

impl SourceMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the position map for a module identity.
    ///
    /// The identity may be a `file:` URL (with or without a query suffix) or
    /// a plain filesystem path; frames in either spelling will match. The
    /// first map recorded for an identity wins.
    pub fn record(&mut self, identity: &str, map: Rc<PositionMap>) {
        let key = normalize_frame_file(identity);
        if self.maps.contains_key(&key) {
            return;
        }
        debug!(identity = %key, entries = map.len(), "recorded source map");
        self.maps.insert(key, map);
    }

    /// Whether a map has been recorded for this identity
    pub fn contains(&self, identity: &str) -> bool {
        self.maps.contains_key(&normalize_frame_file(identity))
    }

    /// Rewrite one stack frame. Returns `None` when the file matches no
    /// recorded identity (the caller leaves the frame untouched).
    pub fn rewrite_frame(&self, file: &str, line: u32, column: u32) -> Option<OriginalPosition> {
        let key = normalize_frame_file(file);
        let map = self.maps.get(&key).or_else(|| {
            // A frame carrying a query suffix still maps through the base
            // module's map when the suffixed identity was not recorded.
            strip_suffix_key(&key).and_then(|base| self.maps.get(base))
        })?;
        map.lookup(line, column)
    }

    /// Rewrite every frame of a host stack trace whose file has a recorded
    /// map. Lines that are not frames, or frames outside managed identities,
    /// pass through byte-identical.
    pub fn rewrite_trace(&self, trace: &str) -> String {
        let mut out = String::with_capacity(trace.len());
        let mut first = true;
        for line in trace.lines() {
            if !first {
                out.push('\n');
            }
            first = false;
            match self.rewrite_trace_line(line) {
                Some(rewritten) => out.push_str(&rewritten),
                None => out.push_str(line),
            }
        }
        if trace.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    fn rewrite_trace_line(&self, line: &str) -> Option<String> {
        let trimmed = line.trim_start();
        let rest = trimmed.strip_prefix("at ")?;

        // Either "at name (file:L:C)" or "at file:L:C".
        let (site, parens) = match (rest.rfind('('), rest.ends_with(')')) {
            (Some(open), true) => (&rest[open + 1..rest.len() - 1], Some(&rest[..open])),
            _ => (rest, None),
        };

        let (file, frame_line, frame_col) = split_site(site)?;
        let orig = self.rewrite_frame(file, frame_line, frame_col)?;

        let indent = &line[..line.len() - trimmed.len()];
        Some(match parens {
            Some(head) => format!(
                "{}at {}({}:{}:{})",
                indent, head, orig.file, orig.line, orig.column
            ),
            None => format!("{}at {}:{}:{}", indent, orig.file, orig.line, orig.column),
        })
    }
}

/// Split a call-site string into (file, line, column)
fn split_site(site: &str) -> Option<(&str, u32, u32)> {
    let col_sep = site.rfind(':')?;
    let column: u32 = site[col_sep + 1..].parse().ok()?;
    let line_sep = site[..col_sep].rfind(':')?;
    let line: u32 = site[line_sep + 1..col_sep].parse().ok()?;
    Some((&site[..line_sep], line, column))
}

/// Normalize a frame's file spelling to a cache key.
///
/// `file:` URLs become percent-decoded filesystem paths (encoded spaces and
/// friends restored to their literal form) with any query suffix re-attached;
/// plain paths pass through unchanged.
fn normalize_frame_file(file: &str) -> String {
    if !file.starts_with("file:") {
        return file.to_string();
    }
    let Ok(parsed) = Url::parse(file) else {
        return file.to_string();
    };
    let suffix = parsed.query().map(|q| format!("?{}", q)).unwrap_or_default();
    match parsed.to_file_path() {
        Ok(path) => format!("{}{}", path.display(), suffix),
        Err(()) => file.to_string(),
    }
}

/// The base key of a suffixed key ("/a.ts?v=2" -> "/a.ts")
fn strip_suffix_key(key: &str) -> Option<&str> {
    key.find('?').map(|i| &key[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position_map::PositionMapBuilder;

    fn map_for(file: &str, entries: &[(u32, u32, u32, u32)]) -> Rc<PositionMap> {
        let mut b = PositionMapBuilder::new(file);
        for &(gl, gc, ol, oc) in entries {
            b.add_mapping(gl, gc, ol, oc);
        }
        Rc::new(b.finish())
    }

    #[test]
    fn test_record_and_rewrite_frame() {
        let mut cache = SourceMapCache::new();
        cache.record("/src/app.ts", map_for("/src/app.ts", &[(5, 1, 7, 3)]));

        let orig = cache.rewrite_frame("/src/app.ts", 5, 10).unwrap();
        assert_eq!(orig.file, "/src/app.ts");
        assert_eq!((orig.line, orig.column), (7, 12));

        assert!(cache.rewrite_frame("/src/other.ts", 5, 10).is_none());
    }

    #[test]
    fn test_file_url_frames_match_path_records() {
        let mut cache = SourceMapCache::new();
        cache.record(
            "file:///src/my%20app.ts",
            map_for("/src/my app.ts", &[(1, 1, 1, 1)]),
        );

        // Encoded space decoded back to its literal form.
        let orig = cache.rewrite_frame("/src/my app.ts", 1, 4).unwrap();
        assert_eq!(orig.file, "/src/my app.ts");

        let orig = cache.rewrite_frame("file:///src/my%20app.ts", 1, 4).unwrap();
        assert_eq!((orig.line, orig.column), (1, 4));
    }

    #[test]
    fn test_first_record_wins() {
        let mut cache = SourceMapCache::new();
        cache.record("/a.ts", map_for("/a.ts", &[(1, 1, 10, 1)]));
        cache.record("/a.ts", map_for("/a.ts", &[(1, 1, 99, 1)]));

        assert_eq!(cache.rewrite_frame("/a.ts", 1, 1).unwrap().line, 10);
    }

    #[test]
    fn test_suffixed_frame_falls_back_to_base_map() {
        let mut cache = SourceMapCache::new();
        cache.record("/a.ts", map_for("/a.ts", &[(2, 1, 4, 1)]));

        let orig = cache.rewrite_frame("file:///a.ts?v=2", 2, 1).unwrap();
        assert_eq!(orig.line, 4);
    }

    #[test]
    fn test_rewrite_trace_mixed_frames() {
        let mut cache = SourceMapCache::new();
        cache.record("/src/app.ts", map_for("/src/app.ts", &[(2, 1, 3, 1)]));

        let trace = "Error: boom\n    at doWork (/src/app.ts:2:5)\n    at /src/app.ts:2:11\n    at node:internal/modules/run_main:1:1";
        let rewritten = cache.rewrite_trace(trace);
        let lines: Vec<&str> = rewritten.lines().collect();

        assert_eq!(lines[0], "Error: boom");
        assert_eq!(lines[1], "    at doWork (/src/app.ts:3:5)");
        assert_eq!(lines[2], "    at /src/app.ts:3:11");
        // Frames outside managed identities pass through unchanged.
        assert_eq!(lines[3], "    at node:internal/modules/run_main:1:1");
    }
}

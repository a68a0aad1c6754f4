//! Position maps from generated text back to original source

/// A position in the original source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    /// Path of the original source file
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

/// A single mapping entry: a point in the generated text and the original
/// point it corresponds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mapping {
    gen_line: u32,
    gen_col: u32,
    orig_line: u32,
    orig_col: u32,
}

/// Ordered mapping from generated (line, column) to original (line, column)
/// for a single compiled module.
///
/// Built once by the backend invocation that produced the compiled text and
/// never mutated afterwards. Lookups resolve a generated position to the
/// nearest preceding mapping on the same generated line and carry the column
/// offset across.
#[derive(Debug, Clone)]
pub struct PositionMap {
    file: String,
    mappings: Vec<Mapping>,
}

impl PositionMap {
    /// The original source file this map points back into
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Number of mapping entries
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Resolve a generated (line, column) to the original position.
    ///
    /// Returns `None` when no mapping exists on the generated line at or
    /// before the requested column.
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        // Mappings are sorted by (gen_line, gen_col); find the last entry on
        // this line with gen_col <= column.
        let idx = self
            .mappings
            .partition_point(|m| (m.gen_line, m.gen_col) <= (line, column));
        if idx == 0 {
            return None;
        }
        let m = self.mappings[idx - 1];
        if m.gen_line != line {
            return None;
        }
        Some(OriginalPosition {
            file: self.file.clone(),
            line: m.orig_line,
            column: m.orig_col + (column - m.gen_col),
        })
    }
}

/// Incrementally builds a [`PositionMap`]; `finish` freezes it.
#[derive(Debug)]
pub struct PositionMapBuilder {
    file: String,
    mappings: Vec<Mapping>,
}

impl PositionMapBuilder {
    /// Start a map for the given original source file
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            mappings: Vec::new(),
        }
    }

    /// Record that generated (line, col) corresponds to original (line, col).
    /// Positions are 1-based.
    pub fn add_mapping(&mut self, gen_line: u32, gen_col: u32, orig_line: u32, orig_col: u32) {
        self.mappings.push(Mapping {
            gen_line,
            gen_col,
            orig_line,
            orig_col,
        });
    }

    /// Record a 1:1 mapping for every line of an unchanged region
    pub fn add_identity_lines(&mut self, first_line: u32, last_line: u32) {
        for line in first_line..=last_line {
            self.add_mapping(line, 1, line, 1);
        }
    }

    /// Freeze the map. Entries are sorted by generated position.
    pub fn finish(mut self) -> PositionMap {
        self.mappings
            .sort_by_key(|m| (m.gen_line, m.gen_col));
        PositionMap {
            file: self.file,
            mappings: self.mappings,
        }
    }
}

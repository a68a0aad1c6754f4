//! Backend configuration types

use std::fmt;
use std::str::FromStr;

/// Language output level, ordered oldest to newest.
///
/// The derive order is the downgrade ladder used by capability probing:
/// `Es3` is the floor, `EsNext` the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputLevel {
    Es3,
    Es5,
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2019,
    Es2020,
    Es2021,
    Es2022,
    EsNext,
}

impl OutputLevel {
    /// The next lower level on the ladder, `None` below the floor
    pub fn next_lower(self) -> Option<OutputLevel> {
        use OutputLevel::*;
        match self {
            Es3 => None,
            Es5 => Some(Es3),
            Es2015 => Some(Es5),
            Es2016 => Some(Es2015),
            Es2017 => Some(Es2016),
            Es2018 => Some(Es2017),
            Es2019 => Some(Es2018),
            Es2020 => Some(Es2019),
            Es2021 => Some(Es2020),
            Es2022 => Some(Es2021),
            EsNext => Some(Es2022),
        }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputLevel::Es3 => "es3",
            OutputLevel::Es5 => "es5",
            OutputLevel::Es2015 => "es2015",
            OutputLevel::Es2016 => "es2016",
            OutputLevel::Es2017 => "es2017",
            OutputLevel::Es2018 => "es2018",
            OutputLevel::Es2019 => "es2019",
            OutputLevel::Es2020 => "es2020",
            OutputLevel::Es2021 => "es2021",
            OutputLevel::Es2022 => "es2022",
            OutputLevel::EsNext => "esnext",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "es3" => Ok(OutputLevel::Es3),
            "es5" => Ok(OutputLevel::Es5),
            "es6" | "es2015" => Ok(OutputLevel::Es2015),
            "es2016" => Ok(OutputLevel::Es2016),
            "es2017" => Ok(OutputLevel::Es2017),
            "es2018" => Ok(OutputLevel::Es2018),
            "es2019" => Ok(OutputLevel::Es2019),
            "es2020" => Ok(OutputLevel::Es2020),
            "es2021" => Ok(OutputLevel::Es2021),
            "es2022" => Ok(OutputLevel::Es2022),
            "esnext" => Ok(OutputLevel::EsNext),
            other => Err(format!("unknown output level: {}", other)),
        }
    }
}

/// Module kind a backend can emit.
///
/// This is the small fixed set the pipeline can represent; host module kinds
/// outside it are rejected before reaching a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    CommonJs,
    Es2015,
    Es2020,
    EsNext,
    Node16,
}

impl ModuleKind {
    /// Whether this kind emits static import/export edges
    pub fn is_esm(self) -> bool {
        !matches!(self, ModuleKind::CommonJs)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::CommonJs => "commonjs",
            ModuleKind::Es2015 => "es2015",
            ModuleKind::Es2020 => "es2020",
            ModuleKind::EsNext => "esnext",
            ModuleKind::Node16 => "node16",
        };
        f.write_str(name)
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "commonjs" | "cjs" => Ok(ModuleKind::CommonJs),
            "es6" | "es2015" => Ok(ModuleKind::Es2015),
            "es2020" => Ok(ModuleKind::Es2020),
            "esnext" => Ok(ModuleKind::EsNext),
            "node16" => Ok(ModuleKind::Node16),
            other => Err(format!("unknown module kind: {}", other)),
        }
    }
}

/// Fully resolved options for one backend invocation.
///
/// Derived deterministically by the dispatcher from a compiler instance's
/// configuration; two invocations with equal options and equal source on the
/// same backend version produce identical output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    pub level: OutputLevel,
    pub module_kind: ModuleKind,
    /// Prepend a `"use strict"` prologue to the generated text
    pub use_strict_prologue: bool,
    /// Factory callee for lowering markup expressions; `None` disables the
    /// markup variant entirely
    pub jsx_factory: Option<String>,
    /// Accept decorator syntax (stripped, not emitted)
    pub decorators: bool,
}

impl BackendOptions {
    /// Options for a minimal no-op probe at the given level
    pub fn probe(level: OutputLevel) -> Self {
        Self {
            level,
            module_kind: ModuleKind::EsNext,
            use_strict_prologue: false,
            jsx_factory: None,
            decorators: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order_matches_ladder() {
        assert!(OutputLevel::Es3 < OutputLevel::Es5);
        assert!(OutputLevel::Es2021 < OutputLevel::Es2022);
        assert!(OutputLevel::Es2022 < OutputLevel::EsNext);
    }

    #[test]
    fn test_next_lower_walks_to_floor() {
        let mut level = OutputLevel::EsNext;
        let mut steps = 0;
        while let Some(lower) = level.next_lower() {
            assert!(lower < level);
            level = lower;
            steps += 1;
        }
        assert_eq!(level, OutputLevel::Es3);
        assert_eq!(steps, 10);
    }

    #[test]
    fn test_parse_round_trip() {
        for name in ["es5", "es2015", "es2022", "esnext"] {
            let level: OutputLevel = name.parse().unwrap();
            assert_eq!(level.to_string(), name);
        }
        assert!("es1999".parse::<OutputLevel>().is_err());
        assert_eq!("cjs".parse::<ModuleKind>().unwrap(), ModuleKind::CommonJs);
    }
}

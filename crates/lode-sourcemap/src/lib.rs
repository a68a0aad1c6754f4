//! Source map support for the lode pipeline.
//!
//! Position maps record how a backend's generated JavaScript relates to the
//! original superset source; the cache rewrites stack frames from generated
//! positions back to original ones so diagnostics stay faithful.

pub mod cache;
pub mod position_map;

pub use cache::SourceMapCache;
pub use position_map::{OriginalPosition, PositionMap, PositionMapBuilder};

//! Passthrough backend for sources that are already host-native

use lode_sourcemap::PositionMapBuilder;

use crate::error::BackendError;
use crate::options::BackendOptions;
use crate::registry::{Backend, BackendOutput};

/// Returns the source unchanged with an identity position map. Used for
/// plain JavaScript under a managed scope and as a fixture in tests.
#[derive(Debug, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn version(&self) -> &str {
        "1"
    }

    fn transpile(
        &self,
        source: &str,
        file: &str,
        _options: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let mut map = PositionMapBuilder::new(file);
        let lines = source.lines().count().max(1) as u32;
        map.add_identity_lines(1, lines);
        Ok(BackendOutput {
            compiled_text: source.to_string(),
            position_map: map.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BackendOptions, OutputLevel};

    #[test]
    fn test_passthrough_is_identity() {
        let source = "const x = 1;\nconsole.log(x);\n";
        let out = NullBackend
            .transpile(source, "/a.js", &BackendOptions::probe(OutputLevel::EsNext))
            .unwrap();
        assert_eq!(out.compiled_text, source);

        let orig = out.position_map.lookup(2, 9).unwrap();
        assert_eq!((orig.line, orig.column), (2, 9));
    }
}

//! Capability probing: find the highest output level a backend accepts

use tracing::{debug, warn};

use crate::error::BackendError;
use crate::options::{BackendOptions, OutputLevel};
use crate::registry::Backend;

/// Walk the level ladder downwards from `requested` until the backend
/// accepts a minimal no-op transpilation.
///
/// Every attempt is an ordinary `Result`; the first success wins and the
/// returned level never exceeds what the backend actually accepts. Exhausting
/// the ladder is `BackendError::Unavailable`.
///
/// The result is not memoized here. Callers that own the backend for its
/// whole lifetime may cache it, which is safe as long as the backend's
/// accepted levels cannot change after construction.
pub fn probe(backend: &dyn Backend, requested: OutputLevel) -> Result<OutputLevel, BackendError> {
    let mut level = requested;
    loop {
        match backend.transpile("", "<probe>", &BackendOptions::probe(level)) {
            Ok(_) => {
                if level < requested {
                    warn!(
                        backend = backend.name(),
                        requested = %requested,
                        settled = %level,
                        "backend does not support requested output level, downgraded"
                    );
                } else {
                    debug!(backend = backend.name(), level = %level, "capability probe settled");
                }
                return Ok(level);
            }
            Err(err) => {
                debug!(
                    backend = backend.name(),
                    level = %level,
                    error = %err,
                    "capability probe attempt failed"
                );
                match level.next_lower() {
                    Some(lower) => level = lower,
                    None => {
                        return Err(BackendError::Unavailable {
                            backend: backend.name().to_string(),
                            reason: format!(
                                "no output level between {} and {} is accepted",
                                OutputLevel::Es3,
                                requested
                            ),
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BackendOutput;
    use crate::strip::StripBackend;

    /// Backend that rejects every level
    struct BrokenBackend;

    impl Backend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        fn version(&self) -> &str {
            "0"
        }

        fn transpile(
            &self,
            _source: &str,
            _file: &str,
            _options: &BackendOptions,
        ) -> Result<BackendOutput, BackendError> {
            Err(BackendError::Unavailable {
                backend: "broken".to_string(),
                reason: "always fails".to_string(),
            })
        }
    }

    #[test]
    fn test_probe_settles_at_requested() {
        let backend = StripBackend::new();
        let level = probe(&backend, OutputLevel::Es2022).unwrap();
        assert_eq!(level, OutputLevel::Es2022);
    }

    #[test]
    fn test_probe_downgrades_to_supported() {
        // Supports only levels up to es2015; es2020 requested must settle on
        // es2015, never silently accept es2020.
        let backend = StripBackend::with_max_level(OutputLevel::Es2015);
        let level = probe(&backend, OutputLevel::Es2020).unwrap();
        assert_eq!(level, OutputLevel::Es2015);
    }

    #[test]
    fn test_probe_exhaustion_is_unavailable() {
        let err = probe(&BrokenBackend, OutputLevel::Es5).unwrap_err();
        match err {
            BackendError::Unavailable { backend, .. } => assert_eq!(backend, "broken"),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}

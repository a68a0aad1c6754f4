//! Hook registrar: the pipeline's entry point for host module-load traffic
//!
//! The registrar exposes both protocol shapes the host can speak (the
//! legacy single-phase hook and the modern resolve/load pair), dispatches
//! each call to the owning compiler instance by scope, and coordinates the
//! record, source-map, and capability caches.
//!
//! State lives behind a single `Rc<RefCell<..>>`: the host drives a
//! single-threaded cooperative loop, so re-entrant calls interleave rather
//! than race. Delegation to the host (`next`) always happens with no
//! borrow held, so a nested hook call re-entering this registrar never
//! observes a locked cell.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::rc::Rc;

use tracing::{debug, warn};

use lode_backend::{BackendError, BackendRegistry};
use lode_resolve::{resolve_classic, Detection, FormatDetector, InstanceId, ModuleFormat, ScopeHit, ScopeMap};
use lode_sourcemap::{OriginalPosition, SourceMapCache};
use lode_transpile::TranspileError;

use crate::context::{validate, LoadContext, Phase, RawContext, ResolveContext};
use crate::error::{LoadError, RegisterError};
use crate::identity::ModuleIdentity;
use crate::instance::{CompilerInstance, InstanceConfig};
use crate::record::{ModuleRecord, RecordStore};

/// What the resolve phase hands back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    /// Wire-name format hint, or `None` when the host should decide
    pub format: Option<String>,
}

/// What the load phase hands back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutput {
    pub format: String,
    pub source: String,
}

/// A failure reported by the delegated host chain
#[derive(Debug, Clone)]
pub struct HostError {
    /// Host error code, e.g. `ERR_REQUIRE_ESM`
    pub code: Option<String>,
    pub message: String,
}

fn host_failure(err: HostError) -> LoadError {
    // The host's own text for an eager require of a graph-format module is
    // preserved verbatim.
    if err.code.as_deref() == Some("ERR_REQUIRE_ESM") {
        LoadError::IncompatibleFormat(err.message)
    } else {
        LoadError::Host(err.message)
    }
}

struct Inner {
    scopes: ScopeMap,
    instances: HashMap<InstanceId, CompilerInstance>,
    next_instance: u64,
    installs: HashSet<u64>,
    next_install: u64,
    records: RecordStore,
    source_maps: SourceMapCache,
    detector: FormatDetector,
    registry: BackendRegistry,
}

/// Top-level pipeline object. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct HookRegistrar {
    inner: Rc<RefCell<Inner>>,
}

/// Proof of one live installation. Interception stays active while any
/// handle is alive; dropping (or explicitly uninstalling) the last handle
/// returns all traffic to the host untouched.
pub struct InstallHandle {
    registrar: HookRegistrar,
    id: u64,
    released: bool,
}

impl InstallHandle {
    pub fn uninstall(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let mut inner = self.registrar.inner.borrow_mut();
            inner.installs.remove(&self.id);
            debug!(handle = self.id, remaining = inner.installs.len(), "hook handle released");
        }
    }
}

impl Drop for InstallHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl HookRegistrar {
    pub fn new() -> Self {
        Self::with_registry(BackendRegistry::with_builtins())
    }

    pub fn with_registry(registry: BackendRegistry) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                scopes: ScopeMap::new(),
                instances: HashMap::new(),
                next_instance: 1,
                installs: HashSet::new(),
                next_install: 1,
                records: RecordStore::new(),
                source_maps: SourceMapCache::new(),
                detector: FormatDetector::new(),
                registry,
            })),
        }
    }

    /// Activate interception. Handles nest: each caller installs and later
    /// uninstalls independently without disturbing the others.
    pub fn install(&self) -> InstallHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_install;
        inner.next_install += 1;
        inner.installs.insert(id);
        debug!(handle = id, active = inner.installs.len(), "hook handle installed");
        InstallHandle {
            registrar: self.clone(),
            id,
            released: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        !self.inner.borrow().installs.is_empty()
    }

    /// Register a compiler instance and claim its scope.
    ///
    /// The configured backend must exist in the registry; an unknown name
    /// fails here rather than on the first load.
    pub fn register_instance(&self, config: InstanceConfig) -> Result<InstanceId, RegisterError> {
        let mut inner = self.inner.borrow_mut();
        inner
            .registry
            .create(&config.transpile.backend)
            .map_err(|e| RegisterError::BackendUnavailable(e.to_string()))?;

        let id = InstanceId(inner.next_instance);
        match &config.scope {
            Some(dir) => inner.scopes.register_scoped(dir, id)?,
            None => inner.scopes.register_default(id)?,
        }
        inner.next_instance += 1;
        inner.instances.insert(id, CompilerInstance::new(config));
        Ok(id)
    }

    /// Flip an instance's enabled flag. Takes effect on the very next
    /// resolve or load call.
    pub fn set_enabled(&self, id: InstanceId, enabled: bool) -> Result<(), RegisterError> {
        let mut inner = self.inner.borrow_mut();
        let instance = inner
            .instances
            .get_mut(&id)
            .ok_or(RegisterError::UnknownInstance(id.0))?;
        instance.set_enabled(enabled);
        Ok(())
    }

    /// Terminal: drop the instance and release its scope claim. Existing
    /// module records and source maps survive.
    pub fn unregister(&self, id: InstanceId) -> Result<(), RegisterError> {
        let mut inner = self.inner.borrow_mut();
        if inner.instances.remove(&id).is_none() {
            return Err(RegisterError::UnknownInstance(id.0));
        }
        inner.scopes.release(id);
        Ok(())
    }

    /// Modern resolve phase.
    ///
    /// `next` is the host's own resolver chain; it is always consulted
    /// unless classic resolution completes the specifier first.
    pub fn resolve<N>(
        &self,
        specifier: &str,
        context: &RawContext,
        mut next: N,
    ) -> Result<Resolution, LoadError>
    where
        N: FnMut(&str, &RawContext) -> Result<Resolution, HostError>,
    {
        if !self.is_installed() {
            return next(specifier, context).map_err(host_failure);
        }

        let ctx = ResolveContext::from_raw(context);
        if let Some(anomaly) = validate(context, Phase::Resolve) {
            self.report_anomaly(anomaly, ctx.parent_url.as_deref())?;
        }

        if let Some(resolution) = self.classic_completion(specifier, ctx.parent_url.as_deref())? {
            return Ok(resolution);
        }

        let resolved = next(specifier, context).map_err(host_failure)?;
        let format = self.managed_format(&resolved.url, None)?;
        Ok(Resolution {
            format: format.or(resolved.format),
            url: resolved.url,
        })
    }

    /// Modern load phase.
    ///
    /// Foreign schemes, unmanaged paths, disabled instances, and host-native
    /// file kinds all delegate to `next`; the host's resulting error (if
    /// any) is never swallowed.
    pub fn load<N>(
        &self,
        url: &str,
        context: &RawContext,
        mut next: N,
    ) -> Result<LoadOutput, LoadError>
    where
        N: FnMut(&str, &RawContext) -> Result<LoadOutput, HostError>,
    {
        if !self.is_installed() {
            return next(url, context).map_err(host_failure);
        }

        let ctx = LoadContext::from_raw(context);
        if let Some(anomaly) = validate(context, Phase::Load) {
            self.report_anomaly(anomaly, Some(url))?;
        }

        let identity = match ModuleIdentity::parse(url) {
            Some(identity) => identity,
            None => return next(url, context).map_err(host_failure),
        };

        match self.load_managed(&identity, &ctx)? {
            Some(output) => Ok(output),
            None => next(url, context).map_err(host_failure),
        }
    }

    /// Legacy single-phase hook: resolve with a synthesized context. The
    /// caller follows up with `load` on the returned URL, mirroring how the
    /// merged shape funnels into the two-phase pipeline.
    pub fn resolve_legacy<N>(
        &self,
        specifier: &str,
        parent_identity: Option<&str>,
        default_resolve: N,
    ) -> Result<Resolution, LoadError>
    where
        N: FnMut(&str, &RawContext) -> Result<Resolution, HostError>,
    {
        let context = RawContext::resolve(&["node", "import"], &[], parent_identity);
        self.resolve(specifier, &context, default_resolve)
    }

    /// Rewrite one stack frame to its original position, or `None` if the
    /// file matches no compiled identity.
    pub fn rewrite_frame(&self, file: &str, line: u32, column: u32) -> Option<OriginalPosition> {
        self.inner.borrow().source_maps.rewrite_frame(file, line, column)
    }

    /// Rewrite every managed frame of a host stack trace.
    pub fn rewrite_trace(&self, trace: &str) -> String {
        self.inner.borrow().source_maps.rewrite_trace(trace)
    }

    /// The record produced for an identity, if one exists yet
    pub fn record(&self, identity: &ModuleIdentity) -> Option<Rc<ModuleRecord>> {
        self.inner.borrow().records.get(identity)
    }

    fn report_anomaly(
        &self,
        anomaly: crate::context::ContextAnomaly,
        reference: Option<&str>,
    ) -> Result<(), LoadError> {
        let strict = reference
            .and_then(ModuleIdentity::parse)
            .and_then(|id| id.path())
            .map(|path| {
                let inner = self.inner.borrow();
                match inner.scopes.resolve(&path) {
                    Ok(ScopeHit::Scoped(id)) | Ok(ScopeHit::Default(id)) => inner
                        .instances
                        .get(&id)
                        .map(|i| i.config.strict_compat)
                        .unwrap_or(false),
                    _ => false,
                }
            })
            .unwrap_or(false);
        if strict {
            Err(LoadError::ContextAnomaly(anomaly))
        } else {
            warn!(%anomaly, "tolerating host context anomaly");
            Ok(())
        }
    }

    /// Extension-less completion of relative specifiers, for instances that
    /// opt into classic resolution. Returns `Ok(None)` to fall through to
    /// the host's resolver.
    fn classic_completion(
        &self,
        specifier: &str,
        parent_url: Option<&str>,
    ) -> Result<Option<Resolution>, LoadError> {
        let parent_path = match parent_url
            .and_then(ModuleIdentity::parse)
            .and_then(|id| id.path())
        {
            Some(path) => path,
            None => return Ok(None),
        };

        let inner = &mut *self.inner.borrow_mut();
        let id = match inner.scopes.resolve(&parent_path)? {
            ScopeHit::Scoped(id) | ScopeHit::Default(id) => id,
            ScopeHit::Unmanaged => return Ok(None),
        };
        let instance = match inner.instances.get(&id) {
            Some(instance) => instance,
            None => return Ok(None),
        };
        if !instance.is_enabled() || !instance.config.classic_resolution {
            return Ok(None);
        }
        let default_format = instance.config.default_format;

        let found = match resolve_classic(specifier, &parent_path) {
            Some(path) => path,
            None => return Ok(None),
        };
        let identity = match ModuleIdentity::from_path(&found, None) {
            Some(identity) => identity,
            None => return Ok(None),
        };
        let format = match inner.detector.detect(identity.as_str(), None, default_format) {
            Detection::Format(format, _) => Some(format.wire_name().to_string()),
            Detection::Defer => None,
        };
        Ok(Some(Resolution {
            url: identity.as_str().to_string(),
            format,
        }))
    }

    /// Format hint for a resolved URL, when it falls under an enabled
    /// managed scope
    fn managed_format(
        &self,
        url: &str,
        asserted: Option<ModuleFormat>,
    ) -> Result<Option<String>, LoadError> {
        let identity = match ModuleIdentity::parse(url) {
            Some(identity) => identity,
            None => return Ok(None),
        };
        let path = match identity.path() {
            Some(path) => path,
            None => return Ok(None),
        };

        let inner = &mut *self.inner.borrow_mut();
        let id = match inner.scopes.resolve(&path)? {
            ScopeHit::Scoped(id) | ScopeHit::Default(id) => id,
            ScopeHit::Unmanaged => return Ok(None),
        };
        let default_format = match inner.instances.get(&id) {
            Some(instance) if instance.is_enabled() => instance.config.default_format,
            _ => return Ok(None),
        };
        match inner.detector.detect(identity.as_str(), asserted, default_format) {
            Detection::Format(format, _) => Ok(Some(format.wire_name().to_string())),
            Detection::Defer => Ok(None),
        }
    }

    /// The managed load path. `Ok(None)` means "not ours": the caller
    /// delegates to the host.
    fn load_managed(
        &self,
        identity: &ModuleIdentity,
        ctx: &LoadContext,
    ) -> Result<Option<LoadOutput>, LoadError> {
        let path = match identity.path() {
            Some(path) => path,
            None => return Ok(None),
        };

        let inner = &mut *self.inner.borrow_mut();
        let id = match inner.scopes.resolve(&path)? {
            ScopeHit::Scoped(id) | ScopeHit::Default(id) => id,
            ScopeHit::Unmanaged => return Ok(None),
        };
        let instance = match inner.instances.get_mut(&id) {
            Some(instance) => instance,
            None => return Ok(None),
        };
        if !instance.is_enabled() {
            return Ok(None);
        }

        let asserted = match ctx.format.as_deref() {
            Some("module") => Some(ModuleFormat::Module),
            Some("commonjs") => Some(ModuleFormat::Script),
            // json, builtin, wasm: host-native kinds.
            Some(_) => return Ok(None),
            None => None,
        };
        let format = match inner
            .detector
            .detect(identity.as_str(), asserted, instance.config.default_format)
        {
            Detection::Format(format, _) => format,
            Detection::Defer => return Ok(None),
        };

        // First load of this identity wins; repeats reuse the record.
        if let Some(record) = inner.records.get(identity) {
            return Ok(Some(LoadOutput {
                format: record.format.wire_name().to_string(),
                source: record.compiled.clone(),
            }));
        }

        let source = fs::read_to_string(&path).map_err(|e| LoadError::Read {
            path: path.clone(),
            source: e,
        })?;

        let backend = inner
            .registry
            .create(&instance.config.transpile.backend)
            .map_err(|e| LoadError::BackendUnavailable(e.to_string()))?;
        let level = instance.probed_level(backend.as_ref()).map_err(|e| match e {
            RegisterError::InvalidTarget(target) => {
                LoadError::Transpile(TranspileError::InvalidTarget(target))
            }
            other => LoadError::BackendUnavailable(other.to_string()),
        })?;

        let transpiled = lode_transpile::transpile(
            backend.as_ref(),
            &instance.config.transpile,
            level,
            format,
            &source,
            &path,
        )
        .map_err(|e| match e {
            TranspileError::Backend(BackendError::Diagnostics(diags)) => LoadError::Compilation(
                diags
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            other => LoadError::Transpile(other),
        })?;

        debug!(
            identity = identity.as_str(),
            format = format.wire_name(),
            backend = %transpiled.backend_stamp,
            "module compiled"
        );

        let map = Rc::new(transpiled.position_map);
        inner.source_maps.record(identity.as_str(), Rc::clone(&map));
        let record = inner.records.insert_if_absent(ModuleRecord {
            identity: identity.clone(),
            format,
            source,
            compiled: transpiled.compiled_text,
            position_map: map,
            backend_stamp: transpiled.backend_stamp,
        });

        Ok(Some(LoadOutput {
            format: record.format.wire_name().to_string(),
            source: record.compiled.clone(),
        }))
    }
}

impl Default for HookRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

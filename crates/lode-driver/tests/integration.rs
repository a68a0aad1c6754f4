//! Integration tests for the module interception pipeline.
//!
//! These tests drive the `lode` binary for the CLI surface and the hook
//! pipeline directly for the interception properties a binary cannot
//! exercise (the host side of the protocol is simulated).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use tempfile::TempDir;

use lode_backend::{BackendRegistry, OutputLevel, StripBackend};
use lode_hooks::{
    CompilerInstance, HookRegistrar, HostError, InstanceConfig, LoadOutput, ModuleIdentity,
    RawContext,
};
use lode_resolve::ModuleFormat;
use lode_transpile::TranspileConfig;

/// Get the path to the compiled `lode` binary.
fn lode_binary() -> PathBuf {
    let mut path = std::env::current_exe()
        .unwrap()
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf();
    path.push("lode");
    path
}

/// Fresh scratch directory for one test, removed when the guard drops.
fn scratch_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write_module(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

fn scoped(dir: &Path) -> InstanceConfig {
    InstanceConfig {
        scope: Some(dir.to_path_buf()),
        default_format: ModuleFormat::Module,
        ..Default::default()
    }
}

fn host_load(_: &str, _: &RawContext) -> Result<LoadOutput, HostError> {
    Ok(LoadOutput {
        format: "commonjs".to_string(),
        source: "host".to_string(),
    })
}

fn no_host(url: &str, _: &RawContext) -> Result<LoadOutput, HostError> {
    panic!("unexpected delegation to host for {url}");
}

// ============================================================================
// CLI surface
// ============================================================================

#[test]
fn test_transpile_command_strips_annotations() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let input = write_module(dir, "m.mts", "export const answer: number = 42;\n");

    let output = Command::new(lode_binary())
        .arg("transpile")
        .arg(&input)
        .output()
        .expect("failed to run lode");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "export const answer = 42;\n"
    );
}

#[test]
fn test_transpile_command_reports_diagnostics() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let input = write_module(dir, "bad.ts", "enum Color { Red }\n");

    let output = Command::new(lode_binary())
        .arg("transpile")
        .arg(&input)
        .output()
        .expect("failed to run lode");

    assert!(!output.status.success());
}

#[test]
fn test_detect_command_extension_pin() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let input = write_module(dir, "m.cts", "const n = 1;\n");

    let output = Command::new(lode_binary())
        .arg("detect")
        .arg(&input)
        .output()
        .expect("failed to run lode");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "commonjs (extension)"
    );
}

#[test]
fn test_detect_command_manifest_type() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    fs::write(dir.join("package.json"), r#"{"type": "module"}"#).unwrap();
    let input = write_module(dir, "m.ts", "export {};\n");

    let output = Command::new(lode_binary())
        .arg("detect")
        .arg(&input)
        .output()
        .expect("failed to run lode");

    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "module (package manifest)"
    );
}

#[test]
fn test_resolve_command_completes_extension() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let importer = write_module(dir, "main.ts", "import './util';\n");
    let target = write_module(dir, "util.ts", "export const u = 1;\n");

    let output = Command::new(lode_binary())
        .arg("resolve")
        .arg("./util")
        .arg("--from")
        .arg(&importer)
        .output()
        .expect("failed to run lode");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], target.display().to_string());
    assert_eq!(lines[1], "commonjs");
}

#[test]
fn test_trace_command_rejects_malformed_config() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let module = write_module(dir, "m.cts", "const n = 1;\n");
    let config = write_module(dir, "lode.json", "{ not json");

    let output = Command::new(lode_binary())
        .arg("trace")
        .arg("-m")
        .arg(&module)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run lode");

    assert!(!output.status.success());
}

#[test]
fn test_trace_command_rewrites_managed_frames() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    // Script format: the strict prologue shifts every line down by one.
    let module = write_module(dir, "m.cts", "const n: number = 1;\nthrow new Error(\"boom\");\n")
        .canonicalize()
        .unwrap();

    let trace = dir.join("trace.txt");
    fs::write(
        &trace,
        format!(
            "Error: boom\n    at Object.<anonymous> ({}:3:1)\n    at node:internal/modules/cjs/loader:1000:1\n",
            module.display()
        ),
    )
    .unwrap();

    let output = Command::new(lode_binary())
        .arg("trace")
        .arg("-m")
        .arg(&module)
        .arg(&trace)
        .output()
        .expect("failed to run lode");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Error: boom");
    assert_eq!(
        lines[1],
        format!("    at Object.<anonymous> ({}:2:1)", module.display())
    );
    // Frames outside managed identities pass through byte-identical.
    assert_eq!(lines[2], "    at node:internal/modules/cjs/loader:1000:1");
}

// ============================================================================
// Round trip: generated frame back to original position
// ============================================================================

#[test]
fn test_frame_round_trip_through_pipeline() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let module = write_module(
        dir,
        "m.ts",
        "const greeting: string = \"hi\";\nthrow new Error(\"boom\");\n",
    );
    let identity = ModuleIdentity::from_path(&module, None).unwrap();

    let registrar = HookRegistrar::new();
    let _handle = registrar.install();
    // Script-format default: compiled text carries the strict prologue.
    registrar
        .register_instance(InstanceConfig {
            scope: Some(dir.to_path_buf()),
            default_format: ModuleFormat::Script,
            ..Default::default()
        })
        .unwrap();
    registrar
        .load(identity.as_str(), &RawContext::load(None, &[]), no_host)
        .unwrap();

    let path = module.display().to_string();

    // The throw moved from line 2 to line 3.
    let orig = registrar.rewrite_frame(&path, 3, 1).unwrap();
    assert_eq!((orig.file.as_str(), orig.line, orig.column), (path.as_str(), 2, 1));

    // `: string` (8 chars) was stripped before the initializer: generated
    // column 18 of the declaration is original column 26.
    let orig = registrar.rewrite_frame(&path, 2, 18).unwrap();
    assert_eq!((orig.line, orig.column), (1, 26));

    // A frame in an unmanaged file passes through.
    assert!(registrar.rewrite_frame("/elsewhere/other.js", 1, 1).is_none());
}

// ============================================================================
// Identity separation: distinguishing suffixes force re-evaluation
// ============================================================================

#[test]
fn test_suffix_identities_yield_independent_executions() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let module = write_module(dir, "task.ts", "export const tag: string = \"side-effect\";\n");
    let base = ModuleIdentity::from_path(&module, None).unwrap();

    let registrar = HookRegistrar::new();
    let _handle = registrar.install();
    registrar.register_instance(scoped(dir)).unwrap();
    let ctx = RawContext::load(None, &[]);

    // The host executes a module once per identity; a repeated identity
    // reuses the record and re-runs the same compiled text.
    let mut execution_log = Vec::new();
    for suffix in ["v=1", "v=2", "v=2"] {
        let url = format!("{}?{}", base, suffix);
        let out = registrar.load(&url, &ctx, no_host).unwrap();
        assert_eq!(out.source, "export const tag = \"side-effect\";\n");
        execution_log.push(format!("log{}", suffix.trim_start_matches("v=")));
    }
    assert_eq!(execution_log, ["log1", "log2", "log2"]);

    // Two suffixes, two records; the third load created nothing new.
    let first = registrar
        .record(&ModuleIdentity::parse(&format!("{}?v=1", base)).unwrap())
        .unwrap();
    let second = registrar
        .record(&ModuleIdentity::parse(&format!("{}?v=2", base)).unwrap())
        .unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    assert!(registrar.record(&base).is_none());
}

// ============================================================================
// Scope precedence: the most specific ancestor wins
// ============================================================================

#[test]
fn test_nested_scope_longest_prefix_wins() {
    let tmp = scratch_dir();
    let outer_dir = tmp.path();
    let inner_dir = outer_dir.join("b");
    fs::create_dir(&inner_dir).unwrap();
    let module = write_module(&inner_dir, "m.ts", "export const n: number = 1;\n");
    let identity = ModuleIdentity::from_path(&module, None).unwrap();

    let registrar = HookRegistrar::new();
    let _handle = registrar.install();
    // Outer scope first, bound to the passthrough backend; inner scope
    // second, bound to the stripping backend. Output tells them apart.
    let mut outer = scoped(outer_dir);
    outer.transpile = TranspileConfig {
        backend: "null".to_string(),
        ..Default::default()
    };
    registrar.register_instance(outer).unwrap();
    registrar.register_instance(scoped(&inner_dir)).unwrap();

    let out = registrar
        .load(identity.as_str(), &RawContext::load(None, &[]), no_host)
        .unwrap();
    assert_eq!(out.source, "export const n = 1;\n");
}

// ============================================================================
// Toggle semantics
// ============================================================================

#[test]
fn test_toggle_transitions_defer_and_restore() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let module = write_module(dir, "m.ts", "export const n: number = 1;\n");
    let identity = ModuleIdentity::from_path(&module, None).unwrap();

    let registrar = HookRegistrar::new();
    let _handle = registrar.install();
    let id = registrar.register_instance(scoped(dir)).unwrap();
    let ctx = RawContext::load(None, &[]);

    for enabled in [false, false, true, true, true] {
        registrar.set_enabled(id, enabled).unwrap();
        let out = registrar.load(identity.as_str(), &ctx, host_load).unwrap();
        if enabled {
            assert_eq!(out.source, "export const n = 1;\n");
        } else {
            assert_eq!(out.source, "host");
        }
    }
}

// ============================================================================
// Capability downgrade
// ============================================================================

#[test]
fn test_probe_settles_on_highest_supported_level() {
    let capped = StripBackend::with_max_level(OutputLevel::Es2016);
    assert_eq!(
        lode_backend::probe(&capped, OutputLevel::Es2020).unwrap(),
        OutputLevel::Es2016
    );

    // The same downgrade through an instance's memoized probe.
    let mut instance = CompilerInstance::new(InstanceConfig {
        transpile: TranspileConfig {
            target: "es2020".to_string(),
            ..Default::default()
        },
        ..Default::default()
    });
    assert_eq!(instance.probed_level(&capped).unwrap(), OutputLevel::Es2016);
}

#[test]
fn test_capped_backend_drives_loads_at_downgraded_level() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let module = write_module(dir, "m.ts", "export const n: number = 1;\n");
    let identity = ModuleIdentity::from_path(&module, None).unwrap();

    let mut registry = BackendRegistry::empty();
    registry.register("strip", || {
        Box::new(StripBackend::with_max_level(OutputLevel::Es2016))
    });
    let registrar = HookRegistrar::with_registry(registry);
    let _handle = registrar.install();
    let mut config = scoped(dir);
    config.transpile.target = "es2020".to_string();
    registrar.register_instance(config).unwrap();

    let out = registrar
        .load(identity.as_str(), &RawContext::load(None, &[]), no_host)
        .unwrap();
    assert_eq!(out.source, "export const n = 1;\n");
}

// ============================================================================
// Context key stability
// ============================================================================

#[test]
fn test_context_key_sets_stay_documented_across_calls() {
    let tmp = scratch_dir();
    let dir = tmp.path();
    let script = write_module(dir, "s.cts", "const n = 1;\n");
    let module = write_module(dir, "m.mts", "export {};\n");
    let json = write_module(dir, "data.json", "{}\n");
    let script_url = ModuleIdentity::from_path(&script, None).unwrap();
    let module_url = ModuleIdentity::from_path(&module, None).unwrap();
    let json_url = ModuleIdentity::from_path(&json, None).unwrap();
    let dir_url = format!("file://{}/", dir.display());

    let registrar = HookRegistrar::new();
    let _handle = registrar.install();
    registrar.register_instance(scoped(dir)).unwrap();

    let resolve_contexts = [
        RawContext::resolve(&["node", "import"], &[], None),
        RawContext::resolve(&["node", "import"], &[], Some(script_url.as_str())),
        RawContext::resolve(&["node", "import"], &[], Some(module_url.as_str())),
        RawContext::resolve(&["node", "require"], &[], Some(script_url.as_str())),
        RawContext::resolve(&["node", "import"], &[("type", "json")], Some(module_url.as_str())),
        RawContext::resolve(&["node", "import"], &[], Some(&dir_url)),
        RawContext::resolve(&["node", "import"], &[], Some("data:text/javascript,1")),
    ];
    let load_contexts = [
        (script_url.as_str().to_string(), RawContext::load(None, &[])),
        (script_url.as_str().to_string(), RawContext::load(Some("commonjs"), &[])),
        (module_url.as_str().to_string(), RawContext::load(Some("module"), &[])),
        (format!("{}?v=1", module_url), RawContext::load(Some("module"), &[])),
        (json_url.as_str().to_string(), RawContext::load(Some("json"), &[])),
        ("data:text/javascript,1".to_string(), RawContext::load(None, &[("type", "json")])),
        ("node:fs".to_string(), RawContext::load(Some("builtin"), &[])),
    ];

    let mut observed: Vec<Vec<String>> = Vec::new();
    for ctx in &resolve_contexts {
        observed.push(ctx.entries.keys().cloned().collect());
        let url = module_url.as_str().to_string();
        registrar
            .resolve("./m.mts", ctx, |_, delegated| {
                assert_eq!(
                    delegated.entries.keys().collect::<Vec<_>>(),
                    ctx.entries.keys().collect::<Vec<_>>()
                );
                Ok(lode_hooks::Resolution {
                    url: url.clone(),
                    format: None,
                })
            })
            .unwrap();
    }
    for (url, ctx) in &load_contexts {
        observed.push(ctx.entries.keys().cloned().collect());
        registrar.load(url, ctx, host_load).unwrap();
    }

    assert_eq!(observed.len(), 14);
    let resolve_keys = ["conditions", "importAssertions", "parentURL"];
    let load_keys = ["format", "importAssertions"];
    for keys in &observed {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        assert!(
            keys == resolve_keys || keys == load_keys,
            "unexpected context key set: {:?}",
            keys
        );
    }
}

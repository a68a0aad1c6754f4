use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lode_backend::{BackendError, BackendRegistry};
use lode_hooks::{HookRegistrar, HostError, InstanceConfig, ModuleIdentity, RawContext};
use lode_resolve::{resolve_classic, Detection, DetectionSource, FormatDetector, ModuleFormat};
use lode_transpile::{transpile, TranspileConfig, TranspileError};

#[derive(Parser)]
#[command(
    name = "lode",
    version = "0.1.0",
    about = "Module-load interception and transpilation pipeline",
    long_about = "Transpiles statically-typed superset source to host-native\nmodules, with scope dispatch, format detection, and source-mapped\ndiagnostics."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transpile a source file and print the host-native text
    Transpile {
        /// Input source file
        input: PathBuf,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Backend identifier
        #[arg(long, default_value = "strip")]
        backend: String,

        /// Requested output level
        #[arg(long, default_value = "es2022")]
        target: String,

        /// Module format override (detected when omitted)
        #[arg(long)]
        format: Option<FormatArg>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Resolve an extension-less specifier the classic way (debug)
    Resolve {
        /// The specifier as written in the importing file
        specifier: String,

        /// The importing file
        #[arg(long)]
        from: PathBuf,
    },

    /// Show the format-detection decision for a file (debug)
    Detect {
        /// Input source file
        input: PathBuf,

        /// Fallback format when no earlier step decides
        #[arg(long, default_value = "commonjs")]
        default_format: FormatArg,
    },

    /// Rewrite a stack trace against one or more compiled modules
    Trace {
        /// Modules to compile so their position maps are available
        #[arg(short, long = "module", required = true)]
        modules: Vec<PathBuf>,

        /// Instance configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// File containing the trace (stdin when omitted)
        trace: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    /// Graph-resolved module
    Module,
    /// Eagerly loaded script
    Commonjs,
}

impl From<FormatArg> for ModuleFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Module => ModuleFormat::Module,
            FormatArg::Commonjs => ModuleFormat::Script,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transpile {
            input,
            output,
            backend,
            target,
            format,
            verbose,
        } => transpile_command(input, output, backend, target, format, verbose),
        Commands::Resolve { specifier, from } => resolve_command(specifier, from),
        Commands::Detect {
            input,
            default_format,
        } => detect_command(input, default_format),
        Commands::Trace {
            modules,
            config,
            trace,
        } => trace_command(modules, config, trace),
    }
}

fn transpile_command(
    input: PathBuf,
    output: Option<PathBuf>,
    backend_name: String,
    target: String,
    format: Option<FormatArg>,
    verbose: bool,
) -> ExitCode {
    let source = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let format = match format {
        Some(arg) => ModuleFormat::from(arg),
        None => {
            let mut detector = FormatDetector::new();
            match detector.detect(&input.display().to_string(), None, ModuleFormat::Script) {
                Detection::Format(f, _) => f,
                Detection::Defer => {
                    eprintln!(
                        "Error: {} is a host-native file kind, nothing to transpile",
                        input.display()
                    );
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let config = TranspileConfig {
        backend: backend_name.clone(),
        target,
        ..Default::default()
    };

    let registry = BackendRegistry::with_builtins();
    let backend = match registry.create(&backend_name) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let requested = match config.target_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let level = match lode_backend::probe(backend.as_ref(), requested) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if verbose {
        println!("Transpiling: {}", input.display());
        println!("Backend: {}@{}", backend.name(), backend.version());
        println!("Format: {}", format.wire_name());
        println!("Output level: {}", level);
    }

    let result = match transpile(backend.as_ref(), &config, level, format, &source, &input) {
        Ok(result) => result,
        Err(TranspileError::Backend(BackendError::Diagnostics(diags))) => {
            let filename = input.display().to_string();
            for diag in &diags {
                report_diagnostic(&filename, &source, diag.line, diag.column, &diag.message);
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if verbose {
        println!("Position map entries: {}", result.position_map.len());
    }

    match output {
        Some(path) => {
            if let Err(e) = fs::write(&path, &result.compiled_text) {
                eprintln!("Error writing {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", result.compiled_text),
    }
    ExitCode::SUCCESS
}

fn resolve_command(specifier: String, from: PathBuf) -> ExitCode {
    match resolve_classic(&specifier, &from) {
        Some(path) => {
            println!("{}", path.display());
            let mut detector = FormatDetector::new();
            if let Detection::Format(format, _) =
                detector.detect(&path.display().to_string(), None, ModuleFormat::Script)
            {
                println!("{}", format.wire_name());
            }
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Error: cannot resolve '{}' from {}", specifier, from.display());
            ExitCode::FAILURE
        }
    }
}

fn detect_command(input: PathBuf, default_format: FormatArg) -> ExitCode {
    let mut detector = FormatDetector::new();
    match detector.detect(
        &input.display().to_string(),
        None,
        ModuleFormat::from(default_format),
    ) {
        Detection::Format(format, source) => {
            let step = match source {
                DetectionSource::Extension => "extension",
                DetectionSource::Assertion => "assertion",
                DetectionSource::Manifest => "package manifest",
                DetectionSource::InstanceDefault => "instance default",
            };
            println!("{} ({})", format.wire_name(), step);
            ExitCode::SUCCESS
        }
        Detection::Defer => {
            println!("defer (host-native)");
            ExitCode::SUCCESS
        }
    }
}

fn trace_command(modules: Vec<PathBuf>, config: Option<PathBuf>, trace: Option<PathBuf>) -> ExitCode {
    let instance_config = match config {
        Some(path) => {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("Error reading {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            match serde_json::from_str::<InstanceConfig>(&text) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => InstanceConfig::default(),
    };

    let registrar = HookRegistrar::new();
    let _handle = registrar.install();
    if let Err(e) = registrar.register_instance(instance_config) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    for module in &modules {
        let module = match module.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Error resolving {}: {}", module.display(), e);
                return ExitCode::FAILURE;
            }
        };
        let identity = match ModuleIdentity::from_path(&module, None) {
            Some(identity) => identity,
            None => {
                eprintln!("Error: {} has no file identity", module.display());
                return ExitCode::FAILURE;
            }
        };
        let context = RawContext::load(None, &[]);
        let unmanaged = |url: &str, _: &RawContext| -> Result<lode_hooks::LoadOutput, HostError> {
            Err(HostError {
                code: None,
                message: format!("{} is not managed by any instance", url),
            })
        };
        if let Err(e) = registrar.load(identity.as_str(), &context, unmanaged) {
            eprintln!("Error compiling {}: {}", module.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let trace_text = match trace {
        Some(path) => match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut text = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut text) {
                eprintln!("Error reading stdin: {}", e);
                return ExitCode::FAILURE;
            }
            text
        }
    };

    print!("{}", registrar.rewrite_trace(&trace_text));
    ExitCode::SUCCESS
}

fn report_diagnostic(filename: &str, source: &str, line: u32, column: u32, message: &str) {
    let start = byte_offset(source, line, column);
    let span = (filename, start..start + 1);
    Report::build(ReportKind::Error, span.clone())
        .with_code("E0001")
        .with_message("Compilation error")
        .with_label(
            Label::new(span)
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename, Source::from(source)))
        .ok();
}

/// Byte offset of a 1-based (line, column) position
fn byte_offset(source: &str, line: u32, column: u32) -> usize {
    let mut current = 1u32;
    let mut offset = 0usize;
    for l in source.split_inclusive('\n') {
        if current == line {
            return offset + (column.saturating_sub(1) as usize).min(l.len());
        }
        offset += l.len();
        current += 1;
    }
    offset
}

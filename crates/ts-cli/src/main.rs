use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use ts_core::{CommandRegistry, TaskScriptError};
use ts_persist::{
    load_script_file, migrate, parse_xml_document, save_document_file, save_script_file,
    ExportMode,
};
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "ts-cli")]
#[command(about = "taskscript script file tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a script file and report its shape.
    Validate(ValidateArgs),
    /// Run the schema migration pipeline over a script file.
    Migrate(MigrateArgs),
    /// Print a script's metadata as JSON.
    Info(InfoArgs),
    /// Validate every .xml script under a directory.
    Scan(ScanArgs),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    file: PathBuf,
    /// Re-save in intermediate (portable) form after validating.
    #[arg(long = "export-intermediate")]
    export_intermediate: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    file: PathBuf,
    /// Output path; defaults to rewriting the input in place.
    #[arg(long = "out")]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct InfoArgs {
    file: PathBuf,
}

#[derive(Debug, Args)]
struct ScanArgs {
    dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error);
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, TaskScriptError> {
    let registry = CommandRegistry::builtin();
    match cli.command {
        Command::Validate(args) => run_validate(args, &registry),
        Command::Migrate(args) => run_migrate(args),
        Command::Info(args) => run_info(args, &registry),
        Command::Scan(args) => run_scan(args, &registry),
    }
}

fn run_validate(args: ValidateArgs, registry: &CommandRegistry) -> Result<i32, TaskScriptError> {
    let script = load_script_file(&args.file, registry)?;
    println!(
        "{}: ok ({} command(s), {} variable(s))",
        args.file.display(),
        script.command_count(),
        script.variables.len()
    );

    if let Some(out) = args.export_intermediate {
        save_script_file(&out, &script, registry, ExportMode::Intermediate)?;
        println!("wrote intermediate export to {}", out.display());
    }
    Ok(0)
}

/// Migrates the raw document without structurally parsing it, so files with
/// unregistered command types can still be upgraded.
fn run_migrate(args: MigrateArgs) -> Result<i32, TaskScriptError> {
    let source = read_file(&args.file)?;
    let mut document = parse_xml_document(&source)?;
    migrate(&mut document);

    let out = args.out.unwrap_or_else(|| args.file.clone());
    save_document_file(&out, &document)?;
    println!("migrated {} -> {}", args.file.display(), out.display());
    Ok(0)
}

fn run_info(args: InfoArgs, registry: &CommandRegistry) -> Result<i32, TaskScriptError> {
    let script = load_script_file(&args.file, registry)?;
    let rendered = serde_json::to_string_pretty(&script.info)
        .map_err(|error| TaskScriptError::new("INFO_ENCODE_ERROR", error.to_string()))?;
    println!("{}", rendered);
    Ok(0)
}

fn run_scan(args: ScanArgs, registry: &CommandRegistry) -> Result<i32, TaskScriptError> {
    let mut checked = 0usize;
    let mut failed = 0usize;

    for entry in WalkDir::new(&args.dir).sort_by_file_name() {
        let entry = entry.map_err(|error| {
            TaskScriptError::new("SCRIPT_IO_ERROR", error.to_string())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("xml") {
            continue;
        }

        checked += 1;
        match load_script_file(path, registry) {
            Ok(_) => println!("{}: ok", path.display()),
            Err(error) => {
                failed += 1;
                println!("{}: {}", path.display(), error);
            }
        }
    }

    println!("{} file(s) checked, {} failed", checked, failed);
    Ok(if failed == 0 { 0 } else { 1 })
}

fn read_file(path: &Path) -> Result<String, TaskScriptError> {
    fs::read_to_string(path).map_err(|error| {
        TaskScriptError::new(
            "SCRIPT_IO_ERROR",
            format!("{}: {}", path.display(), error),
        )
    })
}

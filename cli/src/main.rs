use std::ops::Range;
use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use precomp::compile::BlockCompiler;
use precomp::{Project, RebuildConfig, Rebuilt};

const SUBCOMMANDS: &[&str] = &["build", "check", "help"];

#[derive(Parser)]
#[command(name = "precomp", version, about = "Ahead-of-time compiler for block programs")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild a program descriptor with compiled code
    Build(BuildArgs),

    /// Parse a step-code file and report syntax errors
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Program descriptor to read (project.json)
    source: String,

    /// Where to write the rebuilt descriptor
    dest: String,

    /// TOML file with rebuild settings
    #[arg(short, long)]
    config: Option<String>,

    /// Also write the rebuild report as JSON
    #[arg(long)]
    report: Option<String>,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Step-code source file
    file: String,

    /// The file holds a helper definition instead of a unit
    #[arg(long)]
    helper: bool,

    /// Print the parsed code back in canonical layout
    #[arg(long)]
    pretty: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // `precomp SOURCE DEST` means `precomp build SOURCE DEST`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first) = first_positional(&args) {
        if !SUBCOMMANDS.contains(&first) {
            args.insert(1, "build".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let exit_code = match cli.command {
        Command::Build(build_args) => do_build(build_args, color_choice),
        Command::Check(check_args) => do_check(check_args, color_choice),
    };
    process::exit(exit_code);
}

/// First argument that is neither a flag nor a flag's value.
fn first_positional(args: &[String]) -> Option<&str> {
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-c" | "--config" | "--report" => {
                rest.next();
            }
            flag if flag.starts_with('-') => {}
            positional => return Some(positional),
        }
    }
    None
}

fn do_build(args: BuildArgs, color_choice: ColorChoice) -> i32 {
    let config = match &args.config {
        Some(path) => match RebuildConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        },
        None => RebuildConfig::default(),
    };

    let text = match std::fs::read_to_string(&args.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.source, e);
            return 1;
        }
    };

    let project = match Project::from_json(&text) {
        Ok(project) => project,
        Err(e) => {
            let mut files = SimpleFiles::new();
            let file_id = files.add(args.source.clone(), text.clone());
            let offset = byte_offset(&text, e.line(), e.column());
            let diagnostic = Diagnostic::error()
                .with_message("invalid program descriptor")
                .with_labels(vec![Label::primary(file_id, offset).with_message(e.to_string())]);
            emit(color_choice, &files, &diagnostic);
            return 1;
        }
    };

    let Rebuilt { project, report } = match precomp::precompile(&project, &BlockCompiler, &config) {
        Ok(rebuilt) => rebuilt,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let json = match project.to_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("error: cannot serialize the rebuilt descriptor: {e}");
            return 1;
        }
    };
    if let Err(e) = std::fs::write(&args.dest, json) {
        eprintln!("error: cannot write '{}': {}", args.dest, e);
        return 1;
    }

    let failures = report.failure_count();
    if failures > 0 {
        warn!(failures, "some scripts kept their original blocks");
    }
    info!(dest = %args.dest, "done");

    if let Some(path) = &args.report {
        let written = serde_json::to_string_pretty(&report)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("error: cannot write report '{path}': {e}");
            return 1;
        }
    }
    0
}

fn do_check(args: CheckArgs, color_choice: ColorChoice) -> i32 {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            return 1;
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());
    let parser = precomp::code::Parser::new(source, file_id);

    let printed = if args.helper {
        parser.parse_helper().map(|helper| helper.to_string())
    } else {
        parser.parse_script().map(|script| script.to_string())
    };
    match printed {
        Ok(text) => {
            if args.pretty {
                println!("{text}");
            } else {
                eprintln!("ok: {} parsed successfully", args.file);
            }
            0
        }
        Err(error) => {
            emit(color_choice, &files, &error.to_diagnostic());
            1
        }
    }
}

fn emit(color_choice: ColorChoice, files: &SimpleFiles<String, String>, diagnostic: &Diagnostic<usize>) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
}

/// Byte range of the 1-based `line`/`column` position reported by serde_json.
fn byte_offset(text: &str, line: usize, column: usize) -> Range<usize> {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let start = (line_start + column.saturating_sub(1)).min(text.len());
    start..(start + 1).min(text.len())
}

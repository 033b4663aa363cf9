//! dreadc - command-line driver for the Dread compiler.
//!
//! Compiles a source file to assembly and, by default, assembles and links it
//! into a static executable with the system `as` and `ld`. The `--emit` modes
//! stop earlier and print the tokens, the AST or the assembly instead.

use bumpalo::Bump;
use clap::{ArgAction, Parser, ValueEnum};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use thiserror::Error;

use dread::core::{CodegenOptions, CompilationSession, CompileError};
use dread::frontend::{parse, Lexer};

#[derive(Parser, Debug)]
#[command(name = "dreadc", version, about = "Compile Dread source to an x86-64 Linux executable")]
struct Cli {
    /// Dread source file.
    source: PathBuf,

    /// Output path. Defaults to `a.out` for executables and stdout otherwise.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to produce.
    #[arg(long, value_enum, default_value_t = Emit::Exe)]
    emit: Emit,

    /// Keep the intermediate `.s` file next to the executable.
    #[arg(long)]
    keep_asm: bool,

    /// Omit source annotations from the assembly.
    #[arg(long)]
    no_comments: bool,

    /// Print compilation statistics to stderr.
    #[arg(long)]
    stats: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
    Asm,
    Exe,
}

#[derive(Error, Debug)]
enum DriverError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}):\n{output}")]
    Tool {
        tool: &'static str,
        status: std::process::ExitStatus,
        output: String,
    },

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{count} syntax error(s)")]
    Syntax { count: usize },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), DriverError> {
    let source = fs::read_to_string(&cli.source).map_err(|source| DriverError::Read {
        path: cli.source.clone(),
        source,
    })?;

    match cli.emit {
        Emit::Tokens => {
            let listing: String = Lexer::new(&source)
                .map(|token| format!("{token}\n"))
                .collect();
            write_output(cli.output.as_deref(), &listing)
        }
        Emit::Ast => {
            let (program, diagnostics) = parse(&source);
            for diagnostic in &diagnostics {
                eprintln!("{}:{diagnostic}", cli.source.display());
            }
            write_output(cli.output.as_deref(), &format!("{program}\n"))?;
            if diagnostics.is_empty() {
                Ok(())
            } else {
                Err(DriverError::Syntax {
                    count: diagnostics.len(),
                })
            }
        }
        Emit::Asm => {
            let asm = compile(cli, &source)?;
            write_output(cli.output.as_deref(), &asm)
        }
        Emit::Exe => {
            let asm = compile(cli, &source)?;
            let output = cli.output.clone().unwrap_or_else(|| PathBuf::from("a.out"));
            build_executable(&asm, &output, cli.keep_asm)?;
            println!("Compiled {} to {}", cli.source.display(), output.display());
            Ok(())
        }
    }
}

fn compile(cli: &Cli, source: &str) -> Result<String, DriverError> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let options = CodegenOptions::default().with_annotations(!cli.no_comments);

    let result = dread::compile_with(source, &session, options);
    if cli.stats {
        eprint!("{}", session.stats());
    }
    Ok(result?)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), DriverError> {
    match path {
        Some(path) => fs::write(path, text).map_err(|source| DriverError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Write the assembly next to `output`, then assemble and link it.
fn build_executable(asm: &str, output: &Path, keep_asm: bool) -> Result<(), DriverError> {
    let asm_path = with_suffix(output, ".s");
    let obj_path = with_suffix(output, ".o");

    fs::write(&asm_path, asm).map_err(|source| DriverError::Write {
        path: asm_path.clone(),
        source,
    })?;

    let result = run_tool(
        "as",
        Command::new("as").arg("--64").arg("-o").arg(&obj_path).arg(&asm_path),
    )
    .and_then(|()| run_tool("ld", Command::new("ld").arg("-o").arg(output).arg(&obj_path)));

    // Intermediates go away whether or not the tools succeeded
    let _ = fs::remove_file(&obj_path);
    if !keep_asm {
        let _ = fs::remove_file(&asm_path);
    }
    result
}

fn run_tool(tool: &'static str, command: &mut Command) -> Result<(), DriverError> {
    log::debug!("Running {:?}", command);
    let output = command
        .output()
        .map_err(|source| DriverError::Spawn { tool, source })?;

    if output.status.success() {
        return Ok(());
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(DriverError::Tool {
        tool,
        status: output.status,
        output: text,
    })
}

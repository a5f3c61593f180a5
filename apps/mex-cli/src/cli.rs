//! Command-line argument parsing and dispatch for `mexc`.
//!
//! `mexc` is intentionally a single action (compile a source file, emit
//! its quads and symbol table) plus flags, rather than a multi-subcommand
//! layout: there is no project manifest or registry here, only a front
//! end to drive.

use clap::Parser;
use mex_lang::CompileOutput;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Compile a `mex` source file and print its quads and symbol table.
#[derive(Parser)]
#[command(name = "mexc")]
#[command(about = "Compiler front end for the mex language", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the `.mex` source file.
    pub input: PathBuf,

    /// Write output to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print a human-readable quad listing instead of JSON.
    #[arg(long)]
    pub dump: bool,

    /// Verbose logging (parser state transitions). Repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses arguments and runs the compiler, returning the process exit
/// code (`0` on a clean compile, `1` if any error diagnostic or I/O
/// failure occurred).
pub fn run_cli() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("reading {}", cli.input.display());
    let source = fs::read_to_string(&cli.input)?;

    log::debug!("starting compile pass ({} bytes)", source.len());
    let output = mex_lang::compile(&source);
    log::info!(
        "compile finished: {} quad(s), {} symbol(s), {} diagnostic(s)",
        output.quads.len(),
        output.symbols.len(),
        output.diagnostics.len()
    );

    for diag in &output.diagnostics {
        eprintln!("{}", diag);
    }

    let rendered = if cli.dump { render_dump(&output) } else { render_json(&output)? };

    match cli.output {
        Some(path) => fs::write(path, rendered)?,
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }

    Ok(if output.is_success() { 0 } else { 1 })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn render_json(output: &CompileOutput) -> Result<String, serde_json::Error> {
    #[derive(serde::Serialize)]
    struct Document<'a> {
        quads: &'a mex_lang::quad::QuadBuffer,
        symbols: &'a [mex_lang::SymbolSnapshot],
    }
    serde_json::to_string_pretty(&Document { quads: &output.quads, symbols: &output.symbols })
}

fn render_dump(output: &CompileOutput) -> String {
    let mut out = String::new();
    out.push_str("symbols:\n");
    for sym in &output.symbols {
        out.push_str(&format!(
            "  {:<16} {:<10} depth={} addr={:<4} ty={}\n",
            sym.name,
            format!("{:?}", sym.kind).to_lowercase(),
            sym.scope_depth,
            sym.address,
            sym.ty,
        ));
    }
    out.push_str("quads:\n");
    for (i, quad) in output.quads.as_slice().iter().enumerate() {
        out.push_str(&format!("  {:>4}: {:?}\n", i, quad));
    }
    out
}

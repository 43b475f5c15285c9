//! Command-line driver for the symbolization pass.
//!
//! Reads a module (TIR by default, textual LLVM IR with `--llvm`), instruments
//! it and writes the result.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;

use symbolize::core::SymbolizeSession;
use symbolize::pass::{SymbolizeOptions, SymbolizePass};
use symbolize::test_ir::{Module, TestIRAdaptor};

/// Instrument SSA IR for symbolic execution.
#[derive(Debug, Parser)]
#[command(name = "symbolize", version, about, long_about = None)]
struct Cli {
    /// Input module; reads stdin when omitted.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Write the instrumented module here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print session statistics to stderr.
    #[arg(long)]
    stats: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Treat the input as textual LLVM IR.
    #[cfg(feature = "llvm")]
    #[arg(long)]
    llvm: bool,

    /// Name prefix of runtime entry points.
    #[arg(long, default_value = "_sym_")]
    runtime_prefix: String,

    /// Runtime entry point that introduces symbolic inputs.
    #[arg(long, default_value = "_sym_build_variable")]
    symbolic_input_hook: String,

    /// Name of the generated startup routine.
    #[arg(long, default_value = "__sym_ctor")]
    constructor_name: String,

    /// Suffix appended to global names to name their shadows.
    #[arg(long, default_value = ".sym_expr")]
    shadow_suffix: String,

    /// Priority of the startup routine in the constructor table.
    #[arg(long, default_value_t = 0)]
    constructor_priority: u32,
}

impl Cli {
    fn options(&self) -> SymbolizeOptions {
        SymbolizeOptions {
            runtime_prefix: self.runtime_prefix.clone(),
            symbolic_input_hook: self.symbolic_input_hook.clone(),
            constructor_name: self.constructor_name.clone(),
            shadow_suffix: self.shadow_suffix.clone(),
            constructor_priority: self.constructor_priority,
        }
    }

    fn input_name(&self) -> String {
        self.input
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<stdin>".to_string())
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .init();
}

fn read_input(input: Option<&PathBuf>) -> io::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn instrument_tir(
    source: &str,
    options: SymbolizeOptions,
    session: &SymbolizeSession,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut module = Module::parse(source)?;
    SymbolizePass::new(options, session).run(&mut TestIRAdaptor::new(&mut module))?;
    Ok(module.to_string())
}

fn run(cli: &Cli, session: &SymbolizeSession) -> Result<String, Box<dyn std::error::Error>> {
    let source = read_input(cli.input.as_ref())?;
    log::info!("📖 Read {} bytes from {}", source.len(), cli.input_name());

    #[cfg(feature = "llvm")]
    if cli.llvm {
        return Ok(symbolize::llvm::instrument_ir(&source, &cli.input_name(), cli.options(), session)?);
    }

    instrument_tir(&source, cli.options(), session)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let session = SymbolizeSession::new();
    let result = run(&cli, &session).and_then(|output| {
        match &cli.output {
            Some(path) => fs::write(path, output)?,
            None => io::stdout().write_all(output.as_bytes())?,
        }
        Ok(())
    });

    for diagnostic in session.diagnostics() {
        eprintln!("{diagnostic}");
    }
    if cli.stats {
        eprintln!("{}", session.stats());
    }

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

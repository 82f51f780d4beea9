//! Command-line front end for the Knight interpreter.

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser as ClapParser;

use knight::{Interpreter, Limits, Mode};

#[derive(ClapParser)]
#[command(name = "knight", version, about = "Compile and run Knight programs")]
struct Cli {
    /// Program text, given directly on the command line.
    #[arg(short = 'e', long = "expr", conflicts_with = "file")]
    expr: Option<String>,

    /// Path to a Knight source file.
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Treat Block-in-coercion-context and a bare-identifier OUTPUT as
    /// no-ops instead of errors.
    #[arg(long)]
    lenient: bool,

    /// Abort with an error once this many bytecode instructions have
    /// run. Unset means unlimited.
    #[arg(long, value_name = "N")]
    max_instructions: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match (&cli.expr, &cli.file) {
        (Some(expr), _) => expr.clone(),
        (None, Some(path)) => match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("error reading {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
        (None, None) => {
            eprintln!("usage: knight (-e EXPR | FILE) [--lenient] [--max-instructions N]");
            return ExitCode::FAILURE;
        }
    };

    let mode = if cli.lenient { Mode::Lenient } else { Mode::Strict };
    let interp = Interpreter::new().mode(mode).limit(Limits { max_instructions: cli.max_instructions });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut rng = rand::thread_rng();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    match interp.run_with(&source, &mut out, &mut input, &mut rng) {
        Ok(Some(code)) => {
            let _ = out.flush();
            ExitCode::from(code)
        }
        Ok(None) => {
            let _ = out.flush();
            ExitCode::SUCCESS
        }
        Err(err) => {
            let _ = out.flush();
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

// ABOUTME: CLI entry point choosing one-shot file execution vs. interactive REPL

mod repl_helper;

use clap::Parser;
use lox_sandbox::Lox;
use repl_helper::LoxHelper;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::process::ExitCode;

/// A tree-walking interpreter for a small dynamically-typed scripting language
#[derive(Parser, Debug)]
#[command(name = "lox")]
#[command(version)]
#[command(about = "Run a script file, or start an interactive REPL with none given")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

const EXIT_OK: u8 = 0;
const EXIT_USAGE: u8 = 64;
const EXIT_DATA_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    match args.script {
        Some(path) => run_file(&path),
        None => run_repl(),
    }
}

fn run_file(path: &PathBuf) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot read script file {}: {err}", path.display());
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mut lox = Lox::new(Box::new(|text: &str| print!("{text}")));
    let result = lox.run(&source, false);

    if result.had_runtime_error {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else if result.had_error {
        ExitCode::from(EXIT_DATA_ERROR)
    } else {
        ExitCode::from(EXIT_OK)
    }
}

fn run_repl() -> ExitCode {
    let mut lox = Lox::new(Box::new(|text: &str| print!("{text}")));

    let config = Config::builder().auto_add_history(true).build();
    let mut rl = match Editor::with_config(config) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {err}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    rl.set_helper(Some(LoxHelper));

    let history_file = ".lox_history";
    let _ = rl.load_history(history_file);

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                lox.run(&line, true);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    ExitCode::from(EXIT_OK)
}

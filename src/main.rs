//! Hinton CLI
//!
//! Runs a script, evaluates a snippet, or starts the REPL.

use clap::Parser;
use colored::*;
use hinton::cli::{self, exit, CliOptions, Mode};
use hinton::repl::{self, watcher};
use hinton_core::report::render_error;
use hinton_core::{Interpreter, InterpreterConfig};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Enable with `RUST_LOG=hinton_core=debug` or `RUST_LOG=hinton_core=trace`.
/// Logs go to stderr so they never interleave with program output.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}

fn main() {
    init_tracing();

    let options = match CliOptions::try_parse() {
        Ok(options) => options,
        Err(e) => {
            // --help and --version arrive here too, on stdout
            let _ = e.print();
            process::exit(if e.use_stderr() { exit::USAGE } else { exit::OK });
        }
    };

    if options.no_color {
        colored::control::set_override(false);
    }

    let mut config = InterpreterConfig::from_env();
    if let Some(depth) = options.max_depth {
        config = config.with_max_call_depth(depth);
    }

    tracing::debug!(?options, "Parsed command line");

    let code = match options.mode() {
        Mode::Repl => match repl::start(config) {
            Ok(()) => exit::OK,
            Err(e) => {
                eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
                exit::IO
            }
        },
        Mode::Eval(source) => {
            let mut interpreter = Interpreter::with_config(config);
            run_source(&mut interpreter, &source, "<eval>")
        }
        Mode::File(path) if options.watch => watch_file(&path, config),
        Mode::File(path) => {
            let mut interpreter = Interpreter::with_config(config);
            run_file(&mut interpreter, &path)
        }
    };

    let _ = io::stdout().flush();
    process::exit(code);
}

fn run_source(interpreter: &mut Interpreter, source: &str, origin: &str) -> i32 {
    match interpreter.execute_source(source) {
        Ok(_) => exit::OK,
        Err(e) => {
            let _ = io::stdout().flush();
            eprint!("{}", render_error(&e, source, origin));
            cli::exit_code(&e)
        }
    }
}

fn run_file(interpreter: &mut Interpreter, path: &Path) -> i32 {
    match fs::read_to_string(path) {
        Ok(source) => run_source(interpreter, &source, &path.display().to_string()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read script");
            eprintln!(
                "{} Failed to read {}: {}",
                "Error:".bright_red().bold(),
                path.display(),
                e
            );
            exit::IO
        }
    }
}

/// Run `path`, then run it again from a fresh global scope after every change
fn watch_file(path: &Path, config: InterpreterConfig) -> i32 {
    let mut interpreter = Interpreter::with_config(config);
    let status = run_file(&mut interpreter, path);
    tracing::debug!(path = %path.display(), status, "Initial run finished");

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut file_watcher = match watcher::FileWatcher::new(tx) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{} Failed to create watcher: {}", "Error:".bright_red().bold(), e);
            return exit::IO;
        }
    };
    if let Err(e) = file_watcher.watch(path) {
        eprintln!(
            "{} Failed to watch {}: {}",
            "Error:".bright_red().bold(),
            path.display(),
            e
        );
        return exit::IO;
    }

    println!(
        "{} Watching {} for changes ({} to stop)",
        "👀".bright_cyan(),
        path.display().to_string().bright_green(),
        "Ctrl+C".bright_red()
    );

    for msg in rx.iter() {
        match msg {
            Ok(event) => {
                if watcher::changed_paths(event).is_empty() {
                    continue;
                }
                println!("{} File changed, re-running...", "⚡".bright_yellow());
                interpreter.reset();
                let status = run_file(&mut interpreter, path);
                tracing::debug!(path = %path.display(), status, "Re-ran watched file");
            }
            Err(e) => {
                tracing::warn!(error = %e, "File watcher reported an error");
                eprintln!("{} Watch error: {}", "Error:".red(), e)
            }
        }
    }

    exit::OK
}

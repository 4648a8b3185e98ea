//! Argument handling for the `hinton` binary

use clap::Parser;
use hinton_core::HintonError;
use std::path::PathBuf;

/// Exit statuses, following the BSD `sysexits` numbering
pub mod exit {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 64;
    pub const SYNTAX: i32 = 65;
    pub const RUNTIME: i32 = 70;
    pub const IO: i32 = 74;
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Repl,
    File(PathBuf),
    Eval(String),
}

/// Runs FILE, evaluates CODE, or starts the REPL when neither is given
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "hinton",
    version,
    about,
    long_about = None,
    after_help = "Set RUST_LOG (e.g. RUST_LOG=hinton_core=trace) to see interpreter logs."
)]
pub struct CliOptions {
    /// Script to run
    #[arg(conflicts_with = "eval")]
    pub file: Option<PathBuf>,

    /// Run CODE and exit
    #[arg(short, long, value_name = "CODE")]
    pub eval: Option<String>,

    /// Maximum call depth, overriding HINTON_MAX_CALL_DEPTH
    #[arg(long, value_name = "N", value_parser = parse_depth)]
    pub max_depth: Option<usize>,

    /// Re-run FILE whenever it changes
    #[arg(long, requires = "file")]
    pub watch: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl CliOptions {
    pub fn mode(&self) -> Mode {
        match (&self.file, &self.eval) {
            (Some(path), _) => Mode::File(path.clone()),
            (None, Some(code)) => Mode::Eval(code.clone()),
            (None, None) => Mode::Repl,
        }
    }
}

fn parse_depth(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(format!("invalid call depth '{}'", value)),
    }
}

/// Exit status for a failed pipeline run
pub fn exit_code(error: &HintonError) -> i32 {
    match error {
        HintonError::Syntax(_) => exit::SYNTAX,
        HintonError::Runtime(_) => exit::RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;
    use hinton_core::parser::{RuntimeError, RuntimeErrorKind, Span, SyntaxError};
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<CliOptions, clap::Error> {
        CliOptions::try_parse_from(std::iter::once("hinton").chain(args.iter().copied()))
    }

    #[test]
    fn test_command_definition() {
        CliOptions::command().debug_assert();
    }

    #[test]
    fn test_no_arguments_starts_repl() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.mode(), Mode::Repl);
        assert_eq!(options.max_depth, None);
        assert!(!options.watch && !options.no_color);
    }

    #[test]
    fn test_file_with_flags() {
        let options = parse(&["--max-depth", "50", "script.hn", "--watch", "--no-color"]).unwrap();
        assert_eq!(
            options,
            CliOptions {
                file: Some(PathBuf::from("script.hn")),
                eval: None,
                max_depth: Some(50),
                watch: true,
                no_color: true,
            }
        );
        assert_eq!(options.mode(), Mode::File(PathBuf::from("script.hn")));
    }

    #[test]
    fn test_eval_and_inline_depth() {
        let options = parse(&["-e", "print(1);", "--max-depth=7"]).unwrap();
        assert_eq!(options.mode(), Mode::Eval("print(1);".to_string()));
        assert_eq!(options.max_depth, Some(7));
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["x.hn", "--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse(&["-V"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_usage_errors() {
        let cases: [&[&str]; 8] = [
            &["-e"],
            &["--max-depth", "0"],
            &["--max-depth", "lots"],
            &["--frobnicate"],
            &["a.hn", "b.hn"],
            &["-e", "1;", "a.hn"],
            &["--watch"],
            &["--watch", "-e", "1;"],
        ];
        for args in cases {
            let err = parse(args).unwrap_err();
            assert!(err.use_stderr(), "{:?} should be a usage error", args);
        }
    }

    #[test]
    fn test_exit_codes() {
        let syntax = HintonError::Syntax(vec![SyntaxError::new("bad", Span::default())]);
        let runtime = HintonError::Runtime(RuntimeError::new(
            RuntimeErrorKind::DivisionByZero,
            "Division by zero.",
            Span::default(),
        ));
        assert_eq!(exit_code(&syntax), exit::SYNTAX);
        assert_eq!(exit_code(&runtime), exit::RUNTIME);
    }
}

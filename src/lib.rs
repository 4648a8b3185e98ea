//! # Hinton
//!
//! Command-line front end for the Hinton scripting language. The language
//! itself (lexer, parser, environment chain and interpreter) lives in
//! `hinton-core`; this crate adds the pieces a terminal user touches.
//!
//! ## Modules
//!
//! - `cli`: Argument parsing and exit statuses for the `hinton` binary.
//! - `commands`: The REPL command registry (`help`, `vars`, `load`, ...).
//! - `repl`: The interactive Read-Eval-Print Loop and its file watcher.

pub mod cli;
pub mod commands;
pub mod repl;

// Re-export commonly used types for convenience
pub use hinton_core::{HintonError, Interpreter, InterpreterConfig, Value};

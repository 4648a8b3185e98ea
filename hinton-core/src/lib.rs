//! # Hinton Core
//!
//! Parser, environment chain and tree-walking interpreter for the Hinton
//! scripting language.
//!
//! ## Features
//!
//! - **colored**: Colored diagnostics from [`report`] (enabled by default)
//! - **serde**: Serialize spans, errors and configuration
//!
//! ## Example
//!
//! ```
//! use hinton_core::parser::{Interpreter, Value};
//!
//! let mut interpreter = Interpreter::new();
//! let result = interpreter.run_source("func sq(x) { return x * x; } sq(7);").unwrap();
//! assert_eq!(result, Some(Value::Int(49)));
//! ```

pub mod config;
pub mod parser;
pub mod report;
pub mod stack;

// Re-export commonly used types
pub use config::InterpreterConfig;
pub use parser::{HintonError, Interpreter, RuntimeError, RuntimeErrorKind, SyntaxError, Value};

/// Parse and run `source` in a fresh interpreter
pub fn run(source: &str) -> anyhow::Result<Option<Value>> {
    Interpreter::new().run_source(source)
}

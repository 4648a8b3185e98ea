// hinton-core/src/parser/mod.rs

pub mod ast;
pub mod builtins;
pub mod callable;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod statement_parser;
pub mod value;


pub use ast::{Expression, FunctionDecl, Program, Statement};
pub use builtins::{DocItem, NativeRegistry};
pub use callable::{Callable, NativeContext, NativeError};
pub use environment::{DeclKind, Environment, SharedEnvironment};
pub use error::{HintonError, RuntimeError, RuntimeErrorKind, RuntimeResult, SyntaxError};
pub use interpreter::{ControlFlow, Interpreter};
pub use lexer::{Lexer, Span, Token};
pub use statement_parser::{parse_expression, parse_program, StatementParser};
pub use value::Value;

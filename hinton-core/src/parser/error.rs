//! Error types for the Hinton pipeline
//!
//! Syntax errors come out of the lexer and the statement parser; runtime
//! errors come out of the interpreter. A program that produced any syntax
//! error is never executed, so the two taxonomies never mix.

use crate::parser::lexer::Span;
use std::fmt;

/// A malformed token sequence, located at the offending token
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError at {}: {}", self.span, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Classification of evaluation-time failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuntimeErrorKind {
    /// Operator applied to operands of incompatible types
    TypeMismatch,
    UndefinedVariable,
    ConstantReassignment,
    NotCallable,
    ArityMismatch,
    IndexOutOfRange,
    NonIntegerIndex,
    UnsupportedIndexTarget,
    KeyNotFound,
    DivisionByZero,
    IntegerOverflow,
    /// `break`, `continue` or `return` with no frame to consume it
    MisplacedControlFlow,
    /// Call depth exceeded the configured limit
    StackOverflow,
    IteratorExhausted,
    AssertionFailed,
    /// Failure reported by a host function that fits no other kind
    NativeFailure,
}

impl RuntimeErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeErrorKind::TypeMismatch => "TypeMismatch",
            RuntimeErrorKind::UndefinedVariable => "UndefinedVariable",
            RuntimeErrorKind::ConstantReassignment => "ConstantReassignment",
            RuntimeErrorKind::NotCallable => "NotCallable",
            RuntimeErrorKind::ArityMismatch => "ArityMismatch",
            RuntimeErrorKind::IndexOutOfRange => "IndexOutOfRange",
            RuntimeErrorKind::NonIntegerIndex => "NonIntegerIndex",
            RuntimeErrorKind::UnsupportedIndexTarget => "UnsupportedIndexTarget",
            RuntimeErrorKind::KeyNotFound => "KeyNotFound",
            RuntimeErrorKind::DivisionByZero => "DivisionByZero",
            RuntimeErrorKind::IntegerOverflow => "IntegerOverflow",
            RuntimeErrorKind::MisplacedControlFlow => "MisplacedControlFlow",
            RuntimeErrorKind::StackOverflow => "StackOverflow",
            RuntimeErrorKind::IteratorExhausted => "IteratorExhausted",
            RuntimeErrorKind::AssertionFailed => "AssertionFailed",
            RuntimeErrorKind::NativeFailure => "NativeFailure",
        }
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An evaluation failure tied to the source location that triggered it
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub span: Span,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::new(RuntimeErrorKind::TypeMismatch, message, span)
    }

    pub fn undefined_variable(name: &str, span: Span) -> Self {
        Self::new(
            RuntimeErrorKind::UndefinedVariable,
            format!("Undefined variable '{}'.", name),
            span,
        )
    }

    pub fn is(&self, kind: RuntimeErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.span, self.message)
    }
}

impl std::error::Error for RuntimeError {}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failure of the whole source-to-result pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum HintonError {
    /// Every syntax error found in the source, in source order
    Syntax(Vec<SyntaxError>),
    Runtime(RuntimeError),
}

impl HintonError {
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        match self {
            HintonError::Syntax(errors) => errors,
            HintonError::Runtime(_) => &[],
        }
    }

    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            HintonError::Runtime(error) => Some(error),
            HintonError::Syntax(_) => None,
        }
    }
}

impl fmt::Display for HintonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintonError::Syntax(errors) => {
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
            HintonError::Runtime(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for HintonError {}

impl From<RuntimeError> for HintonError {
    fn from(error: RuntimeError) -> Self {
        HintonError::Runtime(error)
    }
}

impl From<Vec<SyntaxError>> for HintonError {
    fn from(errors: Vec<SyntaxError>) -> Self {
        HintonError::Syntax(errors)
    }
}

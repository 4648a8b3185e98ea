//! Callable values
//!
//! A single capability covers everything that may appear in call position:
//! user functions, lambdas and host-provided natives. The call site checks
//! arity through [`Callable::accepts`] and then dispatches through
//! [`Callable::call`].

use crate::parser::ast::FunctionDecl;
use crate::parser::environment::SharedEnvironment;
use crate::parser::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::parser::interpreter::Interpreter;
use crate::parser::lexer::Span;
use crate::parser::value::Value;
use std::fmt;
use std::io::{BufRead, Write};
use std::rc::Rc;

/// Host function body. Receives the already-evaluated arguments.
pub type NativeHandler =
    Rc<dyn Fn(&[Value], &mut NativeContext<'_>) -> Result<Value, NativeError>>;

/// I/O handles a native may use, borrowed from the running interpreter
pub struct NativeContext<'a> {
    pub output: &'a mut dyn Write,
    pub input: &'a mut dyn BufRead,
}

/// Failure raised from inside a native. The interpreter attaches the call
/// site's location when it converts this into a [`RuntimeError`].
#[derive(Debug, Clone, PartialEq)]
pub struct NativeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl NativeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        NativeError {
            kind,
            message: message.into(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::TypeMismatch, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::NativeFailure, message)
    }

    pub fn at(self, span: Span) -> RuntimeError {
        RuntimeError::new(self.kind, self.message, span)
    }
}

impl From<std::io::Error> for NativeError {
    fn from(error: std::io::Error) -> Self {
        NativeError::failure(format!("I/O error: {}", error))
    }
}

/// A function implemented by the host
pub struct NativeFunction {
    pub name: String,
    pub min_arity: usize,
    pub max_arity: usize,
    pub description: String,
    pub signature: String,
    pub handler: NativeHandler,
}

impl NativeFunction {
    pub fn invoke(&self, args: &[Value], ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        (self.handler)(args, ctx)
    }
}

/// Anything that can be called
#[derive(Clone)]
pub enum Callable {
    /// Declared with `func name(...)`
    Function {
        decl: Rc<FunctionDecl>,
        closure: SharedEnvironment,
    },
    /// Created by `fn (...) => expr` or `fn (...) { ... }`
    Lambda {
        decl: Rc<FunctionDecl>,
        closure: SharedEnvironment,
    },
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Function { decl, .. } | Callable::Lambda { decl, .. } => decl.display_name(),
            Callable::Native(native) => &native.name,
        }
    }

    /// Minimum number of arguments
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function { decl, .. } | Callable::Lambda { decl, .. } => {
                decl.required_arity()
            }
            Callable::Native(native) => native.min_arity,
        }
    }

    /// Maximum number of arguments
    pub fn max_arity(&self) -> usize {
        match self {
            Callable::Function { decl, .. } | Callable::Lambda { decl, .. } => decl.max_arity(),
            Callable::Native(native) => native.max_arity,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.arity() && count <= self.max_arity()
    }

    /// Message used when `count` arguments are rejected
    pub fn arity_message(&self, count: usize) -> String {
        let (min, max) = (self.arity(), self.max_arity());
        if min == max {
            format!("Expected {} arguments but got {}.", min, count)
        } else {
            format!("Expected {} to {} arguments but got {}.", min, max, count)
        }
    }

    /// Identity comparison: two values are the same callable only if they
    /// come from the same declaration evaluated in the same scope.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (
                Callable::Function { decl: a, closure: ca },
                Callable::Function { decl: b, closure: cb },
            )
            | (
                Callable::Lambda { decl: a, closure: ca },
                Callable::Lambda { decl: b, closure: cb },
            ) => Rc::ptr_eq(a, b) && Rc::ptr_eq(ca, cb),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Invoke with arguments whose count has already been checked
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        span: Span,
    ) -> RuntimeResult<Value> {
        match self {
            Callable::Function { decl, closure } | Callable::Lambda { decl, closure } => {
                interpreter.call_function(decl, closure, args, span)
            }
            Callable::Native(native) => {
                let mut ctx = interpreter.native_context();
                native.invoke(&args, &mut ctx).map_err(|e| e.at(span))
            }
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function { .. } | Callable::Lambda { .. } => {
                write!(f, "<Func '{}'>", self.name())
            }
            Callable::Native(native) => write!(f, "<NativeFunc '{}'>", native.name),
        }
    }
}

// Closures reach back into their scope chain, so Debug stays shallow
impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

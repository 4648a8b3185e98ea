//! Native functions
//!
//! Host functions installed into every interpreter's global scope, along
//! with the documentation the REPL's `natives` command lists.

use crate::parser::callable::{
    Callable, NativeContext, NativeError, NativeFunction, NativeHandler,
};
use crate::parser::environment::{DeclKind, Environment};
use crate::parser::error::RuntimeErrorKind;
use crate::parser::value::Value;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

/// Documentation entry for a registered native, used by the REPL
#[derive(Debug, Clone, PartialEq)]
pub struct DocItem {
    pub name: String,
    pub description: String,
    pub signature: String,
}

/// Host functions installed into the global scope of every interpreter
pub struct NativeRegistry {
    functions: HashMap<String, Rc<NativeFunction>>,
}

impl Default for NativeRegistry {
    fn default() -> Self {
        NativeRegistry::with_standard_library()
    }
}

impl NativeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        NativeRegistry {
            functions: HashMap::new(),
        }
    }

    /// A registry holding print, input, iter, next and the assertions
    pub fn with_standard_library() -> Self {
        let mut registry = NativeRegistry::new();
        registry.register_all();
        registry
    }

    /// Add or replace a native. Arity bounds are inclusive.
    pub fn register(
        &mut self,
        name: &str,
        min_arity: usize,
        max_arity: usize,
        description: &str,
        signature: &str,
        handler: impl Fn(&[Value], &mut NativeContext<'_>) -> Result<Value, NativeError> + 'static,
    ) {
        let handler: NativeHandler = Rc::new(handler);
        self.functions.insert(
            name.to_string(),
            Rc::new(NativeFunction {
                name: name.to_string(),
                min_arity,
                max_arity: max_arity.max(min_arity),
                description: description.to_string(),
                signature: signature.to_string(),
                handler,
            }),
        );
    }

    pub fn get(&self, name: &str) -> Option<Rc<NativeFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get_documentation(&self) -> Vec<DocItem> {
        let mut docs: Vec<DocItem> = self
            .functions
            .values()
            .map(|f| DocItem {
                name: f.name.clone(),
                description: f.description.clone(),
                signature: f.signature.clone(),
            })
            .collect();

        docs.sort_by(|a, b| a.name.cmp(&b.name));
        docs
    }

    /// Bind every native in `env`. User code may shadow or rebind them.
    pub fn install(&self, env: &mut Environment) {
        for (name, native) in &self.functions {
            env.define(
                name.clone(),
                Value::Callable(Callable::Native(native.clone())),
                DeclKind::Native,
            );
        }
    }

    fn register_all(&mut self) {
        // --- I/O ---

        self.register(
            "print",
            1,
            1,
            "Writes a value followed by a newline.",
            "print(value) -> null",
            |args, ctx| {
                writeln!(ctx.output, "{}", args[0])?;
                Ok(Value::Null)
            },
        );

        self.register(
            "input",
            0,
            1,
            "Reads one line of input, optionally writing a prompt first.",
            "input(prompt?: String) -> String",
            |args, ctx| read_line(args.first(), ctx),
        );

        // --- Iteration ---

        self.register(
            "iter",
            1,
            1,
            "Creates an iterator over an Array, String, Range or Dict.",
            "iter(value) -> Iterator",
            |args, _| {
                args[0].iterate().map(Value::Iter).ok_or_else(|| {
                    NativeError::type_mismatch(format!(
                        "Cannot iterate over a value of type '{}'.",
                        args[0].type_name()
                    ))
                })
            },
        );

        self.register(
            "next",
            1,
            1,
            "Advances an iterator and returns the next element.",
            "next(iterator: Iterator) -> value",
            |args, _| match &args[0] {
                Value::Iter(state) => state.borrow_mut().next_value().ok_or_else(|| {
                    NativeError::new(
                        RuntimeErrorKind::IteratorExhausted,
                        "Iterator is exhausted.",
                    )
                }),
                other => Err(NativeError::type_mismatch(format!(
                    "Expected an 'Iterator', got '{}'.",
                    other.type_name()
                ))),
            },
        );

        // --- Assertions ---

        self.register(
            "assert",
            1,
            2,
            "Fails unless the value is truthy.",
            "assert(value, message?: String) -> null",
            |args, _| {
                if args[0].is_truthy() {
                    Ok(Value::Null)
                } else {
                    Err(assertion_failure(
                        args.get(1),
                        format!("Assertion failed: {} is not truthy.", args[0].repr()),
                    ))
                }
            },
        );

        self.register(
            "assert_eq",
            2,
            3,
            "Fails unless both values are equal.",
            "assert_eq(left, right, message?: String) -> null",
            |args, _| {
                if args[0] == args[1] {
                    Ok(Value::Null)
                } else {
                    Err(assertion_failure(
                        args.get(2),
                        format!(
                            "Assertion failed: {} is not equal to {}.",
                            args[0].repr(),
                            args[1].repr()
                        ),
                    ))
                }
            },
        );

        self.register(
            "assert_ne",
            2,
            3,
            "Fails if both values are equal.",
            "assert_ne(left, right, message?: String) -> null",
            |args, _| {
                if args[0] != args[1] {
                    Ok(Value::Null)
                } else {
                    Err(assertion_failure(
                        args.get(2),
                        format!(
                            "Assertion failed: both values are equal to {}.",
                            args[0].repr()
                        ),
                    ))
                }
            },
        );
    }
}

fn read_line(prompt: Option<&Value>, ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
    if let Some(prompt) = prompt {
        write!(ctx.output, "{}", prompt)?;
        ctx.output.flush()?;
    }

    let mut line = String::new();
    ctx.input.read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Value::from(trimmed))
}

/// A user-supplied message replaces the default one
fn assertion_failure(message: Option<&Value>, default: String) -> NativeError {
    let message = match message {
        Some(Value::Null) | None => default,
        Some(custom) => custom.to_string(),
    };
    NativeError::new(RuntimeErrorKind::AssertionFailed, message)
}

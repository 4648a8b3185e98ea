//! Interpreter for executing Hinton programs
//!
//! Executes statements against a chain of environments. Statements never
//! produce values; they complete normally or raise a [`ControlFlow`] signal
//! that travels up to the loop or call frame that consumes it.

use crate::config::InterpreterConfig;
use crate::parser::ast::{FunctionDecl, Program, Statement};
use crate::parser::builtins::NativeRegistry;
use crate::parser::callable::{Callable, NativeContext, NativeError};
use crate::parser::environment::{DeclKind, Environment, SharedEnvironment};
use crate::parser::error::{HintonError, RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::parser::lexer::Span;
use crate::parser::statement_parser::parse_program;
use crate::parser::value::Value;
use crate::stack::ensure_sufficient_stack;
use anyhow::Context;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Control flow signals for break/continue/return
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Break(Span),
    Continue(Span),
    Return(Value, Span),
}

impl ControlFlow {
    /// Error for a signal that reached a frame unable to consume it
    fn misplaced(&self) -> Option<RuntimeError> {
        let (message, span) = match self {
            ControlFlow::Normal => return None,
            ControlFlow::Break(span) => ("'break' used outside of a loop.", span),
            ControlFlow::Continue(span) => ("'continue' used outside of a loop.", span),
            ControlFlow::Return(_, span) => ("'return' used outside of a function.", span),
        };
        Some(RuntimeError::new(
            RuntimeErrorKind::MisplacedControlFlow,
            message,
            *span,
        ))
    }
}

/// Tree-walking interpreter for Hinton programs
pub struct Interpreter {
    /// Global scope, pre-seeded with natives
    globals: SharedEnvironment,
    natives: NativeRegistry,
    config: InterpreterConfig,
    /// Number of user-function calls currently active
    call_depth: usize,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// Create a new interpreter writing to stdout and reading from stdin
    pub fn new() -> Self {
        Interpreter::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Interpreter::with_io(
            config,
            Box::new(std::io::stdout()),
            Box::new(BufReader::new(std::io::stdin())),
        )
    }

    /// Create an interpreter whose natives use the given I/O handles
    pub fn with_io(
        config: InterpreterConfig,
        output: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Self {
        let mut interpreter = Interpreter {
            globals: Environment::new_shared(),
            natives: NativeRegistry::with_standard_library(),
            config,
            call_depth: 0,
            output,
            input,
        };
        interpreter.install_natives();
        interpreter
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn globals(&self) -> &SharedEnvironment {
        &self.globals
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Look up a global binding
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name)
    }

    /// Register a host function and bind it in the global scope.
    ///
    /// Arity bounds are inclusive; calls outside them fail before the
    /// handler runs.
    pub fn register_native(
        &mut self,
        name: &str,
        min_arity: usize,
        max_arity: usize,
        handler: impl Fn(&[Value], &mut NativeContext<'_>) -> Result<Value, NativeError> + 'static,
    ) {
        self.natives
            .register(name, min_arity, max_arity, "", "", handler);
        if let Some(native) = self.natives.get(name) {
            self.globals.borrow_mut().define(
                name,
                Value::Callable(Callable::Native(native)),
                DeclKind::Native,
            );
        }
    }

    /// Discard every user binding and start from a fresh global scope
    pub fn reset(&mut self) {
        self.globals = Environment::new_shared();
        self.call_depth = 0;
        self.install_natives();
    }

    fn install_natives(&mut self) {
        tracing::trace!(count = self.natives.len(), "Installing natives");
        self.natives.install(&mut self.globals.borrow_mut());
    }

    /// Handles passed to natives for the duration of one call
    pub(crate) fn native_context(&mut self) -> NativeContext<'_> {
        NativeContext {
            output: &mut *self.output,
            input: &mut *self.input,
        }
    }

    /// Run a complete program in the global scope.
    ///
    /// Returns the value of the final statement when it is an expression
    /// statement. Halts at the first runtime error.
    pub fn interpret(&mut self, program: &Program) -> RuntimeResult<Option<Value>> {
        tracing::debug!(statements = program.len(), "Running program");

        let globals = self.globals.clone();
        let mut last_value = None;

        for stmt in &program.statements {
            let result = match stmt {
                Statement::Expression(expr) => self.evaluate(expr, &globals).map(|value| {
                    last_value = Some(value);
                    ControlFlow::Normal
                }),
                _ => {
                    last_value = None;
                    self.execute(stmt, &globals)
                }
            };

            let error = match result {
                Ok(flow) => flow.misplaced(),
                Err(error) => Some(error),
            };
            if let Some(error) = error {
                tracing::warn!(kind = error.kind.name(), %error, "Program halted");
                self.call_depth = 0;
                return Err(error);
            }
        }

        tracing::debug!("Program finished");
        Ok(last_value)
    }

    /// Parse and run source text, keeping syntax and runtime errors apart
    pub fn execute_source(&mut self, source: &str) -> Result<Option<Value>, HintonError> {
        let program = parse_program(source)?;
        Ok(self.interpret(&program)?)
    }

    /// Parse and run source text
    pub fn run_source(&mut self, source: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.execute_source(source)?)
    }

    /// Read, parse and run a source file
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<Option<Value>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.execute_source(&source)
            .with_context(|| format!("Failed to run {}", path.display()))
    }

    /// Execute a single statement
    pub fn execute(
        &mut self,
        stmt: &Statement,
        env: &SharedEnvironment,
    ) -> RuntimeResult<ControlFlow> {
        ensure_sufficient_stack(|| self.execute_statement(stmt, env))
    }

    fn execute_statement(
        &mut self,
        stmt: &Statement,
        env: &SharedEnvironment,
    ) -> RuntimeResult<ControlFlow> {
        match stmt {
            Statement::Var {
                names, initializer, ..
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Null,
                };
                let mut scope = env.borrow_mut();
                for name in names {
                    scope.define(name.clone(), value.clone(), DeclKind::Variable);
                }
                Ok(ControlFlow::Normal)
            }

            Statement::Const {
                name, initializer, ..
            } => {
                let value = self.evaluate(initializer, env)?;
                env.borrow_mut()
                    .define(name.clone(), value, DeclKind::Constant);
                Ok(ControlFlow::Normal)
            }

            Statement::Function(decl) => {
                let function = Callable::Function {
                    decl: decl.clone(),
                    closure: env.clone(),
                };
                env.borrow_mut().define(
                    decl.display_name(),
                    Value::Callable(function),
                    DeclKind::Function,
                );
                Ok(ControlFlow::Normal)
            }

            Statement::Block(statements) => self.execute_block(statements, Environment::child(env)),

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }

            Statement::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    match self.execute(body, env)? {
                        ControlFlow::Break(_) => break,
                        ControlFlow::Continue(_) | ControlFlow::Normal => {}
                        flow @ ControlFlow::Return(..) => return Ok(flow),
                    }
                }
                Ok(ControlFlow::Normal)
            }

            Statement::For {
                variable,
                iterable,
                body,
                ..
            } => {
                let source = self.evaluate(iterable, env)?;
                let iter = source.iterate().ok_or_else(|| {
                    RuntimeError::type_mismatch(
                        format!(
                            "Cannot iterate over a value of type '{}'.",
                            source.type_name()
                        ),
                        iterable.span(),
                    )
                })?;

                loop {
                    // The cursor borrow ends here, before the body can touch the iterator
                    let next = iter.borrow_mut().next_value();
                    let Some(item) = next else { break };

                    let scope = Environment::child(env);
                    scope
                        .borrow_mut()
                        .define(variable.clone(), item, DeclKind::Variable);

                    match self.execute(body, &scope)? {
                        ControlFlow::Break(_) => break,
                        ControlFlow::Continue(_) | ControlFlow::Normal => {}
                        flow @ ControlFlow::Return(..) => return Ok(flow),
                    }
                }
                Ok(ControlFlow::Normal)
            }

            Statement::Break(span) => Ok(ControlFlow::Break(*span)),

            Statement::Continue(span) => Ok(ControlFlow::Continue(*span)),

            Statement::Return { value, span } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Null,
                };
                Ok(ControlFlow::Return(value, *span))
            }

            Statement::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(ControlFlow::Normal)
            }
        }
    }

    /// Execute statements in `env`, stopping at the first signal or error.
    /// The scope is dropped on every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        env: SharedEnvironment,
    ) -> RuntimeResult<ControlFlow> {
        for stmt in statements {
            match self.execute(stmt, &env)? {
                ControlFlow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Normal)
    }

    /// Invoke a user function or lambda whose arity was already checked
    pub(crate) fn call_function(
        &mut self,
        decl: &FunctionDecl,
        closure: &SharedEnvironment,
        args: Vec<Value>,
        span: Span,
    ) -> RuntimeResult<Value> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(
                RuntimeErrorKind::StackOverflow,
                format!(
                    "Maximum call depth of {} exceeded in '{}'.",
                    self.config.max_call_depth,
                    decl.display_name()
                ),
                span,
            ));
        }

        self.call_depth += 1;
        tracing::trace!(
            function = decl.display_name(),
            depth = self.call_depth,
            "Calling function"
        );
        let result = self.run_body(decl, closure, args);
        self.call_depth -= 1;
        result
    }

    fn run_body(
        &mut self,
        decl: &FunctionDecl,
        closure: &SharedEnvironment,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let scope = Environment::child(closure);

        // Defaults are evaluated where the function was defined
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.evaluate(default, closure)?,
                (None, None) => Value::Null,
            };
            scope
                .borrow_mut()
                .define(param.name.clone(), value, DeclKind::Variable);
        }

        match self.execute_block(&decl.body, scope)? {
            ControlFlow::Return(value, _) => Ok(value),
            ControlFlow::Normal => Ok(Value::Null),
            flow => Err(flow.misplaced().unwrap_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::MisplacedControlFlow,
                    "Unexpected control flow.",
                    decl.span,
                )
            })),
        }
    }
}

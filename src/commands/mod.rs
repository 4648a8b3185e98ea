//! Command registry for REPL commands
//!
//! Lines that start with a registered prefix are handled here, unless the
//! rest of the line reads as an expression (`exit = 1;`). Everything else
//! falls through to the interpreter as Hinton source.

pub mod general;

use hinton_core::report::render_error;
use hinton_core::{Interpreter, Value};
use std::fs;

/// Result of executing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// Not a command, evaluate the line as source
    NotACommand,
    /// Error occurred
    Error(String),
    /// Watch a file for changes
    Watch(String),
    /// Stop watching a file
    Unwatch(String),
}

/// Context passed to command handlers
pub struct CommandContext<'a> {
    pub interpreter: &'a mut Interpreter,
}

impl<'a> CommandContext<'a> {
    pub fn new(interpreter: &'a mut Interpreter) -> Self {
        Self { interpreter }
    }

    /// Run a file in the REPL's interpreter.
    ///
    /// On failure the error is returned already rendered against the file's
    /// source.
    pub fn load(&mut self, path: &str) -> Result<Option<Value>, String> {
        let source =
            fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
        self.interpreter
            .execute_source(&source)
            .map_err(|e| render_error(&e, &source, path))
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext<'_>) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext<'_>) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                if looks_like_source(args) {
                    break;
                }
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

/// Arguments that continue an expression rather than name a command operand,
/// as in `exit = 1;` or `vars[0];`
fn looks_like_source(args: &str) -> bool {
    const OPERATORS: [&str; 13] = [
        "=", "+=", "-=", "*=", "/=", "%=", "**=", "++", "--", "!=", "(", "[", ";",
    ];
    OPERATORS.iter().any(|op| args.starts_with(op))
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);
    registry.register("vars", general::cmd_vars);
    registry.register("natives", general::cmd_natives);
    registry.register("load", general::cmd_load);
    registry.register("watch", general::cmd_watch);
    registry.register("unwatch", general::cmd_unwatch);
    registry.register("reset", general::cmd_reset);

    registry
}

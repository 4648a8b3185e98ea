//! REPL (Read-Eval-Print Loop) for the Hinton language

use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::repl::watcher::{changed_paths, FileWatcher};
use anyhow::Result;
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use hinton_core::report::render_error;
use hinton_core::{Interpreter, InterpreterConfig, Value};
use notify::Event;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RustylineResult};
use std::path::Path;
use std::thread;

pub mod watcher;

/// Origin shown in diagnostics for lines typed at the prompt
const INPUT_ORIGIN: &str = "<repl>";

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// What the loop should do after handling a line
#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Exit,
}

/// Interactive REPL for the Hinton language
pub struct Repl {
    editor: Option<DefaultEditor>,
    /// Persistent interpreter shared by every line and reload
    interpreter: Interpreter,
    registry: CommandRegistry,

    // Event channels
    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    // File watcher
    watcher: Option<FileWatcher>,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(config: InterpreterConfig) -> RustylineResult<Self> {
        let editor = DefaultEditor::new()?;
        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            interpreter: Interpreter::with_config(config),
            registry: create_registry(),
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
        })
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!("{}", "Hinton Language REPL".bright_cyan().bold());
        println!(
            "Type statements like: {}, {}, {}",
            "let x = 2;".cyan(),
            "x ** 10".cyan(),
            "func sq(n) { return n * n; }".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        let Some(mut editor) = self.editor.take() else {
            anyhow::bail!("REPL is already running");
        };
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "hinton>".bright_magenta().bold());
            let readline = editor.readline(&prompt);

            match readline {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(ReplEvent::Input(Err(err)));
                    break;
                }
            }
        });

        let rx_input = self.rx_input.clone();
        let rx_watcher = self.rx_watcher.clone();

        loop {
            crossbeam_channel::select! {
                recv(rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => {
                        if self.handle_line(&line) == Flow::Exit {
                            println!("{}", "Goodbye!".bright_cyan());
                            break;
                        }
                    }
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted)))
                    | Ok(ReplEvent::Input(Err(ReadlineError::Eof))) => {
                        println!("{}", "Goodbye!".bright_cyan());
                        break;
                    }
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break, // Channel closed
                },

                recv(rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => {
                        for path in changed_paths(event) {
                            println!("{} File changed: {}", "⚡".bright_yellow(), path.display());
                            self.reload(&path);
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "File watcher reported an error");
                        println!("{} Watch error: {}", "Error:".red(), e)
                    }
                    Err(_) => break, // Channel closed
                }
            }
        }

        Ok(())
    }

    /// Dispatch one input line to a command or to the interpreter
    fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }

        let mut ctx = CommandContext::new(&mut self.interpreter);
        match self.registry.execute(line, &mut ctx) {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => return Flow::Exit,
            CommandResult::Error(e) => println!("{} {}", "Error:".bright_red().bold(), e),
            CommandResult::Watch(path) => self.watch(&path),
            CommandResult::Unwatch(path) => self.unwatch(&path),
            CommandResult::NotACommand => {
                let source = complete_statement(line);
                match self.evaluate(&source) {
                    Ok(Some(text)) => println!("{}", text),
                    Ok(None) => {}
                    Err(rendered) => print!("{}", rendered),
                }
            }
        }
        Flow::Continue
    }

    /// Run source typed at the prompt.
    ///
    /// Returns the text to echo, if any, or the rendered diagnostics.
    fn evaluate(&mut self, source: &str) -> Result<Option<String>, String> {
        let echo = self.interpreter.config().echo_results;
        match self.interpreter.execute_source(source) {
            Ok(value) => Ok(value.and_then(|v| echo_text(&v, echo))),
            Err(e) => Err(render_error(&e, source, INPUT_ORIGIN)),
        }
    }

    fn watch(&mut self, path: &str) {
        // Initialize watcher if needed
        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => println!("{} Failed to create watcher: {}", "Error:".red(), e),
            }
        }

        if let Some(w) = &mut self.watcher {
            if let Err(e) = w.watch(path) {
                println!("{} Failed to watch {}: {}", "Error:".red(), path, e);
            } else {
                println!("{} Watching {} for changes...", "👀".bright_cyan(), path.bright_green());
                self.reload(Path::new(path));
            }
        }
    }

    fn unwatch(&mut self, path: &str) {
        match &mut self.watcher {
            Some(w) => match w.unwatch(path) {
                Ok(()) => println!("Stopped watching {}", path.bright_green()),
                Err(e) => println!("{} Failed to unwatch {}: {}", "Error:".red(), path, e),
            },
            None => println!("{} Not watching {}", "Error:".red(), path),
        }
    }

    /// Re-run a watched file in the session's interpreter
    fn reload(&mut self, path: &Path) {
        let origin = path.display().to_string();
        tracing::debug!(path = %origin, "Reloading watched file");
        let mut ctx = CommandContext::new(&mut self.interpreter);
        match ctx.load(&origin) {
            Ok(_) => println!("{} Reloaded {}", "✓".bright_green(), origin),
            Err(rendered) => {
                tracing::debug!(path = %origin, "Watched file failed to run");
                println!("{}", rendered)
            }
        }
    }
}

/// Supply the statement terminator a one-line entry usually omits
pub fn complete_statement(line: &str) -> String {
    let trimmed = line.trim_end();
    if trimmed.ends_with(';') || trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

/// Text echoed for a statement's value; `null` results stay silent
fn echo_text(value: &Value, echo: bool) -> Option<String> {
    match value {
        _ if !echo => None,
        Value::Null => None,
        Value::String(_) => Some(value.repr()),
        other => Some(other.to_string()),
    }
}

/// Convenience function to start the REPL
pub fn start(config: InterpreterConfig) -> Result<()> {
    let mut repl =
        Repl::new(config).map_err(|e| anyhow::anyhow!("Failed to initialize REPL: {}", e))?;
    repl.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repl() -> Repl {
        colored::control::set_override(false);
        Repl::new(InterpreterConfig::default()).expect("line editor")
    }

    #[test]
    fn test_repl_creation() {
        let result = Repl::new(InterpreterConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_complete_statement() {
        assert_eq!(complete_statement("1 + 2"), "1 + 2;");
        assert_eq!(complete_statement("let x = 1;"), "let x = 1;");
        assert_eq!(complete_statement("while (false) {}  "), "while (false) {}");
        assert_eq!(complete_statement("func f() { return 1; }"), "func f() { return 1; }");
    }

    #[test]
    fn test_state_persists_between_lines() {
        let mut repl = repl();
        assert_eq!(repl.evaluate("let x = 20;"), Ok(None));
        assert_eq!(repl.evaluate("func twice(n) { return n * 2; }"), Ok(None));
        assert_eq!(repl.evaluate(&complete_statement("twice(x) + 2")), Ok(Some("42".to_string())));
    }

    #[test]
    fn test_echo_quotes_strings_and_hides_null() {
        let mut repl = repl();
        assert_eq!(repl.evaluate("\"hi\";"), Ok(Some("\"hi\"".to_string())));
        assert_eq!(repl.evaluate("null;"), Ok(None));
        assert_eq!(repl.evaluate("[1, \"a\"];"), Ok(Some("[1, \"a\"]".to_string())));
    }

    #[test]
    fn test_echo_can_be_disabled() {
        colored::control::set_override(false);
        let mut repl = Repl::new(InterpreterConfig::default().with_echo_results(false)).unwrap();
        assert_eq!(repl.evaluate("1 + 1;"), Ok(None));
    }

    #[test]
    fn test_errors_are_rendered_and_session_survives() {
        let mut repl = repl();
        let rendered = repl.evaluate("let y = 1 / 0;").unwrap_err();
        assert!(rendered.starts_with("DivisionByZero: Division by zero."));
        assert!(rendered.contains("<repl>:1:"));

        let rendered = repl.evaluate("let = 3;").unwrap_err();
        assert!(rendered.starts_with("SyntaxError:"));

        assert_eq!(repl.evaluate("let y = 2; y;"), Ok(Some("2".to_string())));
    }

    #[test]
    fn test_reload_reruns_watched_file_in_session() {
        let path = std::env::temp_dir().join(format!("hinton_reload_{}.hn", std::process::id()));
        std::fs::write(&path, "let hits = 1;").unwrap();

        let mut repl = repl();
        repl.reload(&path);
        assert_eq!(repl.interpreter.get_global("hits"), Some(Value::Int(1)));

        std::fs::write(&path, "hits = hits + 1;").unwrap();
        repl.reload(&path);
        assert_eq!(repl.interpreter.get_global("hits"), Some(Value::Int(2)));

        // A failing run keeps the session
        std::fs::write(&path, "hits = 1 / 0;").unwrap();
        repl.reload(&path);
        assert_eq!(repl.interpreter.get_global("hits"), Some(Value::Int(2)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_assignment_to_command_name_reaches_interpreter() {
        let mut repl = repl();
        assert_eq!(repl.handle_line("let vars = 3"), Flow::Continue);
        assert_eq!(repl.handle_line("vars = vars * 2"), Flow::Continue);
        assert_eq!(repl.interpreter.get_global("vars"), Some(Value::Int(6)));
    }

    #[test]
    fn test_commands_before_source() {
        let mut repl = repl();
        assert_eq!(repl.handle_line("let a = 1"), Flow::Continue);
        assert!(repl.interpreter.get_global("a").is_some());
        assert_eq!(repl.handle_line("reset"), Flow::Continue);
        assert!(repl.interpreter.get_global("a").is_none());
        assert_eq!(repl.handle_line("quit"), Flow::Exit);
        assert_eq!(repl.handle_line("exit"), Flow::Exit);
    }
}

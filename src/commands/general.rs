//! General REPL commands

use crate::commands::{CommandContext, CommandResult};
use colored::*;
use hinton_core::parser::DeclKind;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext<'_>) -> CommandResult {
    CommandResult::Message(help_text())
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext<'_>) -> CommandResult {
    CommandResult::Exit
}

/// Handle `vars` command: every user binding in the global scope
pub fn cmd_vars(_args: &str, ctx: &mut CommandContext<'_>) -> CommandResult {
    let bindings = ctx.interpreter.globals().borrow().all_bindings();
    let lines: Vec<String> = bindings
        .into_iter()
        .filter(|(_, binding)| binding.kind != DeclKind::Native)
        .map(|(name, binding)| {
            let keyword = match binding.kind {
                DeclKind::Constant => "const",
                DeclKind::Function => "func",
                _ => "let",
            };
            format!("{} {} = {}", keyword.bright_blue(), name.cyan(), binding.value.repr())
        })
        .collect();

    if lines.is_empty() {
        CommandResult::Message("No variables defined.".dimmed().to_string())
    } else {
        CommandResult::Message(lines.join("\n"))
    }
}

/// Handle `natives` command
pub fn cmd_natives(_args: &str, ctx: &mut CommandContext<'_>) -> CommandResult {
    let docs = ctx.interpreter.natives().get_documentation();
    let width = docs.iter().map(|d| d.signature.len()).max().unwrap_or(0);
    let lines: Vec<String> = docs
        .iter()
        .map(|doc| {
            let signature = if doc.signature.is_empty() {
                doc.name.clone()
            } else {
                doc.signature.clone()
            };
            let padded = format!("{:<width$}", signature, width = width);
            format!("  {}  {}", padded.cyan(), doc.description)
        })
        .collect();
    CommandResult::Message(format!("{}\n{}", "Native functions:".green(), lines.join("\n")))
}

/// Handle `load <file>` command
pub fn cmd_load(args: &str, ctx: &mut CommandContext<'_>) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: load <file>".to_string());
    }
    match ctx.load(args) {
        Ok(_) => CommandResult::Message(format!("{} Loaded {}", "✓".bright_green(), args)),
        Err(rendered) => CommandResult::Error(rendered),
    }
}

/// Handle `watch <file>` command
pub fn cmd_watch(args: &str, _ctx: &mut CommandContext<'_>) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: watch <file>".to_string());
    }
    CommandResult::Watch(args.to_string())
}

/// Handle `unwatch <file>` command
pub fn cmd_unwatch(args: &str, _ctx: &mut CommandContext<'_>) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: unwatch <file>".to_string());
    }
    CommandResult::Unwatch(args.to_string())
}

/// Handle `reset` command
pub fn cmd_reset(_args: &str, ctx: &mut CommandContext<'_>) -> CommandResult {
    ctx.interpreter.reset();
    CommandResult::Message("Global environment reset.".bright_green().to_string())
}

/// Help text shown by `help`
pub fn help_text() -> String {
    let mut out = Vec::new();
    out.push(format!("{}", "Hinton Language Help".bold()));
    out.push(format!("{}", "====================".bold()));
    out.push(String::new());
    out.push(format!("{}", "Basics:".green()));
    out.push(format!("  {}          - Declare a variable", "let x = 1;".cyan()));
    out.push(format!("  {}       - Declare a constant", "const N = 10;".cyan()));
    out.push(format!("  {}      - Multiple names, one value", "let a, b = 0;".cyan()));
    out.push(format!("  {}  - Exclusive range, counts down when lower > upper", "0..10".cyan()));
    out.push(format!("  {}     - Dictionary literal", "{a: 1, \"b\": 2}".cyan()));
    out.push(String::new());
    out.push(format!("{}", "Control Flow:".green()));
    out.push(format!("  {}", "if (x > 1) print(x); else print(0);".cyan()));
    out.push(format!("  {}", "while (x < 10) x++;".cyan()));
    out.push(format!("  {}", "for (let i in 0..3) { if (i == 1) continue; print(i); }".cyan()));
    out.push(String::new());
    out.push(format!("{}", "Functions:".green()));
    out.push(format!("  {}", "func add(a, b := 1) { return a + b; }".cyan()));
    out.push(format!("  {}        - Optional parameter, null when omitted", "func f(x?) {}".cyan()));
    out.push(format!("  {}      - Lambda", "let sq = fn(x) => x * x;".cyan()));
    out.push(String::new());
    out.push(format!("{}", "Commands:".green()));
    out.push(format!("  {}             - List global bindings", "vars".bright_green()));
    out.push(format!("  {}          - List native functions", "natives".bright_green()));
    out.push(format!("  {}      - Run a file in this session", "load <file>".bright_green()));
    out.push(format!("  {}     - Re-run a file whenever it changes", "watch <file>".bright_green()));
    out.push(format!("  {}   - Stop re-running a file", "unwatch <file>".bright_green()));
    out.push(format!("  {}            - Forget every binding", "reset".bright_green()));
    out.push(format!("  {}             - Show this help", "help".bright_green()));
    out.push(format!("  {}             - Exit the REPL", "quit".bright_red()));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hinton_core::{Interpreter, Value};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn message(result: CommandResult) -> String {
        match result {
            CommandResult::Message(text) => text,
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[test]
    fn test_vars_lists_user_bindings_only() {
        colored::control::set_override(false);
        let mut interpreter = Interpreter::new();
        interpreter
            .execute_source("let b = \"two\"; const A = 1; func f() {}")
            .unwrap();
        let mut ctx = CommandContext::new(&mut interpreter);

        let text = message(cmd_vars("", &mut ctx));
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec!["const A = 1", "let b = \"two\"", "func f = <Func 'f'>"]
        );
    }

    #[test]
    fn test_vars_when_empty() {
        colored::control::set_override(false);
        let mut interpreter = Interpreter::new();
        let mut ctx = CommandContext::new(&mut interpreter);
        assert_eq!(message(cmd_vars("", &mut ctx)), "No variables defined.");
    }

    #[test]
    fn test_natives_documents_standard_library() {
        let mut interpreter = Interpreter::new();
        let mut ctx = CommandContext::new(&mut interpreter);
        let text = message(cmd_natives("", &mut ctx));
        for name in ["print", "input", "iter", "next", "assert", "assert_eq", "assert_ne"] {
            assert!(text.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_reset_forgets_bindings() {
        let mut interpreter = Interpreter::new();
        interpreter.execute_source("let x = 1;").unwrap();
        let mut ctx = CommandContext::new(&mut interpreter);
        cmd_reset("", &mut ctx);
        assert_eq!(interpreter.get_global("x"), None);
        assert!(interpreter.get_global("print").is_some());
    }

    #[test]
    fn test_load_runs_file_in_session() {
        let path = std::env::temp_dir().join(format!("hinton_load_{}.hn", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "let loaded = 40 + 2;").unwrap();
        drop(file);

        let mut interpreter = Interpreter::new();
        let mut ctx = CommandContext::new(&mut interpreter);
        let result = cmd_load(path.to_str().unwrap(), &mut ctx);
        assert!(matches!(result, CommandResult::Message(_)));
        assert_eq!(interpreter.get_global("loaded"), Some(Value::Int(42)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_renders_errors_against_file() {
        colored::control::set_override(false);
        let path = std::env::temp_dir().join(format!("hinton_bad_{}.hn", std::process::id()));
        std::fs::write(&path, "let x = 1;\nx();\n").unwrap();

        let mut interpreter = Interpreter::new();
        let mut ctx = CommandContext::new(&mut interpreter);
        let origin = path.to_str().unwrap().to_string();
        match cmd_load(&origin, &mut ctx) {
            CommandResult::Error(text) => {
                assert!(text.starts_with("NotCallable: Can only call functions, got 'Int'."));
                assert!(text.contains(&format!("{}:2:", origin)));
            }
            other => panic!("expected an error, got {:?}", other),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_argument_checks() {
        let mut interpreter = Interpreter::new();
        let mut ctx = CommandContext::new(&mut interpreter);
        assert!(matches!(cmd_load("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_watch("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_unwatch("", &mut ctx), CommandResult::Error(_)));
        assert_eq!(
            cmd_watch("main.hn", &mut ctx),
            CommandResult::Watch("main.hn".to_string())
        );
        assert_eq!(cmd_quit("", &mut ctx), CommandResult::Exit);
    }
}

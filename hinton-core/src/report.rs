//! Human-readable diagnostics
//!
//! Renders an error as a header, a location line and the offending source
//! line with a caret underline:
//!
//! ```text
//! TypeMismatch: Operator '-' cannot be applied to 'String' and 'Int'.
//!   --> script.hn:2:9
//!    |
//!  2 | let x = "a" - 1;
//!    |         ^^^^^^^
//! ```

#[cfg(feature = "colored")]
use colored::*;

use crate::parser::error::{HintonError, RuntimeError, SyntaxError};
use crate::parser::lexer::Span;

/// One reportable problem
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub label: String,
    pub message: String,
    pub span: Span,
}

impl From<&SyntaxError> for Diagnostic {
    fn from(error: &SyntaxError) -> Self {
        Diagnostic {
            label: "SyntaxError".to_string(),
            message: error.message.clone(),
            span: error.span,
        }
    }
}

impl From<&RuntimeError> for Diagnostic {
    fn from(error: &RuntimeError) -> Self {
        Diagnostic {
            label: error.kind.name().to_string(),
            message: error.message.clone(),
            span: error.span,
        }
    }
}

impl Diagnostic {
    /// Render against the source text the span points into
    pub fn render(&self, source: &str, origin: &str) -> String {
        let mut out = format!("{}: {}\n", style_label(&self.label), self.message);
        out.push_str(&format!(
            "  {} {}:{}:{}\n",
            style_gutter("-->"),
            origin,
            self.span.line,
            self.span.column
        ));

        let Some(line) = source.lines().nth(self.span.line.saturating_sub(1)) else {
            return out;
        };

        let number = self.span.line.to_string();
        let pad = " ".repeat(number.len());
        let column = self.span.column.max(1);
        let remaining = line.chars().count().saturating_sub(column - 1).max(1);
        let width = self.span.len.clamp(1, remaining);

        out.push_str(&format!(" {} {}\n", pad, style_gutter("|")));
        out.push_str(&format!(" {} {} {}\n", style_gutter(&number), style_gutter("|"), line));
        out.push_str(&format!(
            " {} {} {}{}\n",
            pad,
            style_gutter("|"),
            " ".repeat(column - 1),
            style_caret(&"^".repeat(width))
        ));
        out
    }
}

/// Render every diagnostic carried by `error`, separated by blank lines
pub fn render_error(error: &HintonError, source: &str, origin: &str) -> String {
    let diagnostics: Vec<Diagnostic> = match error {
        HintonError::Syntax(errors) => errors.iter().map(Diagnostic::from).collect(),
        HintonError::Runtime(error) => vec![Diagnostic::from(error)],
    };
    diagnostics
        .iter()
        .map(|d| d.render(source, origin))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "colored")]
fn style_label(label: &str) -> String {
    label.bright_red().bold().to_string()
}

#[cfg(not(feature = "colored"))]
fn style_label(label: &str) -> String {
    label.to_string()
}

#[cfg(feature = "colored")]
fn style_gutter(text: &str) -> String {
    text.bright_blue().bold().to_string()
}

#[cfg(not(feature = "colored"))]
fn style_gutter(text: &str) -> String {
    text.to_string()
}

#[cfg(feature = "colored")]
fn style_caret(text: &str) -> String {
    text.bright_red().to_string()
}

#[cfg(not(feature = "colored"))]
fn style_caret(text: &str) -> String {
    text.to_string()
}

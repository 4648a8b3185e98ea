use crate::parser::lexer::Span;
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Program and Statement AST
// ============================================================================

/// A program is a sequence of top-level declarations
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            statements: Vec::new(),
        }
    }

    pub fn push(&mut self, stmt: Statement) {
        self.statements.push(stmt);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// Statement types
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration: let a, b = expr;
    Var {
        names: Vec<String>,
        initializer: Option<Expression>,
        span: Span,
    },

    /// Constant declaration: const PI = 3.14;
    Const {
        name: String,
        initializer: Expression,
        span: Span,
    },

    /// Function declaration: func name(a, b?, c := 1) { ... }
    Function(Rc<FunctionDecl>),

    /// Block of statements: { stmt1; stmt2; }
    Block(Vec<Statement>),

    /// Conditional: if (cond) stmt else stmt
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },

    /// Loop: while (cond) stmt
    While {
        condition: Expression,
        body: Box<Statement>,
    },

    /// Iteration: for (let x in expr) stmt
    For {
        variable: String,
        iterable: Expression,
        body: Box<Statement>,
        span: Span,
    },

    Break(Span),

    Continue(Span),

    /// Return from the enclosing function, `null` when no value is given
    Return {
        value: Option<Expression>,
        span: Span,
    },

    /// Expression evaluated for its effects: f(x);
    Expression(Expression),
}

/// A named function or a lambda. Shared between the tree and the function
/// values created from it, so calling never copies the body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for lambdas
    pub name: Option<String>,
    pub params: Vec<Parameter>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl FunctionDecl {
    /// Number of parameters that must be supplied by the caller
    pub fn required_arity(&self) -> usize {
        self.params.iter().filter(|p| p.is_required()).count()
    }

    pub fn max_arity(&self) -> usize {
        self.params.len()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<lambda>")
    }
}

/// A declared parameter: `a`, `b?` or `c := expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Marked with `?`; defaults to `null` when omitted
    pub optional: bool,
    pub default: Option<Expression>,
    pub span: Span,
}

impl Parameter {
    pub fn required(name: impl Into<String>, span: Span) -> Self {
        Parameter {
            name: name.into(),
            optional: false,
            default: None,
            span,
        }
    }

    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

// ============================================================================
// Expression AST
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Real(f64),
    String(Rc<str>),
    Bool(bool),
    Null,
}

/// Represents the different expressions of the Hinton language
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: Literal,
        span: Span,
    },

    /// Parenthesized expression: (a + b)
    Grouping(Box<Expression>),

    /// Prefix operator: -x, !x
    Unary {
        operator: UnaryOp,
        operand: Box<Expression>,
        span: Span,
    },

    /// Arithmetic and comparison: a + b, a < b
    Binary {
        left: Box<Expression>,
        operator: BinaryOp,
        right: Box<Expression>,
        span: Span,
    },

    /// Short-circuiting: a && b, a || b
    Logical {
        left: Box<Expression>,
        operator: LogicalOp,
        right: Box<Expression>,
        span: Span,
    },

    /// Half-open range: lower..upper
    Range {
        lower: Box<Expression>,
        upper: Box<Expression>,
        span: Span,
    },

    /// Assignment: target = value, or target op= value when `operator` is set
    Assign {
        target: Box<Expression>,
        operator: Option<BinaryOp>,
        value: Box<Expression>,
        span: Span,
    },

    Variable {
        name: String,
        span: Span,
    },

    /// Call: callee(args...), `span` points at the closing parenthesis
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        span: Span,
    },

    Lambda(Rc<FunctionDecl>),

    Array {
        elements: Vec<Expression>,
        span: Span,
    },

    /// Dictionary literal: { key: value, "other key": value }
    Dict {
        entries: Vec<(String, Expression)>,
        span: Span,
    },

    /// Subscript: target[index]
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },

    /// Member access: target.name
    Member {
        target: Box<Expression>,
        name: String,
        span: Span,
    },

    /// Postfix increment or decrement: x++, a[0]--
    Update {
        target: Box<Expression>,
        operator: UpdateOp,
        span: Span,
    },
}

impl Expression {
    pub fn literal(value: Literal, span: Span) -> Self {
        Expression::Literal { value, span }
    }

    pub fn variable(name: impl Into<String>, span: Span) -> Self {
        Expression::Variable {
            name: name.into(),
            span,
        }
    }

    /// Location used when reporting errors about this expression
    pub fn span(&self) -> Span {
        match self {
            Expression::Grouping(inner) => inner.span(),
            Expression::Lambda(decl) => decl.span,
            Expression::Literal { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Logical { span, .. }
            | Expression::Range { span, .. }
            | Expression::Assign { span, .. }
            | Expression::Variable { span, .. }
            | Expression::Call { span, .. }
            | Expression::Array { span, .. }
            | Expression::Dict { span, .. }
            | Expression::Index { span, .. }
            | Expression::Member { span, .. }
            | Expression::Update { span, .. } => *span,
        }
    }

    /// Whether this expression may appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::Variable { .. } | Expression::Index { .. } | Expression::Member { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// Arithmetic and comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Real(r) => write!(f, "{:?}", r),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.optional {
            write!(f, "?")?;
        }
        if let Some(default) = &self.default {
            write!(f, " := {}", default)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal { value, .. } => write!(f, "{}", value),
            Expression::Grouping(inner) => write!(f, "({})", inner),
            Expression::Unary {
                operator, operand, ..
            } => match operator {
                UnaryOp::Not => write!(f, "!{}", operand),
                UnaryOp::Negate => write!(f, "-{}", operand),
            },
            Expression::Binary {
                left,
                operator,
                right,
                ..
            } => write!(f, "{} {} {}", left, operator, right),
            Expression::Logical {
                left,
                operator,
                right,
                ..
            } => {
                let op_str = match operator {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                write!(f, "{} {} {}", left, op_str, right)
            }
            Expression::Range { lower, upper, .. } => write!(f, "{}..{}", lower, upper),
            Expression::Assign {
                target,
                operator,
                value,
                ..
            } => match operator {
                Some(op) => write!(f, "{} {}= {}", target, op, value),
                None => write!(f, "{} = {}", target, value),
            },
            Expression::Variable { name, .. } => write!(f, "{}", name),
            Expression::Call {
                callee, arguments, ..
            } => {
                write!(f, "{}(", callee)?;
                write_list(f, arguments)?;
                write!(f, ")")
            }
            Expression::Lambda(decl) => {
                write!(f, "fn (")?;
                write_list(f, &decl.params)?;
                write!(f, ") {{ ... }}")
            }
            Expression::Array { elements, .. } => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            Expression::Dict { entries, .. } => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Expression::Index { target, index, .. } => write!(f, "{}[{}]", target, index),
            Expression::Member { target, name, .. } => write!(f, "{}.{}", target, name),
            Expression::Update {
                target, operator, ..
            } => match operator {
                UpdateOp::Increment => write!(f, "{}++", target),
                UpdateOp::Decrement => write!(f, "{}--", target),
            },
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Var {
                names, initializer, ..
            } => {
                write!(f, "let {}", names.join(", "))?;
                if let Some(init) = initializer {
                    write!(f, " = {}", init)?;
                }
                write!(f, ";")
            }
            Statement::Const {
                name, initializer, ..
            } => write!(f, "const {} = {};", name, initializer),
            Statement::Function(decl) => {
                write!(f, "func {}(", decl.display_name())?;
                write_list(f, &decl.params)?;
                write!(f, ") {{ ... }}")
            }
            Statement::Block(_) => write!(f, "{{ ... }}"),
            Statement::If { condition, .. } => write!(f, "if ({}) ...", condition),
            Statement::While { condition, .. } => write!(f, "while ({}) ...", condition),
            Statement::For {
                variable, iterable, ..
            } => write!(f, "for (let {} in {}) ...", variable, iterable),
            Statement::Break(_) => write!(f, "break;"),
            Statement::Continue(_) => write!(f, "continue;"),
            Statement::Return { value: Some(v), .. } => write!(f, "return {};", v),
            Statement::Return { value: None, .. } => write!(f, "return;"),
            Statement::Expression(expr) => write!(f, "{};", expr),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            writeln!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expression {
        Expression::variable(name, Span::default())
    }

    #[test]
    fn test_required_arity_skips_optional_and_defaulted() {
        let decl = FunctionDecl {
            name: Some("f".to_string()),
            params: vec![
                Parameter::required("a", Span::default()),
                Parameter {
                    name: "b".to_string(),
                    optional: true,
                    default: None,
                    span: Span::default(),
                },
                Parameter {
                    name: "c".to_string(),
                    optional: false,
                    default: Some(Expression::literal(Literal::Int(1), Span::default())),
                    span: Span::default(),
                },
            ],
            body: vec![],
            span: Span::default(),
        };
        assert_eq!(decl.required_arity(), 1);
        assert_eq!(decl.max_arity(), 3);
    }

    #[test]
    fn test_assignable_targets() {
        assert!(var("x").is_assignable());
        assert!(Expression::Member {
            target: Box::new(var("d")),
            name: "k".to_string(),
            span: Span::default(),
        }
        .is_assignable());
        assert!(!Expression::literal(Literal::Int(3), Span::default()).is_assignable());
        assert!(!Expression::Grouping(Box::new(var("x"))).is_assignable());
    }

    #[test]
    fn test_expression_display() {
        let expr = Expression::Binary {
            left: Box::new(var("a")),
            operator: BinaryOp::Power,
            right: Box::new(Expression::literal(Literal::Real(2.0), Span::default())),
            span: Span::default(),
        };
        assert_eq!(expr.to_string(), "a ** 2.0");
    }
}

//! Statement parser for the Hinton language
//!
//! Recursive descent over the token stream. Parses declarations such as:
//! - `let a, b = 10;`
//! - `const PI = 3.14;`
//! - `func greet(name, greeting := "Hello") { ... }`
//! - `if (cond) { ... } else { ... }`
//! - `while (cond) { ... }`
//! - `for (let x in 0..10) { ... }`
//!
//! Syntax errors do not stop the parse. Each one is recorded, the parser
//! skips ahead to the next statement boundary, and parsing resumes, so a
//! single run reports every error it can find.

use crate::parser::ast::{
    BinaryOp, Expression, FunctionDecl, Literal, LogicalOp, Parameter, Program, Statement,
    UnaryOp, UpdateOp,
};
use crate::parser::error::SyntaxError;
use crate::parser::lexer::{Lexer, Span, SpannedToken, Token};
use crate::stack::ensure_sufficient_stack;
use std::rc::Rc;

type ParseResult<T> = Result<T, SyntaxError>;

/// Parses statements and programs (sequences of declarations)
pub struct StatementParser {
    tokens: Vec<SpannedToken>,
    position: usize,
    /// Errors recorded so far, including ones that did not need recovery
    errors: Vec<SyntaxError>,
    /// Nesting of `{ }` blocks, so recovery never skips a closing brace
    block_depth: usize,
}

impl StatementParser {
    /// Create a new statement parser from input string
    pub fn new(input: &str) -> Result<Self, Vec<SyntaxError>> {
        let tokens = Lexer::new(input).tokenize_spanned()?;
        Ok(Self::from_tokens(tokens))
    }

    /// Create a parser over an already scanned token stream
    pub fn from_tokens(mut tokens: Vec<SpannedToken>) -> Self {
        if tokens.last().map(|st| &st.token) != Some(&Token::Eof) {
            let span = tokens
                .last()
                .map(|st| Span::new(st.span.line, st.span.column + 1, st.span.end(), 0))
                .unwrap_or_default();
            tokens.push(SpannedToken::new(Token::Eof, span));
        }

        StatementParser {
            tokens,
            position: 0,
            errors: Vec::new(),
            block_depth: 0,
        }
    }

    /// Current token
    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|st| &st.token)
            .unwrap_or(&Token::Eof)
    }

    /// Current span (position in source)
    fn current_span(&self) -> Span {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|st| st.span)
            .unwrap_or_default()
    }

    /// Span of the most recently consumed token
    fn previous_span(&self) -> Span {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|st| st.span)
            .unwrap_or_else(|| self.current_span())
    }

    /// Advance to the next token
    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    /// Check if current token matches (without consuming)
    fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    fn is_at_end(&self) -> bool {
        self.check(&Token::Eof)
    }

    /// Error located at the current token
    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current_span())
    }

    /// Expect a specific token, returning its span
    fn expect(&mut self, expected: &Token, context: &str) -> ParseResult<Span> {
        if self.check(expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.error_here(format!(
                "Expected '{}' {}, found '{}'.",
                expected,
                context,
                self.current()
            )))
        }
    }

    /// Expect an identifier, returning its name and span
    fn expect_identifier(&mut self, context: &str) -> ParseResult<(String, Span)> {
        match self.current().clone() {
            Token::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                Ok((name, span))
            }
            other => Err(self.error_here(format!(
                "Expected identifier {}, found '{}'.",
                context, other
            ))),
        }
    }

    /// Parse a complete program.
    ///
    /// Returns every syntax error found when the source is malformed.
    pub fn parse_program(&mut self) -> Result<Program, Vec<SyntaxError>> {
        let mut program = Program::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.parse_declaration() {
                program.push(stmt);
            }
        }

        if self.errors.is_empty() {
            Ok(program)
        } else {
            let mut errors = std::mem::take(&mut self.errors);
            errors.sort_by_key(|e| e.span.offset);
            Err(errors)
        }
    }

    /// Parse one declaration, recording the error and resynchronizing on failure
    fn parse_declaration(&mut self) -> Option<Statement> {
        let result = ensure_sufficient_stack(|| match self.current() {
            Token::Let => self.parse_var_declaration(),
            Token::Const => self.parse_const_declaration(),
            Token::Func => self.parse_function_declaration(),
            _ => self.parse_statement(),
        });

        match result {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                tracing::debug!(%error, "recovering from syntax error");
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    /// Discard tokens until a statement boundary.
    ///
    /// Stops after a `;`, before a keyword that starts a declaration, or
    /// before a `}` that closes an enclosing block.
    fn synchronize(&mut self) {
        let mut progressed = false;
        loop {
            match self.current() {
                Token::Eof => return,
                Token::RightBrace if self.block_depth > 0 => return,
                Token::Semicolon => {
                    self.advance();
                    return;
                }
                Token::Let
                | Token::Const
                | Token::Func
                | Token::If
                | Token::While
                | Token::For
                | Token::Return
                | Token::Break
                | Token::Continue
                    if progressed =>
                {
                    return
                }
                _ => {}
            }
            self.advance();
            progressed = true;
        }
    }

    /// Parse: let a, b = expr;
    fn parse_var_declaration(&mut self) -> ParseResult<Statement> {
        let span = self.expect(&Token::Let, "to start a declaration")?;

        let mut names = vec![self.expect_identifier("after 'let'")?.0];
        while self.check(&Token::Comma) {
            self.advance();
            names.push(self.expect_identifier("after ','")?.0);
        }

        let initializer = if self.check(&Token::Equals) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.expect(&Token::Semicolon, "after variable declaration")?;
        Ok(Statement::Var {
            names,
            initializer,
            span,
        })
    }

    /// Parse: const NAME = expr;
    fn parse_const_declaration(&mut self) -> ParseResult<Statement> {
        let span = self.expect(&Token::Const, "to start a declaration")?;
        let (name, _) = self.expect_identifier("after 'const'")?;

        if !self.check(&Token::Equals) {
            return Err(self.error_here(format!("Constant '{}' must be initialized.", name)));
        }
        self.advance();

        let initializer = self.parse_expression()?;
        self.expect(&Token::Semicolon, "after constant declaration")?;
        Ok(Statement::Const {
            name,
            initializer,
            span,
        })
    }

    /// Parse: func name(a, b?, c := expr) { body }
    fn parse_function_declaration(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::Func, "to start a function")?;
        let (name, span) = self.expect_identifier("for function name")?;

        self.expect(&Token::LeftParen, "after function name")?;
        let params = self.parse_parameters()?;
        let body = self.parse_block()?;

        Ok(Statement::Function(Rc::new(FunctionDecl {
            name: Some(name),
            params,
            body,
            span,
        })))
    }

    /// Parse a parameter list after its opening `(`, through the closing `)`.
    ///
    /// Misplaced optional parameters are recorded without aborting the parse.
    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        let mut params: Vec<Parameter> = Vec::new();

        if !self.check(&Token::RightParen) {
            loop {
                let (name, span) = self.expect_identifier("for parameter name")?;

                let optional = if self.check(&Token::Question) {
                    self.advance();
                    true
                } else {
                    false
                };

                let default = if self.check(&Token::ColonEquals) {
                    self.advance();
                    Some(self.parse_expression()?)
                } else {
                    None
                };

                if optional && default.is_some() {
                    self.errors.push(SyntaxError::new(
                        format!(
                            "Parameter '{}' cannot be both optional and have a default value.",
                            name
                        ),
                        span,
                    ));
                }
                if params.iter().any(|p| p.name == name) {
                    self.errors.push(SyntaxError::new(
                        format!("Duplicate parameter '{}'.", name),
                        span,
                    ));
                }
                let param = Parameter {
                    name,
                    optional,
                    default,
                    span,
                };
                if param.is_required() && params.iter().any(|p| !p.is_required()) {
                    self.errors.push(SyntaxError::new(
                        format!(
                            "Required parameter '{}' cannot follow an optional parameter.",
                            param.name
                        ),
                        span,
                    ));
                }
                params.push(param);

                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        }

        self.expect(&Token::RightParen, "after parameters")?;
        Ok(params)
    }

    /// Parse a single statement
    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        ensure_sufficient_stack(|| match self.current() {
            Token::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            Token::If => self.parse_if_statement(),
            Token::While => self.parse_while_statement(),
            Token::For => self.parse_for_statement(),
            Token::Break => {
                let span = self.current_span();
                self.advance();
                self.expect(&Token::Semicolon, "after 'break'")?;
                Ok(Statement::Break(span))
            }
            Token::Continue => {
                let span = self.current_span();
                self.advance();
                self.expect(&Token::Semicolon, "after 'continue'")?;
                Ok(Statement::Continue(span))
            }
            Token::Return => self.parse_return_statement(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&Token::Semicolon, "after expression")?;
                Ok(Statement::Expression(expr))
            }
        })
    }

    /// Parse: if (condition) statement [else statement]
    fn parse_if_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::If, "to start a conditional")?;
        self.expect(&Token::LeftParen, "after 'if'")?;
        let condition = self.parse_expression()?;
        self.expect(&Token::RightParen, "after if condition")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.check(&Token::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// Parse: while (condition) statement
    fn parse_while_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::While, "to start a loop")?;
        self.expect(&Token::LeftParen, "after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect(&Token::RightParen, "after loop condition")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While { condition, body })
    }

    /// Parse: for (let x in iterable) statement
    fn parse_for_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::For, "to start a loop")?;
        self.expect(&Token::LeftParen, "after 'for'")?;
        if self.check(&Token::Let) {
            self.advance();
        }
        let (variable, span) = self.expect_identifier("for loop variable")?;
        self.expect(&Token::In, "after loop variable")?;
        let iterable = self.parse_expression()?;
        self.expect(&Token::RightParen, "after iterable")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For {
            variable,
            iterable,
            body,
            span,
        })
    }

    /// Parse: return [expression];
    fn parse_return_statement(&mut self) -> ParseResult<Statement> {
        let span = self.expect(&Token::Return, "to start a return")?;

        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect(&Token::Semicolon, "after return value")?;
        Ok(Statement::Return { value, span })
    }

    /// Parse a block: { declaration* }
    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(&Token::LeftBrace, "to start a block")?;
        self.block_depth += 1;

        let mut statements = Vec::new();
        while !self.check(&Token::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.parse_declaration() {
                statements.push(stmt);
            }
        }

        self.block_depth -= 1;
        self.expect(&Token::RightBrace, "after block")?;
        Ok(statements)
    }

    // =========================================================================
    // Expression Parsing
    // =========================================================================

    /// Parse an expression (handles operator precedence)
    /// Grammar: expression = assignment
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    /// Parse assignment - lowest precedence, right-associative
    /// Grammar: assignment = logical_or (('=' | '+=' | '-=' | '*=' | '/=' | '%=' | '**=') assignment)?
    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        let target = self.parse_logical_or_expression()?;

        let operator = match self.current() {
            Token::Equals => None,
            Token::PlusEquals => Some(BinaryOp::Add),
            Token::MinusEquals => Some(BinaryOp::Subtract),
            Token::StarEquals => Some(BinaryOp::Multiply),
            Token::SlashEquals => Some(BinaryOp::Divide),
            Token::PercentEquals => Some(BinaryOp::Modulo),
            Token::StarStarEquals => Some(BinaryOp::Power),
            _ => return Ok(target),
        };
        let operator_span = self.current_span();
        self.advance();
        let value = self.parse_assignment()?;

        if !target.is_assignable() {
            // The token stream is well formed here, so no recovery is needed
            self.errors
                .push(SyntaxError::new("Invalid assignment target.", operator_span));
            return Ok(target);
        }

        let span = target.span();
        Ok(Expression::Assign {
            target: Box::new(target),
            operator,
            value: Box::new(value),
            span,
        })
    }

    /// Parse logical OR (|| or `or`)
    /// Grammar: logical_or = logical_and ('||' logical_and)*
    fn parse_logical_or_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_logical_and_expression()?;

        while self.check(&Token::Or) {
            let span = self.current_span();
            self.advance();
            let right = self.parse_logical_and_expression()?;
            left = Expression::Logical {
                left: Box::new(left),
                operator: LogicalOp::Or,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Parse logical AND (&& or `and`)
    /// Grammar: logical_and = equality ('&&' equality)*
    fn parse_logical_and_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_equality_expression()?;

        while self.check(&Token::And) {
            let span = self.current_span();
            self.advance();
            let right = self.parse_equality_expression()?;
            left = Expression::Logical {
                left: Box::new(left),
                operator: LogicalOp::And,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Grammar: equality = comparison (('==' | '!=') comparison)*
    fn parse_equality_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_comparison_expression()?;

        loop {
            let operator = match self.current() {
                Token::DoubleEquals => BinaryOp::Equal,
                Token::NotEquals => BinaryOp::NotEqual,
                _ => break,
            };
            let span = self.current_span();
            self.advance();
            let right = self.parse_comparison_expression()?;
            left = Expression::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Grammar: comparison = range (('<' | '<=' | '>' | '>=') range)*
    fn parse_comparison_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_range_expression()?;

        loop {
            let operator = match self.current() {
                Token::Less => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessEqual,
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            let span = self.current_span();
            self.advance();
            let right = self.parse_range_expression()?;
            left = Expression::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Parse a range - at most one `..` per term
    /// Grammar: range = additive ('..' additive)?
    fn parse_range_expression(&mut self) -> ParseResult<Expression> {
        let lower = self.parse_additive_expression()?;

        if !self.check(&Token::DotDot) {
            return Ok(lower);
        }
        let span = self.current_span();
        self.advance();
        let upper = self.parse_additive_expression()?;

        if self.check(&Token::DotDot) {
            return Err(self.error_here("Ranges cannot be chained."));
        }

        Ok(Expression::Range {
            lower: Box::new(lower),
            upper: Box::new(upper),
            span,
        })
    }

    /// Grammar: additive = multiplicative (('+' | '-') multiplicative)*
    fn parse_additive_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let operator = match self.current() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            let span = self.current_span();
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Expression::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Grammar: multiplicative = exponent (('*' | '/' | '%') exponent)*
    fn parse_multiplicative_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_exponent_expression()?;

        loop {
            let operator = match self.current() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };
            let span = self.current_span();
            self.advance();
            let right = self.parse_exponent_expression()?;
            left = Expression::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Parse exponentiation - right-associative
    /// Grammar: exponent = unary ('**' exponent)?
    fn parse_exponent_expression(&mut self) -> ParseResult<Expression> {
        let base = self.parse_unary_expression()?;

        if !self.check(&Token::StarStar) {
            return Ok(base);
        }
        let span = self.current_span();
        self.advance();
        let exponent = self.parse_exponent_expression()?;

        Ok(Expression::Binary {
            left: Box::new(base),
            operator: BinaryOp::Power,
            right: Box::new(exponent),
            span,
        })
    }

    /// Grammar: unary = ('!' | '-') unary | postfix
    fn parse_unary_expression(&mut self) -> ParseResult<Expression> {
        let operator = match self.current() {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            _ => return self.parse_postfix_expression(),
        };
        let span = self.current_span();
        self.advance();
        let operand = ensure_sufficient_stack(|| self.parse_unary_expression())?;

        Ok(Expression::Unary {
            operator,
            operand: Box::new(operand),
            span,
        })
    }

    /// Parse calls, indexing, member access and `++`/`--`, chained left to right
    /// Grammar: postfix = primary ('(' args ')' | '[' expr ']' | '.' identifier | '++' | '--')*
    fn parse_postfix_expression(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            match self.current() {
                Token::LeftParen => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    let span = expr.span().to(self.previous_span());
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                        span,
                    };
                }
                Token::LeftBracket => {
                    let span = self.current_span();
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket, "after index")?;
                    expr = Expression::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                Token::Dot => {
                    self.advance();
                    let (name, span) = self.expect_identifier("after '.'")?;
                    expr = Expression::Member {
                        target: Box::new(expr),
                        name,
                        span,
                    };
                }
                Token::PlusPlus | Token::MinusMinus => {
                    let operator = if self.check(&Token::PlusPlus) {
                        UpdateOp::Increment
                    } else {
                        UpdateOp::Decrement
                    };
                    let span = self.current_span();
                    self.advance();
                    if !expr.is_assignable() {
                        self.errors
                            .push(SyntaxError::new("Invalid increment target.", span));
                        continue;
                    }
                    expr = Expression::Update {
                        target: Box::new(expr),
                        operator,
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Parse call arguments after the opening `(`, through the closing `)`
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut arguments = Vec::new();

        if !self.check(&Token::RightParen) {
            arguments.push(self.parse_expression()?);
            while self.check(&Token::Comma) {
                self.advance();
                arguments.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen, "after arguments")?;
        Ok(arguments)
    }

    /// Parse literals, identifiers, groups, array/dictionary literals and lambdas
    fn parse_primary_expression(&mut self) -> ParseResult<Expression> {
        let span = self.current_span();

        let literal = match self.current().clone() {
            Token::Int(n) => Some(Literal::Int(n)),
            Token::Real(r) => Some(Literal::Real(r)),
            Token::Str(s) => Some(Literal::String(Rc::from(s))),
            Token::True => Some(Literal::Bool(true)),
            Token::False => Some(Literal::Bool(false)),
            Token::Null => Some(Literal::Null),
            _ => None,
        };
        if let Some(value) = literal {
            self.advance();
            return Ok(Expression::literal(value, span));
        }

        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(Expression::variable(name, span))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&Token::RightParen, "after expression")?;
                Ok(Expression::Grouping(Box::new(inner)))
            }
            Token::LeftBracket => self.parse_array_literal(),
            Token::LeftBrace => self.parse_dict_literal(),
            Token::Fn => self.parse_lambda(),
            other => Err(self.error_here(format!("Expected expression, found '{}'.", other))),
        }
    }

    /// Parse: [a, b, c]
    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        let span = self.expect(&Token::LeftBracket, "to start an array")?;
        let mut elements = Vec::new();

        while !self.check(&Token::RightBracket) {
            elements.push(self.parse_expression()?);
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&Token::RightBracket, "after array elements")?;
        Ok(Expression::Array { elements, span })
    }

    /// Parse: { key: value, "quoted key": value }
    fn parse_dict_literal(&mut self) -> ParseResult<Expression> {
        let span = self.expect(&Token::LeftBrace, "to start a dictionary")?;
        let mut entries = Vec::new();

        while !self.check(&Token::RightBrace) {
            let key = match self.current().clone() {
                Token::Identifier(name) => name,
                Token::Str(s) => s,
                other => {
                    return Err(self.error_here(format!(
                        "Expected dictionary key, found '{}'.",
                        other
                    )))
                }
            };
            self.advance();
            self.expect(&Token::Colon, "after dictionary key")?;
            let value = self.parse_expression()?;
            entries.push((key, value));

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&Token::RightBrace, "after dictionary entries")?;
        Ok(Expression::Dict { entries, span })
    }

    /// Parse: fn (params) { body }  or  fn (params) => expression
    fn parse_lambda(&mut self) -> ParseResult<Expression> {
        let span = self.expect(&Token::Fn, "to start a lambda")?;
        self.expect(&Token::LeftParen, "after 'fn'")?;
        let params = self.parse_parameters()?;

        let body = if self.check(&Token::FatArrow) {
            let arrow = self.current_span();
            self.advance();
            let value = self.parse_expression()?;
            vec![Statement::Return {
                value: Some(value),
                span: arrow,
            }]
        } else {
            self.parse_block()?
        };

        Ok(Expression::Lambda(Rc::new(FunctionDecl {
            name: None,
            params,
            body,
            span,
        })))
    }
}

/// Convenience function to parse a source string into a program
pub fn parse_program(input: &str) -> Result<Program, Vec<SyntaxError>> {
    let mut parser = StatementParser::new(input)?;
    parser.parse_program()
}

/// Convenience function to parse a string into a single expression
pub fn parse_expression(input: &str) -> Result<Expression, Vec<SyntaxError>> {
    let mut parser = StatementParser::new(input)?;
    let expr = parser.parse_expression().map_err(|e| vec![e])?;
    if !parser.is_at_end() {
        parser.errors.push(parser.error_here(format!(
            "Unexpected '{}' after expression.",
            parser.current()
        )));
    }
    if parser.errors.is_empty() {
        Ok(expr)
    } else {
        Err(parser.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Expression {
        parse_expression(input).unwrap()
    }

    fn int(expr: &Expression) -> i64 {
        match expr {
            Expression::Literal {
                value: Literal::Int(n),
                ..
            } => *n,
            _ => panic!("Expected Int literal, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_let_statement() {
        let program = parse_program("let a, b = 10;").unwrap();
        assert_eq!(program.len(), 1);

        match &program.statements[0] {
            Statement::Var {
                names, initializer, ..
            } => {
                assert_eq!(names, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(int(initializer.as_ref().unwrap()), 10);
            }
            _ => panic!("Expected Var statement"),
        }
    }

    #[test]
    fn test_parse_let_without_initializer() {
        let program = parse_program("let x;").unwrap();
        assert!(matches!(
            &program.statements[0],
            Statement::Var {
                initializer: None,
                ..
            }
        ));
    }

    #[test]
    fn test_const_requires_initializer() {
        let errors = parse_program("const x;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be initialized"));
    }

    #[test]
    fn test_operator_precedence() {
        // 1 + 2 * 3 → 1 + (2 * 3)
        match parse("1 + 2 * 3") {
            Expression::Binary {
                left,
                operator: BinaryOp::Add,
                right,
                ..
            } => {
                assert_eq!(int(&left), 1);
                assert!(matches!(
                    *right,
                    Expression::Binary {
                        operator: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("Expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_exponent_is_right_associative() {
        // 2 ** 3 ** 2 → 2 ** (3 ** 2)
        match parse("2 ** 3 ** 2") {
            Expression::Binary {
                left,
                operator: BinaryOp::Power,
                right,
                ..
            } => {
                assert_eq!(int(&left), 2);
                assert!(matches!(
                    *right,
                    Expression::Binary {
                        operator: BinaryOp::Power,
                        ..
                    }
                ));
            }
            other => panic!("Expected power, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_binds_tighter_than_exponent_base() {
        // -2 ** 2 → (-2) ** 2
        match parse("-2 ** 2") {
            Expression::Binary {
                left,
                operator: BinaryOp::Power,
                ..
            } => assert!(matches!(*left, Expression::Unary { .. })),
            other => panic!("Expected power, got {:?}", other),
        }
    }

    #[test]
    fn test_range_sits_between_comparison_and_additive() {
        match parse("a < 1 + 1..10") {
            Expression::Binary {
                operator: BinaryOp::Less,
                right,
                ..
            } => match *right {
                Expression::Range { lower, .. } => assert!(matches!(
                    *lower,
                    Expression::Binary {
                        operator: BinaryOp::Add,
                        ..
                    }
                )),
                other => panic!("Expected range, got {:?}", other),
            },
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_range_is_an_error() {
        assert!(parse_expression("0..5..10").is_err());
    }

    #[test]
    fn test_postfix_chain() {
        match parse("a.list[0](1).count") {
            Expression::Member { target, name, .. } => {
                assert_eq!(name, "count");
                match *target {
                    Expression::Call {
                        callee, arguments, ..
                    } => {
                        assert_eq!(arguments.len(), 1);
                        assert!(matches!(*callee, Expression::Index { .. }));
                    }
                    other => panic!("Expected call, got {:?}", other),
                }
            }
            other => panic!("Expected member access, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        match parse("a[0] += 2") {
            Expression::Assign {
                target, operator, ..
            } => {
                assert!(matches!(*target, Expression::Index { .. }));
                assert_eq!(operator, Some(BinaryOp::Add));
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        match parse("a = b = 3") {
            Expression::Assign { value, .. } => {
                assert!(matches!(*value, Expression::Assign { .. }))
            }
            other => panic!("Expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errors = parse_program("1 + 2 = 3;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid assignment target.");
    }

    #[test]
    fn test_invalid_increment_target() {
        let errors = parse_program("f()++;").unwrap_err();
        assert_eq!(errors[0].message, "Invalid increment target.");
    }

    #[test]
    fn test_parse_function_with_defaults() {
        let program =
            parse_program("func f(a, b?, c := \"named parameter\") { return a; }").unwrap();
        match &program.statements[0] {
            Statement::Function(decl) => {
                assert_eq!(decl.name.as_deref(), Some("f"));
                assert_eq!(decl.params.len(), 3);
                assert!(decl.params[1].optional);
                assert!(decl.params[2].default.is_some());
                assert_eq!(decl.required_arity(), 1);
                assert_eq!(decl.body.len(), 1);
            }
            _ => panic!("Expected Function statement"),
        }
    }

    #[test]
    fn test_parameter_rules() {
        let errors = parse_program("func f(a?, b) {} func g(c? := 1) {} func h(x, x) {}")
            .unwrap_err();
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("cannot follow an optional"));
        assert!(messages[1].contains("both optional and have a default"));
        assert!(messages[2].contains("Duplicate parameter"));
    }

    #[test]
    fn test_parse_lambda_forms() {
        match parse("fn (x) => x * 2") {
            Expression::Lambda(decl) => {
                assert!(decl.name.is_none());
                assert!(matches!(decl.body[0], Statement::Return { .. }));
            }
            other => panic!("Expected lambda, got {:?}", other),
        }
        assert!(matches!(
            parse("fn () { return 1; }"),
            Expression::Lambda(_)
        ));
    }

    #[test]
    fn test_parse_dict_literal() {
        match parse("{ name: \"Hinton\", \"year\": 2021, }") {
            Expression::Dict { entries, .. } => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["name", "year"]);
            }
            other => panic!("Expected dictionary, got {:?}", other),
        }
    }

    #[test]
    fn test_brace_at_statement_start_is_a_block() {
        let program = parse_program("{ let a = 1; }").unwrap();
        assert!(matches!(&program.statements[0], Statement::Block(stmts) if stmts.len() == 1));
    }

    #[test]
    fn test_parse_control_flow() {
        let program = parse_program(
            "while (true) { if (x) break; else continue; } for (let i in 0..3) print(i);",
        )
        .unwrap();
        assert!(matches!(&program.statements[0], Statement::While { .. }));
        match &program.statements[1] {
            Statement::For {
                variable, iterable, ..
            } => {
                assert_eq!(variable, "i");
                assert!(matches!(iterable, Expression::Range { .. }));
            }
            _ => panic!("Expected For statement"),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        let errors = parse_program("let a = 1").unwrap_err();
        assert_eq!(
            errors[0].message,
            "Expected ';' after variable declaration, found 'end of input'."
        );
    }

    #[test]
    fn test_recovery_accumulates_errors() {
        let source = "let = 5;\nprint(1);\nconst x;\nlet y = (1 + ;";
        let errors = parse_program(source).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].span.line, 1);
        assert_eq!(errors[1].span.line, 3);
        assert_eq!(errors[2].span.line, 4);
    }

    #[test]
    fn test_recovery_inside_block_keeps_block_structure() {
        let errors = parse_program("func f() { let = 1; return 2; }\nlet ok = ;").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].span.line, 2);
    }

    #[test]
    fn test_lexical_errors_stop_before_parsing() {
        let errors = parse_program("let a = 1 @ 2;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unexpected character"));
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let source = "func fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
                      let xs = [1, 2.5, \"s\", {k: fn (a) => a}];";
        assert_eq!(parse_program(source).unwrap(), parse_program(source).unwrap());
    }
}

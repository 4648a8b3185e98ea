use crate::parser::error::SyntaxError;
use std::fmt;

/// Position of a token in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number
    pub line: usize,
    /// 1-based column (in characters)
    pub column: usize,
    /// Byte offset of the first character
    pub offset: usize,
    /// Length in bytes
    pub len: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, offset: usize, len: usize) -> Self {
        Span {
            line,
            column,
            offset,
            len,
        }
    }

    /// Byte offset just past the last character
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Span starting at `self` and ending where `other` ends
    pub fn to(self, other: Span) -> Span {
        let end = other.end().max(self.end());
        Span {
            len: end.saturating_sub(self.offset),
            ..self
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Represents different types of tokens in the Hinton language
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),           // 42, 0xff, 0o17, 0b1010, 1_000
    Real(f64),          // 3.14, .5
    Str(String),        // "hello", 'world'
    Identifier(String), // foo, _bar

    // Keywords
    Let,
    Const,
    Func,
    Fn,
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    True,
    False,
    Null,
    And, // && or `and`
    Or,  // || or `or`

    // Arithmetic
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    StarStar, // **

    // Assignment
    Equals,         // =
    PlusEquals,     // +=
    MinusEquals,    // -=
    StarEquals,     // *=
    SlashEquals,    // /=
    PercentEquals,  // %=
    StarStarEquals, // **=
    PlusPlus,       // ++
    MinusMinus,     // --

    // Comparison
    DoubleEquals, // ==
    NotEquals,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Not,          // !

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    Comma,        // ,
    Semicolon,    // ;
    Colon,        // :
    ColonEquals,  // :=
    Question,     // ?
    FatArrow,     // =>
    Dot,          // .
    DotDot,       // ..

    // End of input
    Eof,
}

impl Token {
    fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "let" => Token::Let,
            "const" => Token::Const,
            "func" => Token::Func,
            "fn" => Token::Fn,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "in" => Token::In,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "return" => Token::Return,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "and" => Token::And,
            "or" => Token::Or,
            _ => return None,
        };
        Some(token)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(n) => write!(f, "{}", n),
            Token::Real(r) => write!(f, "{}", r),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Let => write!(f, "let"),
            Token::Const => write!(f, "const"),
            Token::Func => write!(f, "func"),
            Token::Fn => write!(f, "fn"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Return => write!(f, "return"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::StarStar => write!(f, "**"),
            Token::Equals => write!(f, "="),
            Token::PlusEquals => write!(f, "+="),
            Token::MinusEquals => write!(f, "-="),
            Token::StarEquals => write!(f, "*="),
            Token::SlashEquals => write!(f, "/="),
            Token::PercentEquals => write!(f, "%="),
            Token::StarStarEquals => write!(f, "**="),
            Token::PlusPlus => write!(f, "++"),
            Token::MinusMinus => write!(f, "--"),
            Token::DoubleEquals => write!(f, "=="),
            Token::NotEquals => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::Not => write!(f, "!"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::ColonEquals => write!(f, ":="),
            Token::Question => write!(f, "?"),
            Token::FatArrow => write!(f, "=>"),
            Token::Dot => write!(f, "."),
            Token::DotDot => write!(f, ".."),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// A token together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        SpannedToken { token, span }
    }
}

/// Tokenizes Hinton source text
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    line: usize,
    column: usize,
    offset: usize,
    /// Errors found inside otherwise well-formed tokens (bad escapes)
    errors: Vec<SyntaxError>,
}

/// Where a token started, captured before consuming it
#[derive(Clone, Copy)]
struct Mark {
    line: usize,
    column: usize,
    offset: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            current_char,
            line: 1,
            column: 1,
            offset: 0,
            errors: Vec::new(),
        }
    }

    /// Advance to the next character, keeping line and column in step
    fn advance(&mut self) {
        if let Some(ch) = self.current_char {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn mark(&self) -> Mark {
        Mark {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn span_from(&self, mark: Mark) -> Span {
        Span::new(mark.line, mark.column, mark.offset, self.offset - mark.offset)
    }

    /// Skip whitespace and comments. Fails on an unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match (self.current_char, self.peek()) {
                (Some(ch), _) if ch.is_whitespace() => self.advance(),
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.current_char {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.mark();
                    self.advance();
                    self.advance();
                    loop {
                        match (self.current_char, self.peek()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => self.advance(),
                            (None, _) => {
                                return Err(SyntaxError::new(
                                    "Unterminated block comment.",
                                    self.span_from(start),
                                ))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Consume digits of the given radix, allowing single `_` separators
    fn read_digits(&mut self, radix: u32) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else if ch == '_' && self.peek().is_some_and(|next| next.is_digit(radix)) {
                self.advance();
            } else {
                break;
            }
        }
        digits
    }

    /// Read a numeric literal: decimal, `0x`/`0o`/`0b` integers, or a real
    fn read_number(&mut self, start: Mark) -> Result<Token, SyntaxError> {
        if self.current_char == Some('0') {
            let radix = match self.peek() {
                Some('x' | 'X') => Some((16, "hexadecimal")),
                Some('o' | 'O') => Some((8, "octal")),
                Some('b' | 'B') => Some((2, "binary")),
                _ => None,
            };
            if let Some((radix, name)) = radix {
                self.advance(); // 0
                self.advance(); // x, o or b
                let digits = self.read_digits(radix);
                if digits.is_empty() {
                    return Err(SyntaxError::new(
                        format!("Expected {} digits after prefix.", name),
                        self.span_from(start),
                    ));
                }
                return i64::from_str_radix(&digits, radix).map(Token::Int).map_err(|_| {
                    SyntaxError::new(
                        format!("{} literal is too large.", name),
                        self.span_from(start),
                    )
                });
            }
        }

        let mut text = String::new();
        let started_with_dot = self.current_char == Some('.');
        if started_with_dot {
            self.advance();
            text.push_str("0.");
        }
        text.push_str(&self.read_digits(10));

        let has_fraction = !started_with_dot
            && self.current_char == Some('.')
            && self.peek().is_some_and(|next| next.is_ascii_digit());
        if has_fraction {
            self.advance();
            text.push('.');
            text.push_str(&self.read_digits(10));
        }

        if started_with_dot || has_fraction {
            text.parse::<f64>().map(Token::Real).map_err(|_| {
                SyntaxError::new(
                    format!("Invalid real literal '{}'.", text),
                    self.span_from(start),
                )
            })
        } else {
            text.parse::<i64>().map(Token::Int).map_err(|_| {
                SyntaxError::new(
                    format!("Integer literal '{}' is too large.", text),
                    self.span_from(start),
                )
            })
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let mut result = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::keyword(&result).unwrap_or(Token::Identifier(result))
    }

    /// Read a string delimited by `quote`, decoding escape sequences
    fn read_string(&mut self, quote: char, start: Mark) -> Result<Token, SyntaxError> {
        self.advance(); // opening quote
        let mut result = String::new();

        loop {
            match self.current_char {
                None => {
                    return Err(SyntaxError::new(
                        "Unterminated string.",
                        self.span_from(start),
                    ))
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(Token::Str(result));
                }
                Some('\\') => {
                    let escape_start = self.mark();
                    self.advance();
                    let decoded = match self.current_char {
                        Some('n') => Some('\n'),
                        Some('t') => Some('\t'),
                        Some('r') => Some('\r'),
                        Some('0') => Some('\0'),
                        Some('\\') => Some('\\'),
                        Some('"') => Some('"'),
                        Some('\'') => Some('\''),
                        _ => None,
                    };
                    match decoded {
                        Some(ch) => {
                            result.push(ch);
                            self.advance();
                        }
                        None => {
                            if self.current_char.is_some() {
                                self.advance();
                            }
                            self.errors.push(SyntaxError::new(
                                "Invalid escape sequence.",
                                self.span_from(escape_start),
                            ));
                        }
                    }
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Consume `first`, and `second` too if it follows; pick the token accordingly
    fn either(&mut self, second: char, double: Token, single: Token) -> Token {
        self.advance();
        if self.current_char == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<SpannedToken, SyntaxError> {
        self.skip_trivia()?;
        let start = self.mark();

        let token = match self.current_char {
            None => Token::Eof,
            Some(ch) if ch.is_ascii_digit() => self.read_number(start)?,
            Some('.') if self.peek().is_some_and(|next| next.is_ascii_digit()) => {
                self.read_number(start)?
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
            Some(quote @ ('"' | '\'')) => self.read_string(quote, start)?,
            Some('(') => self.single(Token::LeftParen),
            Some(')') => self.single(Token::RightParen),
            Some('[') => self.single(Token::LeftBracket),
            Some(']') => self.single(Token::RightBracket),
            Some('{') => self.single(Token::LeftBrace),
            Some('}') => self.single(Token::RightBrace),
            Some(',') => self.single(Token::Comma),
            Some(';') => self.single(Token::Semicolon),
            Some('?') => self.single(Token::Question),
            Some('.') => self.either('.', Token::DotDot, Token::Dot),
            Some(':') => self.either('=', Token::ColonEquals, Token::Colon),
            Some('!') => self.either('=', Token::NotEquals, Token::Not),
            Some('<') => self.either('=', Token::LessEqual, Token::Less),
            Some('>') => self.either('=', Token::GreaterEqual, Token::Greater),
            Some('%') => self.either('=', Token::PercentEquals, Token::Percent),
            Some('/') => self.either('=', Token::SlashEquals, Token::Slash),
            Some('=') => {
                self.advance();
                match self.current_char {
                    Some('=') => self.single(Token::DoubleEquals),
                    Some('>') => self.single(Token::FatArrow),
                    _ => Token::Equals,
                }
            }
            Some('+') => {
                self.advance();
                match self.current_char {
                    Some('+') => self.single(Token::PlusPlus),
                    Some('=') => self.single(Token::PlusEquals),
                    _ => Token::Plus,
                }
            }
            Some('-') => {
                self.advance();
                match self.current_char {
                    Some('-') => self.single(Token::MinusMinus),
                    Some('=') => self.single(Token::MinusEquals),
                    _ => Token::Minus,
                }
            }
            Some('*') => {
                self.advance();
                match (self.current_char, self.peek()) {
                    (Some('*'), Some('=')) => {
                        self.advance();
                        self.single(Token::StarStarEquals)
                    }
                    (Some('*'), _) => self.single(Token::StarStar),
                    (Some('='), _) => self.single(Token::StarEquals),
                    _ => Token::Star,
                }
            }
            Some('&') if self.peek() == Some('&') => {
                self.advance();
                self.single(Token::And)
            }
            Some('|') if self.peek() == Some('|') => {
                self.advance();
                self.single(Token::Or)
            }
            Some(ch) => {
                self.advance();
                return Err(SyntaxError::new(
                    format!("Unexpected character '{}'.", ch),
                    self.span_from(start),
                ));
            }
        };

        Ok(SpannedToken::new(token, self.span_from(start)))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Tokenize the whole input, ending with `Eof`.
    ///
    /// Scanning continues past bad characters so that every lexical error
    /// in the input is reported at once.
    pub fn tokenize_spanned(&mut self) -> Result<Vec<SpannedToken>, Vec<SyntaxError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        loop {
            match self.next_token() {
                Ok(spanned) => {
                    let done = spanned.token == Token::Eof;
                    tokens.push(spanned);
                    if done {
                        break;
                    }
                }
                Err(error) => errors.push(error),
            }
        }

        errors.append(&mut self.errors);
        if errors.is_empty() {
            Ok(tokens)
        } else {
            errors.sort_by_key(|e| e.span.offset);
            Err(errors)
        }
    }

    /// Tokenize the whole input, discarding spans
    pub fn tokenize(&mut self) -> Result<Vec<Token>, Vec<SyntaxError>> {
        Ok(self
            .tokenize_spanned()?
            .into_iter()
            .map(|st| st.token)
            .collect())
    }
}

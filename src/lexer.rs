use crate::error::{LinkError, Span};
use std::collections::HashMap;

/// Columns a tab counts for when measuring leading whitespace.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Keywords
    App,
    Window,
    Func,
    Class,
    Init,
    New,
    This,
    Connect,
    Import,
    Set,
    Return,
    For,
    In,
    While,
    If,
    Elif,
    Else,
    Try,
    Catch,
    True,
    False,
    Clear,
    Sh,

    // Structural
    Indent,
    Dedent,
    Newline,

    // Literals
    Identifier,
    String,
    Char,
    Integer,
    Float,

    // Symbols
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Arrow,
    Dot,
    Comma,
    Colon,
    Plus,
    PlusPlus,
    Minus,
    Star,
    Slash,
    Equal,
    EqualEqual,
    Less,
    Greater,

    // Special
    Eof,
}

impl TokenType {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TokenType::Newline | TokenType::Indent | TokenType::Dedent
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, span: Span, line: usize, column: usize) -> Self {
        Self {
            token_type,
            lexeme,
            span,
            line,
            column,
        }
    }
}

/// Indentation-aware scanner. Positions are character offsets so spans line
/// up with the diagnostics renderer.
pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    line_start: usize,
    start_line: usize,
    start_column: usize,
    indent_stack: Vec<usize>,
    /// Open `(` and `[` count; newlines inside them are insignificant.
    nesting: usize,
    at_line_start: bool,
    line_has_tokens: bool,
    keywords: HashMap<&'static str, TokenType>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("app", TokenType::App);
        keywords.insert("window", TokenType::Window);
        keywords.insert("func", TokenType::Func);
        keywords.insert("class", TokenType::Class);
        keywords.insert("init", TokenType::Init);
        keywords.insert("new", TokenType::New);
        keywords.insert("this", TokenType::This);
        keywords.insert("connect", TokenType::Connect);
        keywords.insert("import", TokenType::Import);
        keywords.insert("set", TokenType::Set);
        keywords.insert("return", TokenType::Return);
        keywords.insert("for", TokenType::For);
        keywords.insert("in", TokenType::In);
        keywords.insert("while", TokenType::While);
        keywords.insert("if", TokenType::If);
        keywords.insert("elif", TokenType::Elif);
        keywords.insert("else", TokenType::Else);
        keywords.insert("try", TokenType::Try);
        keywords.insert("catch", TokenType::Catch);
        keywords.insert("true", TokenType::True);
        keywords.insert("false", TokenType::False);
        keywords.insert("clear", TokenType::Clear);
        keywords.insert("cls", TokenType::Clear);
        keywords.insert("sh", TokenType::Sh);

        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            line_start: 0,
            start_line: 1,
            start_column: 1,
            indent_stack: vec![0],
            nesting: 0,
            at_line_start: true,
            line_has_tokens: false,
            keywords,
        }
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LinkError> {
        loop {
            if self.at_line_start && self.nesting == 0 {
                self.at_line_start = false;
                self.indentation();
            }
            if self.is_at_end() {
                break;
            }
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.current - self.line_start + 1;
            self.scan_token()?;
        }

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.current - self.line_start + 1;
        if self.line_has_tokens {
            self.add_structural(TokenType::Newline);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.add_structural(TokenType::Dedent);
        }
        self.add_structural(TokenType::Eof);

        Ok(std::mem::take(&mut self.tokens))
    }

    /// Measure the leading whitespace of a logical line and emit INDENT or
    /// DEDENT tokens against the indentation stack. Blank and comment-only
    /// lines leave the stack untouched.
    fn indentation(&mut self) {
        let mut width = 0;
        let mut pos = self.current;
        while let Some(&c) = self.source.get(pos) {
            match c {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                '\r' => {}
                _ => break,
            }
            pos += 1;
        }

        let blank = match self.source.get(pos) {
            None | Some('\n') | Some('#') => true,
            Some('/') => self.source.get(pos + 1) == Some(&'/'),
            _ => false,
        };
        self.current = pos;
        if blank {
            return;
        }

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.current - self.line_start + 1;

        let top = self.indent_stack.last().copied().unwrap_or(0);
        if width > top {
            self.indent_stack.push(width);
            self.add_structural(TokenType::Indent);
        } else {
            while width < self.indent_stack.last().copied().unwrap_or(0) {
                self.indent_stack.pop();
                self.add_structural(TokenType::Dedent);
            }
            // A dedent landing between two levels opens a new level there.
            if width > self.indent_stack.last().copied().unwrap_or(0) {
                self.indent_stack.push(width);
                self.add_structural(TokenType::Indent);
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> Result<(), LinkError> {
        let c = self.advance();

        match c {
            '(' => {
                self.nesting += 1;
                self.add_token(TokenType::LeftParen)
            }
            ')' => {
                self.nesting = self.nesting.saturating_sub(1);
                self.add_token(TokenType::RightParen)
            }
            '[' => {
                self.nesting += 1;
                self.add_token(TokenType::LeftBracket)
            }
            ']' => {
                self.nesting = self.nesting.saturating_sub(1);
                self.add_token(TokenType::RightBracket)
            }
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            ':' => self.add_token(TokenType::Colon),
            '.' => self.add_token(TokenType::Dot),
            '*' => self.add_token(TokenType::Star),
            '<' => self.add_token(TokenType::Less),
            '>' => self.add_token(TokenType::Greater),
            '+' => {
                let token_type = if self.match_char('+') {
                    TokenType::PlusPlus
                } else {
                    TokenType::Plus
                };
                self.add_token(token_type);
            }
            '-' => {
                let token_type = if self.match_char('>') {
                    TokenType::Arrow
                } else {
                    TokenType::Minus
                };
                self.add_token(token_type);
            }
            '=' => {
                let token_type = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token_type);
            }
            '/' => {
                if self.match_char('/') {
                    self.skip_comment();
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '#' => self.skip_comment(),
            ' ' | '\r' | '\t' => {}
            '\n' => self.newline(),
            '"' => self.string()?,
            '\'' => self.char_literal()?,
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => {
                return Err(LinkError::lex_error(
                    Span::single(self.current - 1),
                    format!("Unexpected character: '{}'", c),
                ));
            }
        }

        Ok(())
    }

    fn newline(&mut self) {
        if self.nesting == 0 && self.line_has_tokens {
            self.add_structural(TokenType::Newline);
        }
        self.line += 1;
        self.line_start = self.current;
        if self.nesting == 0 {
            self.at_line_start = true;
            self.line_has_tokens = false;
        }
    }

    fn skip_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source.get(self.current).copied().unwrap_or('\0');
        self.current += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn escape(&mut self, quote: char) -> Result<char, LinkError> {
        let escaped = self.advance();
        match escaped {
            'n' => Ok('\n'),
            't' => Ok('\t'),
            'r' => Ok('\r'),
            '0' => Ok('\0'),
            '\\' => Ok('\\'),
            c if c == quote => Ok(c),
            c => Err(LinkError::lex_error(
                Span::new(self.current - 2, self.current),
                format!("Unknown escape sequence: '\\{}'", c),
            )),
        }
    }

    fn string(&mut self) -> Result<(), LinkError> {
        let mut content = String::new();
        while self.peek() != '"' && self.peek() != '\n' && !self.is_at_end() {
            let c = self.advance();
            if c == '\\' && !self.is_at_end() {
                content.push(self.escape('"')?);
            } else {
                content.push(c);
            }
        }

        if self.peek() != '"' {
            return Err(LinkError::lex_error(
                Span::new(self.start, self.current),
                "Unterminated string".to_string(),
            ));
        }

        // Closing quote
        self.advance();
        self.add_token_with_content(TokenType::String, content);
        Ok(())
    }

    fn char_literal(&mut self) -> Result<(), LinkError> {
        let c = match self.advance() {
            '\\' => self.escape('\'')?,
            '\'' | '\n' | '\0' => {
                return Err(LinkError::lex_error(
                    Span::new(self.start, self.current),
                    "Empty character literal".to_string(),
                ))
            }
            c => c,
        };

        if !self.match_char('\'') {
            return Err(LinkError::lex_error(
                Span::new(self.start, self.current),
                "Character literal must contain exactly one character".to_string(),
            ));
        }

        self.add_token_with_content(TokenType::Char, c.to_string());
        Ok(())
    }

    fn number(&mut self) -> Result<(), LinkError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let number: String = self.source[self.start..self.current].iter().collect();

        if is_float {
            if number.parse::<f64>().is_err() {
                return Err(LinkError::lex_error(
                    Span::new(self.start, self.current),
                    format!("Invalid float: {}", number),
                ));
            }
            self.add_token_with_content(TokenType::Float, number);
        } else {
            if number.parse::<i64>().is_err() {
                return Err(LinkError::lex_error(
                    Span::new(self.start, self.current),
                    format!("Invalid integer: {}", number),
                ));
            }
            self.add_token_with_content(TokenType::Integer, number);
        }

        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let token_type = self
            .keywords
            .get(text.as_str())
            .copied()
            .unwrap_or(TokenType::Identifier);

        self.add_token_with_content(token_type, text);
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.add_token_with_content(token_type, text);
    }

    fn add_token_with_content(&mut self, token_type: TokenType, lexeme: String) {
        self.line_has_tokens = true;
        self.tokens.push(Token::new(
            token_type,
            lexeme,
            Span::new(self.start, self.current),
            self.start_line,
            self.start_column,
        ));
    }

    fn add_structural(&mut self, token_type: TokenType) {
        let pos = self.start.min(self.source.len());
        self.tokens.push(Token::new(
            token_type,
            String::new(),
            Span::new(pos, pos),
            self.start_line,
            self.start_column,
        ));
    }
}

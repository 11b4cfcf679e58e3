//! Handle hydro's lexical analysis.
//!
//! Contains the [Scanner] which implements an [Iterator] that yields [Lexeme]s, each of which
//! represents a [Token].
//!
//! # Example
//!
//! ```
//! use hydro::scanner::{Scanner, Lexeme, Token};
//! let scanner = Scanner::new("print 1 + 2;");
//! let tokens: Vec<_> = scanner
//!     .map(|lexeme| lexeme.token())
//!     .take_while(|&token| token != Token::Eof) // scanner will yield Eof forever...
//!     .collect();
//!
//! use Token::*;
//! assert_eq!(
//!     vec![Print, Number, Plus, Number, Semicolon],
//!     tokens
//! );
//! ```
//!
//! # Note on terminology
//!
//! To avoid using "type" as an identifier:
//!
//! - a token (type, text and line) is a [Lexeme];
//! - the type of a token is a [Token];
//! - the text of a token is [Lexeme::text()].
//!
//! The scanner never allocates: every [Lexeme::text()] borrows from the source code.

use enum_map::Enum;

/// A lexeme from one contiguous string from some hydro source code.
#[derive(Clone, Copy, Debug)]
pub struct Lexeme<'a> {
    /// The [Token] of this lexeme.
    token: Token,
    /// The actual text from the source code.
    text: &'a str,
    /// The line where this lexeme came from.
    line: usize,
}

/// What _type_ of [Lexeme] you have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[rustfmt::skip]
pub enum Token {
    // Single-character tokens.
    LeftParen, RightParen,
    LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus,
    Semicolon, Star, Slash,
    // One or two character tokens
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,
    // Literals
    Identifier, StrLiteral, Number,
    // Keywords
    And, Class, Else, False,
    For, Fun, If, Nil, Or,
    Print, Return, Super, This,
    True, Var, While,

    // Others
    Error, Eof
}

/// Scans hydro source code and iteratively yields [Lexeme]s.
///
/// The scanner is stateful, and therefore, can only be used to do one pass over the source code
/// string. Once the whole source code has been scanned, the scanner will forever yield
/// [Token::Eof].
#[derive(Debug)]
pub struct Scanner<'a> {
    source: &'a str,
    /// Byte offset where the lexeme being scanned begins.
    start: usize,
    /// Byte offset of the next char to be consumed.
    current: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    /// Start scanning the given string of source code.
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Yield the next [Lexeme] from the string. Once the scanner has reached the end-of-file, this
    /// function will always return an end-of-file lexeme.
    pub fn scan_token(&mut self) -> Lexeme<'a> {
        self.skip_whitespace();
        self.start = self.current;

        let Some(c) = self.advance() else {
            return self.make_lexeme(Token::Eof);
        };

        use Token::*;
        match c {
            c if is_id_start(c) => self.identifier(),
            c if c.is_ascii_digit() => self.number(),
            '(' => self.make_lexeme(LeftParen),
            ')' => self.make_lexeme(RightParen),
            '{' => self.make_lexeme(LeftBrace),
            '}' => self.make_lexeme(RightBrace),
            ';' => self.make_lexeme(Semicolon),
            ',' => self.make_lexeme(Comma),
            '.' => self.make_lexeme(Dot),
            '-' => self.make_lexeme(Minus),
            '+' => self.make_lexeme(Plus),
            '/' => self.make_lexeme(Slash),
            '*' => self.make_lexeme(Star),
            '!' => self.one_or_two(BangEqual, Bang),
            '=' => self.one_or_two(EqualEqual, Equal),
            '<' => self.one_or_two(LessEqual, Less),
            '>' => self.one_or_two(GreaterEqual, Greater),
            '"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    /// Returns `true` if we've reached the end of the source code.
    pub fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    /// Returns an error lexeme that does not come from the source code. Used as a placeholder
    /// before the first real lexeme has been scanned.
    pub fn make_sentinel(&self, message: &'static str) -> Lexeme<'a> {
        Lexeme {
            token: Token::Error,
            text: message,
            line: 0,
        }
    }

    /// Consumes and returns the next char, or `None` at the end of the source.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        Some(c)
    }

    /// The unconsumed part of the source.
    #[inline]
    fn rest(&self) -> &'a str {
        &self.source[self.current..]
    }

    /// Peek at the next char without consuming it.
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Peek at the char after the next one.
    fn peek_next(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    /// Consumes the next char only if it is the expected one.
    fn match_and_advance(&mut self, expected: char) -> bool {
        if self.peek() != Some(expected) {
            return false;
        }

        self.current += expected.len_utf8();
        true
    }

    /// For operators that may be followed by `=`, like `<` and `<=`.
    fn one_or_two(&mut self, with_equal: Token, alone: Token) -> Lexeme<'a> {
        let token = if self.match_and_advance('=') {
            with_equal
        } else {
            alone
        };
        self.make_lexeme(token)
    }

    /// Skips whitespace and comments, counting newlines.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\r' | '\t' => {}
                '\n' => self.line += 1,
                // Comments are "whitespace"
                '/' if self.peek_next() == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                    continue;
                }
                _ => return,
            }
            self.advance();
        }
    }

    /// Scan an identifier or keyword.
    fn identifier(&mut self) -> Lexeme<'a> {
        while self.peek().is_some_and(is_id_continue) {
            self.advance();
        }

        self.make_lexeme(keyword_or_identifier(self.lexeme_text()))
    }

    /// Scan a string literal. Expects the starting quote to have been consumed.
    fn string(&mut self) -> Lexeme<'a> {
        loop {
            match self.advance() {
                Some('"') => return self.make_lexeme(Token::StrLiteral),
                Some('\n') => self.line += 1,
                Some(_) => {}
                None => return self.error_token("Unterminated string."),
            }
        }
    }

    /// Scan a number literal. Expects the first digit to have already been consumed.
    fn number(&mut self) -> Lexeme<'a> {
        self.digits();

        // A fractional part needs at least one digit after the point.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.digits();
        }

        self.make_lexeme(Token::Number)
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Returns a lexeme with [Token::Error] as its token. Its text is the message.
    fn error_token(&self, message: &'static str) -> Lexeme<'a> {
        Lexeme {
            token: Token::Error,
            text: message,
            line: self.line,
        }
    }

    /// The source text between self.start and self.current.
    fn lexeme_text(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    /// Returns a [Lexeme] from the span between self.start and self.current with the given
    /// [Token].
    fn make_lexeme(&self, token: Token) -> Lexeme<'a> {
        Lexeme {
            token,
            text: self.lexeme_text(),
            line: self.line,
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Lexeme<'a>;

    fn next(&mut self) -> Option<Lexeme<'a>> {
        Some(self.scan_token())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // This iterator is infinite.
        (usize::MAX, None)
    }
}

impl<'a> Lexeme<'a> {
    /// Return the line number this token was found on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Return the literal text of this token. For string literals, this always includes the
    /// quotes. For [Token::Error], this is the error message.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Return the [Token] of this lexeme.
    pub fn token(&self) -> Token {
        self.token
    }
}

///////////////////////////////////////////// Helpers /////////////////////////////////////////////

/// Returns the keyword spelled by `text`, or [Token::Identifier].
fn keyword_or_identifier(text: &str) -> Token {
    use Token::*;
    match text {
        "and" => And,
        "class" => Class,
        "else" => Else,
        "false" => False,
        "for" => For,
        "fun" => Fun,
        "if" => If,
        "nil" => Nil,
        "or" => Or,
        "print" => Print,
        "return" => Return,
        "super" => Super,
        "this" => This,
        "true" => True,
        "var" => Var,
        "while" => While,
        _ => Identifier,
    }
}

/// Returns true if this char can start an identifier or keyword. Only ASCII letters can.
fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Returns true if this char can be used after the first character of an identifier or keyword.
fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

////////////////////////////////////////////// Tests //////////////////////////////////////////////

//! Core OMNIX lexer: converts source text to a token stream.
//!
//! Features:
//! - Whitespace and comments (`//`, `/* ... */`) skipped without tokens
//! - `"` / `'` strings with `\n \t \r \\ \" \'` escapes
//! - Integer, float, and time literals (`3000ms`, `5s`, `2days`) with
//!   rewind when a letter run after an integer is not a unit suffix
//! - Keyword / type / algorithm / network classification for identifiers,
//!   with `Consensus::<Name>` fused into a single algorithm token
//! - Longest-match operators: `<!>` `<?>` `<#>` `<@>` before `<`
//! - Fail-fast on the first unrecognized character
//!
//! The stream always ends with [`TokenKind::Eof`].

use omnix_types::ast::TimeUnit;
use omnix_types::{LexicalError, Span};

use crate::token::{Token, TokenKind};

/// The OMNIX lexer.
pub struct Lexer {
    /// Source text as characters.
    chars: Vec<char>,
    /// Current index into `chars`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
}

impl Lexer {
    /// Create a new lexer for the given source text.
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Lex the entire source into a token stream ending with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexicalError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.at_end() {
                tokens.push(Token::new(TokenKind::Eof, Span::point(self.line, self.col)));
                return Ok(tokens);
            }
            tokens.push(self.scan_token()?);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace, line comments, and block comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    // An unterminated block comment consumes to EOF.
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Result<Token, LexicalError> {
        let start_line = self.line;
        let start_col = self.col;
        let ch = self.peek().expect("scan_token called at EOF");

        let kind = match ch {
            '"' | '\'' => self.scan_string(start_line, start_col)?,
            '0'..='9' => self.scan_number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_word(),

            '<' => {
                // Three-character consensus operators before generic `<`.
                match (self.peek_at(1), self.peek_at(2)) {
                    (Some('!'), Some('>')) => self.take(3, TokenKind::Propose),
                    (Some('?'), Some('>')) => self.take(3, TokenKind::Vote),
                    (Some('#'), Some('>')) => self.take(3, TokenKind::Merge),
                    (Some('@'), Some('>')) => self.take(3, TokenKind::Query),
                    (Some('='), _) => self.take(2, TokenKind::LessEq),
                    _ => self.take(1, TokenKind::Less),
                }
            }
            '=' => {
                if self.peek_at(1) == Some('=') {
                    self.take(2, TokenKind::EqEq)
                } else {
                    self.take(1, TokenKind::Assign)
                }
            }
            '!' => {
                if self.peek_at(1) == Some('=') {
                    self.take(2, TokenKind::NotEq)
                } else {
                    self.take(1, TokenKind::Bang)
                }
            }
            '>' => {
                if self.peek_at(1) == Some('=') {
                    self.take(2, TokenKind::GreaterEq)
                } else {
                    self.take(1, TokenKind::Greater)
                }
            }
            '&' if self.peek_at(1) == Some('&') => self.take(2, TokenKind::AndAnd),
            '|' if self.peek_at(1) == Some('|') => self.take(2, TokenKind::OrOr),
            '-' => {
                if self.peek_at(1) == Some('>') {
                    self.take(2, TokenKind::Arrow)
                } else {
                    self.take(1, TokenKind::Minus)
                }
            }
            ':' => {
                if self.peek_at(1) == Some(':') {
                    self.take(2, TokenKind::ColonColon)
                } else {
                    self.take(1, TokenKind::Colon)
                }
            }
            '+' => self.take(1, TokenKind::Plus),
            '*' => self.take(1, TokenKind::Star),
            '/' => self.take(1, TokenKind::Slash),
            '%' => self.take(1, TokenKind::Percent),
            '.' => self.take(1, TokenKind::Dot),
            ',' => self.take(1, TokenKind::Comma),
            ';' => self.take(1, TokenKind::Semicolon),
            '(' => self.take(1, TokenKind::LParen),
            ')' => self.take(1, TokenKind::RParen),
            '{' => self.take(1, TokenKind::LBrace),
            '}' => self.take(1, TokenKind::RBrace),
            '[' => self.take(1, TokenKind::LBracket),
            ']' => self.take(1, TokenKind::RBracket),
            '@' => self.take(1, TokenKind::At),

            other => {
                return Err(LexicalError::new(other, start_line, start_col));
            }
        };

        Ok(Token::new(kind, self.span_from(start_line, start_col)))
    }

    /// Consume `n` characters and return `kind`.
    fn take(&mut self, n: usize, kind: TokenKind) -> TokenKind {
        for _ in 0..n {
            self.advance();
        }
        kind
    }

    // ─────────────────────────────────────────────────────────────
    // Number & time literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self) -> TokenKind {
        let mut digits = String::new();
        while let Some(ch @ '0'..='9') = self.peek() {
            digits.push(ch);
            self.advance();
        }

        // A `.` continues as a float only when a digit follows; `5.foo`
        // stays an integer followed by member access.
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
            digits.push('.');
            self.advance();
            while let Some(ch @ '0'..='9') = self.peek() {
                digits.push(ch);
                self.advance();
            }
            return TokenKind::Float(digits.parse().unwrap_or(0.0));
        }

        let value: i64 = digits.parse().unwrap_or(0);

        // Unit-suffix attempt: read the lowercase letter run and match it
        // against the unit table. A miss rewinds so the letters re-lex as
        // a separate identifier/keyword token: no characters are lost.
        if matches!(self.peek(), Some('a'..='z')) {
            let saved_pos = self.pos;
            let saved_col = self.col;
            let mut suffix = String::new();
            while let Some(ch @ 'a'..='z') = self.peek() {
                suffix.push(ch);
                self.advance();
            }
            match TimeUnit::from_suffix(&suffix) {
                Some(unit) => return TokenKind::Duration { value, unit },
                None => {
                    self.pos = saved_pos;
                    self.col = saved_col;
                }
            }
        }

        TokenKind::Int(value)
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // `Consensus` + `::` + letters fuses into one algorithm token.
        if word == "Consensus"
            && self.peek() == Some(':')
            && self.peek_at(1) == Some(':')
            && self.peek_at(2).is_some_and(|c| c.is_ascii_alphabetic())
        {
            self.advance();
            self.advance();
            let mut name = String::new();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    name.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            return TokenKind::Algorithm(format!("Consensus::{name}"));
        }

        TokenKind::classify_word(&word)
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Result<TokenKind, LexicalError> {
        let quote = self.advance().expect("string scan at EOF");
        let mut buf = String::new();

        loop {
            match self.peek() {
                None => {
                    // Unterminated: report at the opening quote.
                    return Err(LexicalError::new(quote, start_line, start_col));
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(TokenKind::Str(buf));
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => buf.push('\n'),
                        Some('t') => buf.push('\t'),
                        Some('r') => buf.push('\r'),
                        Some('\\') => buf.push('\\'),
                        Some('"') => buf.push('"'),
                        Some('\'') => buf.push('\''),
                        // Any other escaped character is taken literally.
                        Some(other) => buf.push(other),
                        None => {
                            return Err(LexicalError::new(quote, start_line, start_col));
                        }
                    }
                }
                Some(ch) => {
                    buf.push(ch);
                    self.advance();
                }
            }
        }
    }
}

/// Convenience wrapper: lex a source string in one call.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_source_is_eof_only() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = tokenize("let x").unwrap();
        assert_eq!(tokens[0].span.start_line, 1);
        assert_eq!(tokens[0].span.start_col, 1);
        assert_eq!(tokens[1].span.start_col, 5);
    }

    #[test]
    fn test_line_tracking_across_newlines() {
        let tokens = tokenize("let\nx").unwrap();
        assert_eq!(tokens[1].span.start_line, 2);
        assert_eq!(tokens[1].span.start_col, 1);
    }

    #[test]
    fn test_unknown_character_fails() {
        let err = tokenize("let $x").unwrap_err();
        assert_eq!(err.ch, '$');
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_lone_ampersand_fails() {
        let err = tokenize("a & b").unwrap_err();
        assert_eq!(err.ch, '&');
    }
}

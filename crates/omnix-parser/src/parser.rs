//! Core parser infrastructure: token cursor, error construction, helpers.

use omnix_lexer::token::{Token, TokenKind};
use omnix_types::ast::{Ident, Program};
use omnix_types::{Span, SyntaxError};

/// Result alias for parser operations. The first unexpected token aborts
/// the parse.
pub type PResult<T> = Result<T, SyntaxError>;

/// Parser configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Inside declaration bodies (`cluster`, `node`, `contract`,
    /// `pipeline`, `stage`), skip tokens that match no known member
    /// production instead of failing, tolerating informally written
    /// programs. The default is strict.
    pub lenient_declarations: bool,
}

/// The OMNIX parser.
///
/// Consumes a token stream produced by the lexer and builds an AST via
/// recursive descent with an explicit precedence ladder.
pub struct Parser {
    /// The token stream (ends with `Eof`).
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Configuration.
    pub(crate) options: ParseOptions,
}

impl Parser {
    /// Create a new parser with default (strict) options.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_options(tokens, ParseOptions::default())
    }

    /// Create a new parser with explicit options.
    pub fn with_options(tokens: Vec<Token>, options: ParseOptions) -> Self {
        Self {
            tokens,
            pos: 0,
            options,
        }
    }

    /// Parse the token stream into a [`Program`].
    pub fn parse(mut self) -> PResult<Program> {
        self.parse_program()
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens
                .last()
                .expect("token stream should end with Eof")
        })
    }

    /// Returns the kind of the current token.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Look ahead by `offset` tokens from the current position.
    pub(crate) fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    /// Returns the span of the current token.
    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Returns `true` if the current token is `Eof`.
    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Build a syntax error at the current token.
    pub(crate) fn error(&self, expected: impl Into<String>) -> SyntaxError {
        SyntaxError::new(
            expected,
            format!("'{}'", self.peek_kind()),
            self.peek().line(),
        )
    }

    /// Expect a specific token kind; consume it or fail.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> PResult<Token> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("'{expected}'")))
        }
    }

    /// Expect an identifier token.
    pub(crate) fn expect_identifier(&mut self) -> PResult<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            _ => Err(self.error("identifier")),
        }
    }

    /// Expect a name usable after `.` or as a property key: an identifier,
    /// or a keyword / reserved word appearing in name position (`consensus:
    /// Consensus::PBFT` uses the `consensus` keyword as a property key).
    pub(crate) fn expect_name(&mut self) -> PResult<Ident> {
        let kind = self.peek_kind().clone();
        match &kind {
            TokenKind::Identifier(name)
            | TokenKind::TypeName(name)
            | TokenKind::Network(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            _ if kind.is_keyword() => {
                let span = self.advance().span;
                Ok(Ident::new(kind.to_string(), span))
            }
            _ => Err(self.error("name")),
        }
    }

    /// `true` if the current token could be a `key: expr` property entry.
    pub(crate) fn at_property(&self) -> bool {
        let key_like = matches!(
            self.peek_kind(),
            TokenKind::Identifier(_) | TokenKind::TypeName(_) | TokenKind::Network(_)
        ) || self.peek_kind().is_keyword();
        key_like && self.peek_at(1) == &TokenKind::Colon
    }

    /// Eat an optional `,` or `;` separator after a declaration-body
    /// property entry.
    pub(crate) fn eat_property_separator(&mut self) {
        if !self.eat(&TokenKind::Comma) {
            self.eat(&TokenKind::Semicolon);
        }
    }
}

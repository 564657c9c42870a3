//! Type-reference parsing.

use omnix_lexer::token::TokenKind;
use omnix_types::ast::TypeRef;

use crate::parser::{PResult, Parser};

impl Parser {
    /// A primitive-type keyword or a bare identifier, optionally followed
    /// by `< T, ... >` generic arguments: `u64`, `vec<u64>`,
    /// `map<string, Order>`.
    pub(crate) fn parse_type(&mut self) -> PResult<TypeRef> {
        let span = self.current_span();
        let name = match self.peek_kind().clone() {
            TokenKind::TypeName(name) => {
                self.advance();
                name
            }
            TokenKind::Identifier(name) => {
                self.advance();
                name
            }
            _ => return Err(self.error("type")),
        };

        let mut args = Vec::new();
        if self.eat(&TokenKind::Less) {
            loop {
                args.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Greater)?;
        }

        let span = span.merge(self.previous_span());
        Ok(TypeRef { name, args, span })
    }
}

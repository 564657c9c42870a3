//! OMNIX parser: converts a token stream into an AST.

mod parse_decl;
mod parse_expr;
mod parse_stmt;
mod parse_type;
mod parser;

pub use parser::{PResult, ParseOptions, Parser};

use omnix_lexer::Token;
use omnix_types::ast::Program;
use omnix_types::SyntaxError;

/// Parse a token stream with default (strict) options.
pub fn parse(tokens: Vec<Token>) -> Result<Program, SyntaxError> {
    Parser::new(tokens).parse()
}

//! OMNIX lexer: converts source text into a token stream.

pub mod lexer;
pub mod token;

pub use lexer::{tokenize, Lexer};
pub use token::{Token, TokenKind, ALGORITHMS, KEYWORDS, NETWORKS, TYPE_NAMES};

//! Compile-time error types for the OMNIX front-end.
//!
//! Both errors are fail-fast: the lexer and parser abort on the first
//! problem and hand it back to the caller with its source position.
//! Runtime errors live in `omnix-eval` next to the evaluator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An unrecognized character in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("unexpected character '{ch}' at {line}:{column}")]
pub struct LexicalError {
    /// The offending character.
    pub ch: char,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl LexicalError {
    pub fn new(ch: char, line: u32, column: u32) -> Self {
        Self { ch, line, column }
    }
}

/// A required token was missing during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("expected {expected}, got {actual} at line {line}")]
pub struct SyntaxError {
    /// What the parser required (a token kind or grammar production).
    pub expected: String,
    /// The token kind actually found.
    pub actual: String,
    /// 1-based line of the offending token.
    pub line: u32,
}

impl SyntaxError {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>, line: u32) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_error_display() {
        let err = LexicalError::new('$', 3, 14);
        assert_eq!(err.to_string(), "unexpected character '$' at 3:14");
    }

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::new("';'", "'}'", 7);
        assert_eq!(err.to_string(), "expected ';', got '}' at line 7");
    }

    #[test]
    fn test_errors_serialize() {
        let err = SyntaxError::new("identifier", "'{'", 2);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"expected\""));
        assert!(json.contains("\"line\":2"));
        let back: SyntaxError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}

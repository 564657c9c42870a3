//! Runtime error types for the OMNIX evaluator.

use crate::value::Value;
use omnix_types::{LexicalError, SyntaxError};
use thiserror::Error;

/// Runtime failure while evaluating a program.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// An identifier bound nowhere in the active scope chain.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    /// Call of a value that is not callable.
    #[error("'{0}' is not callable")]
    NotCallable(String),
    /// Member access on a value that has no such member.
    #[error("invalid member access '{member}' on {target}")]
    InvalidMember { target: String, member: String },
    /// Indexing a value that does not support indexing.
    #[error("cannot index {0}")]
    NotIndexable(String),
    /// `Target::member` where the target has no such static member.
    #[error("unknown static method '{target}::{member}'")]
    UnknownStaticMethod { target: String, member: String },
    /// A `Consensus::<Name>` literal naming no known algorithm.
    #[error("unknown consensus algorithm '{0}'")]
    UnknownAlgorithm(String),
    /// Assignment to something that is not a place expression.
    #[error("invalid assignment target")]
    InvalidAssignment,
    /// Operand types unsupported by an operator or native.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Division or modulo by zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    /// `assert(...)` failure.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
    /// The evaluation step budget ran out (runaway loop guard).
    #[error("step limit exceeded")]
    StepLimitExceeded,
    /// Internal control-flow signal for `return`. Unwrapped at function
    /// and top-level boundaries; callers never observe it.
    #[error("return outside of a function")]
    Return(Value),
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, RuntimeError>;

/// Any failure from the full compile-and-run pipeline, tagged by stage.
#[derive(Debug, Clone, Error)]
pub enum OmnixError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

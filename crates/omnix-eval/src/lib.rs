//! OMNIX tree-walking evaluator.
//!
//! Executes OMNIX programs directly from the AST: lexical scoping,
//! node/cluster/pipeline/contract declarations, and the simulated
//! consensus operators. Each [`Evaluator`] owns its event log, consensus
//! log, and registries; independent evaluators never interfere.

mod builtins;
mod env;
mod error;
mod evaluator;
mod value;

pub use env::Environment;
pub use error::{EvalResult, OmnixError, RuntimeError};
pub use evaluator::{ConsensusRecord, EvalOptions, Evaluator};
pub use value::{
    Callable, ClusterValue, ConsensusResult, ContractValue, FunctionValue, NodeBuiltin,
    NodeInstance, NodeTemplate, PipelineValue, StageValue, Value,
};

use omnix_types::ast::Program;

/// Lex and parse a source string without evaluating it. The AST is
/// serde-serializable for external tooling.
pub fn compile(source: &str) -> Result<Program, OmnixError> {
    let tokens = omnix_lexer::tokenize(source).map_err(OmnixError::Lexical)?;
    omnix_parser::parse(tokens).map_err(OmnixError::Syntax)
}

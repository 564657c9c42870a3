//! Runtime values for the OMNIX evaluator.
//!
//! One variant per value kind the language can produce: the usual
//! scalars and collections, plus the explicitly-typed descriptor values
//! for node constructors, node instances, clusters, pipelines, and
//! cross-chain contracts. Nothing is duck-typed.

use crate::env::Environment;
use crate::error::{EvalResult, RuntimeError};
use crate::evaluator::Evaluator;
use omnix_types::ast::FunctionDecl;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Sequence(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Callable(Callable),
    Node(Rc<NodeInstance>),
    Consensus(ConsensusResult),
    Cluster(Rc<ClusterValue>),
    Pipeline(Rc<PipelineValue>),
    Contract(Rc<ContractValue>),
    Constructor(Rc<NodeTemplate>),
}

/// The result of a consensus operation. Consensus is simulated and never
/// rejected, so `accepted` is always constructed `true`.
#[derive(Clone, PartialEq)]
pub struct ConsensusResult {
    pub value: Box<Value>,
    pub accepted: bool,
}

/// A declared node: the template the constructor value instantiates.
pub struct NodeTemplate {
    pub name: String,
    /// State initializers, evaluated once at declaration time.
    pub initial_state: Vec<(String, Value)>,
    pub methods: BTreeMap<String, Rc<FunctionDecl>>,
    /// The declaration scope methods close over.
    pub env: Environment,
}

/// A live node instance created by `new()`.
pub struct NodeInstance {
    /// Opaque id, unique per evaluator.
    pub id: String,
    pub running: Cell<bool>,
    pub cluster: RefCell<Option<String>>,
    /// Instance scope: per-instance state, parented at the declaration
    /// scope, with the bound methods registered into it.
    pub state: Environment,
    pub template: Rc<NodeTemplate>,
}

/// A cluster descriptor: properties evaluated once, not instantiable.
pub struct ClusterValue {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub methods: BTreeMap<String, Rc<FunctionDecl>>,
    /// Declaration scope holding the cluster's state.
    pub env: Environment,
}

/// A pipeline descriptor exposing `execute(input)`.
pub struct PipelineValue {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub stages: Vec<StageValue>,
}

/// One pipeline stage: a name and its evaluated property bag.
pub struct StageValue {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
}

/// A cross-chain contract descriptor.
pub struct ContractValue {
    pub name: String,
    /// Fixed, ordered chain list every method call fans out over.
    pub chains: Vec<String>,
    pub methods: BTreeMap<String, Rc<FunctionDecl>>,
    /// Declaration scope holding contract state and the contract natives.
    pub env: Environment,
}

/// Signature of a native built-in.
pub type NativeFn = fn(&mut Evaluator, Vec<Value>) -> EvalResult<Value>;

/// Anything invocable by a call expression.
#[derive(Clone)]
pub enum Callable {
    /// A user function, method, or closure.
    Function(Rc<FunctionValue>),
    /// A native built-in (`print`, `assert`, `lock_tokens`, ...).
    Native(Rc<NativeValue>),
    /// A node constructor's `new`.
    Constructor(Rc<NodeTemplate>),
    /// A node instance built-in (`start`, `join_cluster`, `synchronized`).
    NodeBuiltin {
        node: Rc<NodeInstance>,
        builtin: NodeBuiltin,
    },
    /// A contract method (including `deploy`): fans out across chains.
    ContractMethod {
        contract: Rc<ContractValue>,
        method: String,
    },
    /// A pipeline's `execute`.
    PipelineExecute(Rc<PipelineValue>),
}

/// A first-class user function with its captured scope.
pub struct FunctionValue {
    pub decl: Rc<FunctionDecl>,
    pub env: Environment,
    /// Bound instance for node methods; `self` resolves to it.
    pub receiver: Option<Rc<NodeInstance>>,
}

/// A named native function.
pub struct NativeValue {
    pub name: &'static str,
    pub func: NativeFn,
}

/// The node instance built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBuiltin {
    Start,
    JoinCluster,
    Synchronized,
}

impl Callable {
    /// Short label for error messages.
    pub fn label(&self) -> String {
        match self {
            Callable::Function(f) => f.decl.name.name.clone(),
            Callable::Native(n) => n.name.to_string(),
            Callable::Constructor(t) => format!("{}.new", t.name),
            Callable::NodeBuiltin { builtin, .. } => match builtin {
                NodeBuiltin::Start => "start".to_string(),
                NodeBuiltin::JoinCluster => "join_cluster".to_string(),
                NodeBuiltin::Synchronized => "synchronized".to_string(),
            },
            Callable::ContractMethod { method, .. } => method.clone(),
            Callable::PipelineExecute(_) => "execute".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Value inspection
// ─────────────────────────────────────────────────────────────────────

impl Value {
    /// The value's type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Sequence(_) => "sequence",
            Value::Record(_) => "record",
            Value::Callable(_) => "function",
            Value::Node(_) => "node",
            Value::Consensus(_) => "consensus result",
            Value::Cluster(_) => "cluster",
            Value::Pipeline(_) => "pipeline",
            Value::Contract(_) => "contract",
            Value::Constructor(_) => "node constructor",
        }
    }

    /// Truthiness. A consensus result's truth is its `accepted` flag,
    /// never generic object truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Consensus(r) => r.accepted,
            _ => true,
        }
    }

    /// Serialize for the consensus log and `[Category]` event lines.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Null => serde_json::Value::Null,
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Callable(c) => serde_json::Value::String(format!("<function {}>", c.label())),
            Value::Node(n) => serde_json::json!({ "node": n.id }),
            Value::Consensus(r) => {
                serde_json::json!({ "value": r.value.to_json(), "accepted": r.accepted })
            }
            Value::Cluster(c) => serde_json::json!({ "cluster": c.name }),
            Value::Pipeline(p) => serde_json::json!({ "pipeline": p.name }),
            Value::Contract(c) => serde_json::json!({ "contract": c.name }),
            Value::Constructor(t) => serde_json::json!({ "constructor": t.name }),
        }
    }

    /// Expect a number, with a contextual error.
    pub fn as_number(&self, context: &str) -> EvalResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(RuntimeError::TypeMismatch(format!(
                "{context} requires a number, got {}",
                other.type_name()
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Equality
// ─────────────────────────────────────────────────────────────────────

impl PartialEq for Value {
    /// Structural for data, identity for instances and descriptors,
    /// never equal for callables. NaN != NaN.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => !a.is_nan() && !b.is_nan() && a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Consensus(a), Value::Consensus(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => Rc::ptr_eq(a, b),
            (Value::Cluster(a), Value::Cluster(b)) => Rc::ptr_eq(a, b),
            (Value::Pipeline(a), Value::Pipeline(b)) => Rc::ptr_eq(a, b),
            (Value::Contract(a), Value::Contract(b)) => Rc::ptr_eq(a, b),
            (Value::Constructor(a), Value::Constructor(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Display
// ─────────────────────────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Record(fields) => {
                let parts: Vec<String> =
                    fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{ {} }}", parts.join(", "))
            }
            Value::Callable(c) => write!(f, "<function {}>", c.label()),
            Value::Node(n) => write!(f, "<node {}>", n.id),
            Value::Consensus(r) => {
                write!(f, "ConsensusResult(value={}, accepted={})", r.value, r.accepted)
            }
            Value::Cluster(c) => write!(f, "<cluster {}>", c.name),
            Value::Pipeline(p) => write!(f, "<pipeline {}>", p.name),
            Value::Contract(c) => write!(f, "<contract {}>", c.name),
            Value::Constructor(t) => write!(f, "<node constructor {}>", t.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(Value::Sequence(vec![]).is_truthy());
        assert!(Value::Record(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_consensus_truthiness_reads_accepted_flag() {
        let accepted = Value::Consensus(ConsensusResult {
            value: Box::new(Value::Null),
            accepted: true,
        });
        // `value` being null/falsy must not matter.
        assert!(accepted.is_truthy());
        let rejected = Value::Consensus(ConsensusResult {
            value: Box::new(Value::Number(1.0)),
            accepted: false,
        });
        assert!(!rejected.is_truthy());
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            Value::Sequence(vec![Value::Number(1.0), Value::Str("a".into())]),
            Value::Sequence(vec![Value::Number(1.0), Value::Str("a".into())])
        );
        assert_ne!(Value::Number(1.0), Value::Str("1".into()));
        let nan = Value::Number(f64::NAN);
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn test_display_numbers() {
        assert_eq!(Value::Number(2000.0).to_string(), "2000");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_to_json_shapes() {
        let mut record = BTreeMap::new();
        record.insert("n".to_string(), Value::Number(3.0));
        let v = Value::Sequence(vec![Value::Record(record), Value::Null]);
        assert_eq!(v.to_json(), serde_json::json!([{ "n": 3 }, null]));
    }
}

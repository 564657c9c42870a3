//! AST node types for the OMNIX language.
//!
//! Every node carries a [`Span`] for error reporting and derives serde so
//! external tooling (formatters, analyzers) can consume the tree as JSON.
//! The unions are closed: one variant per construct, no catch-all node, so
//! the evaluator's dispatch can be exhaustive.

use crate::Span;
use serde::{Deserialize, Serialize};

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A complete OMNIX program: declarations and script-style statements,
/// in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

/// One top-level item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Decl(Decl),
    Stmt(Stmt),
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    /// `consensus cluster Name { ... }`
    Cluster(ClusterDecl),
    /// `node Name { ... }`
    Node(NodeDecl),
    /// `function name(params) -> type { ... }`
    Function(FunctionDecl),
    /// `contract Name { ... }`, optionally `@cross_chain(...)`-annotated
    Contract(ContractDecl),
    /// `pipeline Name { stage ... }`
    Pipeline(PipelineDecl),
    /// `import a.b.c;`
    Import(ImportDecl),
    /// `export <decl>`
    Export(ExportDecl),
}

/// A spanned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// `@name(arg, key: expr, ...)` attached to the following declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: Ident,
    pub args: Vec<AnnotationArg>,
    pub span: Span,
}

/// One annotation argument, positional (`ethereum`) or named (`key: expr`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationArg {
    pub name: Option<Ident>,
    pub value: Expr,
}

/// A `key: expr` entry inside a declaration body, stage, or options block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: Ident,
    pub value: Expr,
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// `consensus cluster Name { replicas: 5  consensus: Consensus::PBFT ... }`
///
/// Evaluated once at declaration time into a non-instantiable descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDecl {
    pub name: Ident,
    pub annotations: Vec<Annotation>,
    pub properties: Vec<Property>,
    pub state: Vec<StateDecl>,
    pub methods: Vec<FunctionDecl>,
    pub handlers: Vec<EventHandler>,
    pub span: Span,
}

/// `node Name { state ...; function ...; on event { } }`
///
/// A template: instances are created through the bound constructor's `new()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDecl {
    pub name: Ident,
    pub annotations: Vec<Annotation>,
    pub properties: Vec<Property>,
    pub state: Vec<StateDecl>,
    pub methods: Vec<FunctionDecl>,
    pub handlers: Vec<EventHandler>,
    pub span: Span,
}

/// `state name: type = expr;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub name: Ident,
    pub ty: TypeRef,
    pub init: Option<Expr>,
    pub span: Span,
}

/// `on peer_discovered { ... }`: registered but never fired in this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHandler {
    pub event: Ident,
    pub body: Block,
    pub span: Span,
}

/// `function name(params) -> type { body }` (also `service` methods).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: Ident,
    pub annotations: Vec<Annotation>,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeRef>,
    pub body: Block,
    pub span: Span,
}

/// A parameter: `name` or `name: type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeRef>,
    pub span: Span,
}

/// `contract Name { state ...; function ...; }`
///
/// `chains` comes from the `@cross_chain(...)` annotation; a contract
/// without one is bound to the single chain `local`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDecl {
    pub name: Ident,
    pub annotations: Vec<Annotation>,
    pub chains: Vec<Ident>,
    pub state: Vec<StateDecl>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

/// `pipeline Name { input: ...  stage clean { ... } stage enrich { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDecl {
    pub name: Ident,
    pub annotations: Vec<Annotation>,
    pub properties: Vec<Property>,
    pub stages: Vec<StageDecl>,
    pub span: Span,
}

/// `stage name { parallel: true  workers: 4  process: transform }`
///
/// Stages are property bags; there is no executable stage body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDecl {
    pub name: Ident,
    pub properties: Vec<Property>,
    pub span: Span,
}

/// `import analytics.metrics;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Dotted module path, joined: `analytics.metrics`.
    pub path: String,
    pub span: Span,
}

/// `export <decl>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDecl {
    pub inner: Box<Decl>,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

/// `{ statements... }`: executed in a fresh child scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name (: type)? = expr;`
    Let(LetStmt),
    /// `place = expr;`
    Assign(AssignStmt),
    /// `return expr?;`
    Return(ReturnStmt),
    /// `if cond { } else if ... else { }`
    If(IfStmt),
    /// `when cond { }`: no else branch
    When(WhenStmt),
    /// `phase name { }`
    Phase(PhaseStmt),
    /// `broadcast(expr);`
    Broadcast(BroadcastStmt),
    /// `for name in expr { }`
    For(ForStmt),
    /// `while cond { }`
    While(WhileStmt),
    /// A bare expression statement.
    Expr(ExprStmt),
}

/// `let name (: type)? = expr;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetStmt {
    pub name: Ident,
    pub ty: Option<TypeRef>,
    pub value: Expr,
    pub span: Span,
}

/// `place = expr;`: the place is an identifier, member, or index expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

/// `return expr?;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

/// `if cond { } else (if | { })`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

/// The else branch of an if statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElseBranch {
    ElseIf(Box<IfStmt>),
    Block(Block),
}

/// `when cond { }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

/// `phase prepare { }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStmt {
    pub name: Ident,
    pub body: Block,
    pub span: Span,
}

/// `broadcast(expr);`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastStmt {
    pub message: Expr,
    pub span: Span,
}

/// `for item in iterable { }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub item: Ident,
    pub iterable: Expr,
    pub body: Block,
    pub span: Span,
}

/// `while cond { }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

/// A bare expression statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// An expression node. Recursive variants are boxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    // ── Literals ──
    /// `42`
    Int(i64),
    /// `3.14`
    Float(f64),
    /// `"hello"` / `'hello'`
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// `5s`, `3000ms`, `2days`: scaled to milliseconds by the evaluator
    Duration { value: i64, unit: TimeUnit },
    /// `Consensus::PBFT` or a bare algorithm name like `Raft`
    Algorithm(String),
    /// `[expr, ...]`
    Array(Vec<Expr>),
    /// `{ key: expr, ... }`
    Object(Vec<Property>),

    // ── Names ──
    /// `counter`, `self`
    Identifier(String),
    /// `Target::member`
    StaticAccess { target: Ident, member: Ident },

    // ── Operators ──
    /// `a + b`, `a == b`, `a && b`, ...
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `-x`, `!x`
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// `value <!> { validators: 3 }`, `counter <#> counter + 1`
    Consensus(ConsensusExpr),

    // ── Postfix ──
    /// `callee(args...)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `object.property`
    Member {
        object: Box<Expr>,
        property: Ident,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

/// A consensus-operator expression.
///
/// The operator binds over the entire lower-precedence expression already
/// parsed (`target`). The right-hand side is either an options block
/// (`{ validators: 3, timeout: 5s }`), a payload operand, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusExpr {
    pub op: ConsensusOp,
    pub target: Box<Expr>,
    pub operand: Option<Box<Expr>>,
    pub options: Vec<Property>,
}

/// The four consensus pseudo-operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusOp {
    /// `<!>`
    Propose,
    /// `<?>`
    Vote,
    /// `<#>`
    Merge,
    /// `<@>`
    Query,
}

impl ConsensusOp {
    /// Operation name as recorded in the consensus log.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusOp::Propose => "PROPOSE",
            ConsensusOp::Vote => "VOTE",
            ConsensusOp::Merge => "MERGE",
            ConsensusOp::Query => "QUERY",
        }
    }
}

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Operator symbol for error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

/// Time-literal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Milliseconds per unit.
    pub fn factor(&self) -> i64 {
        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }

    /// The suffix as written in source.
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "days",
        }
    }

    /// Parse a lexed suffix.
    pub fn from_suffix(s: &str) -> Option<TimeUnit> {
        Some(match s {
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "days" => TimeUnit::Days,
            _ => return None,
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

/// A type reference: a primitive-type keyword or a bare identifier,
/// optionally with generic arguments (`vec<u64>`, `map<string, u64>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
    pub span: Span,
}

impl TypeRef {
    pub fn simple(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_op_names() {
        assert_eq!(ConsensusOp::Propose.as_str(), "PROPOSE");
        assert_eq!(ConsensusOp::Vote.as_str(), "VOTE");
        assert_eq!(ConsensusOp::Merge.as_str(), "MERGE");
        assert_eq!(ConsensusOp::Query.as_str(), "QUERY");
    }

    #[test]
    fn test_time_unit_factors() {
        assert_eq!(TimeUnit::Milliseconds.factor(), 1);
        assert_eq!(TimeUnit::Seconds.factor(), 1_000);
        assert_eq!(TimeUnit::Minutes.factor(), 60_000);
        assert_eq!(TimeUnit::Hours.factor(), 3_600_000);
        assert_eq!(TimeUnit::Days.factor(), 86_400_000);
    }

    #[test]
    fn test_time_unit_suffix_roundtrip() {
        for unit in [
            TimeUnit::Milliseconds,
            TimeUnit::Seconds,
            TimeUnit::Minutes,
            TimeUnit::Hours,
            TimeUnit::Days,
        ] {
            assert_eq!(TimeUnit::from_suffix(unit.suffix()), Some(unit));
        }
        assert_eq!(TimeUnit::from_suffix("min"), None);
        assert_eq!(TimeUnit::from_suffix(""), None);
    }

    #[test]
    fn test_ast_json_roundtrip() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::new(ExprKind::Int(1), Span::point(1, 1))),
                rhs: Box::new(Expr::new(ExprKind::Int(2), Span::point(1, 5))),
            },
            Span::new(1, 1, 1, 5),
        );
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}

//! Integration tests for the OMNIX parser.

use omnix_lexer::tokenize;
use omnix_parser::{parse, ParseOptions, Parser};
use omnix_types::ast::*;
use omnix_types::SyntaxError;

fn parse_src(source: &str) -> Program {
    parse(tokenize(source).unwrap()).unwrap()
}

fn parse_err(source: &str) -> SyntaxError {
    parse(tokenize(source).unwrap()).unwrap_err()
}

/// The single statement of a one-item program.
fn only_stmt(program: &Program) -> &Stmt {
    assert_eq!(program.items.len(), 1, "expected exactly one item");
    match &program.items[0] {
        Item::Stmt(stmt) => stmt,
        other => panic!("expected statement, got {other:?}"),
    }
}

/// The single declaration of a one-item program.
fn only_decl(program: &Program) -> &Decl {
    assert_eq!(program.items.len(), 1, "expected exactly one item");
    match &program.items[0] {
        Item::Decl(decl) => decl,
        other => panic!("expected declaration, got {other:?}"),
    }
}

fn expr_of(stmt: &Stmt) -> &Expr {
    match stmt {
        Stmt::Expr(e) => &e.expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_let_statement() {
    let program = parse_src("let x = 1;");
    match only_stmt(&program) {
        Stmt::Let(l) => {
            assert_eq!(l.name.name, "x");
            assert!(l.ty.is_none());
            assert_eq!(l.value.kind, ExprKind::Int(1));
        }
        other => panic!("expected let, got {other:?}"),
    }
}

#[test]
fn test_let_with_type_annotation() {
    let program = parse_src("let n: u64 = 5;");
    match only_stmt(&program) {
        Stmt::Let(l) => {
            let ty = l.ty.as_ref().unwrap();
            assert_eq!(ty.name, "u64");
            assert!(ty.args.is_empty());
        }
        other => panic!("expected let, got {other:?}"),
    }
}

#[test]
fn test_assignment_statement() {
    let program = parse_src("x = x + 1;");
    match only_stmt(&program) {
        Stmt::Assign(a) => {
            assert_eq!(a.target.kind, ExprKind::Identifier("x".into()));
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn test_member_assignment_target() {
    let program = parse_src("order.total = 5;");
    match only_stmt(&program) {
        Stmt::Assign(a) => {
            assert!(matches!(a.target.kind, ExprKind::Member { .. }));
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn test_call_is_not_assignable() {
    let err = parse_err("f() = 1;");
    assert!(err.expected.contains("assignable"));
}

#[test]
fn test_if_else_if_else_chain() {
    let program = parse_src("if a { } else if b { } else { }");
    match only_stmt(&program) {
        Stmt::If(i) => {
            let elseif = match i.else_branch.as_ref().unwrap() {
                ElseBranch::ElseIf(inner) => inner,
                other => panic!("expected else-if, got {other:?}"),
            };
            assert!(matches!(
                elseif.else_branch,
                Some(ElseBranch::Block(_))
            ));
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn test_when_has_no_else() {
    let program = parse_src("when ready { broadcast(1); }");
    assert!(matches!(only_stmt(&program), Stmt::When(_)));
    // `else` after `when` is not part of the grammar.
    assert!(parse(tokenize("when a { } else { }").unwrap()).is_err());
}

#[test]
fn test_phase_for_while_broadcast() {
    let program = parse_src(
        "phase prepare { let a = 1; } for x in xs { } while running { } broadcast(42);",
    );
    assert_eq!(program.items.len(), 4);
    assert!(matches!(program.items[0], Item::Stmt(Stmt::Phase(_))));
    assert!(matches!(program.items[1], Item::Stmt(Stmt::For(_))));
    assert!(matches!(program.items[2], Item::Stmt(Stmt::While(_))));
    assert!(matches!(program.items[3], Item::Stmt(Stmt::Broadcast(_))));
}

#[test]
fn test_return_with_and_without_value() {
    let program = parse_src("function f() { return; } function g() { return 1; }");
    assert_eq!(program.items.len(), 2);
}

#[test]
fn test_missing_semicolon_is_syntax_error() {
    let err = parse_err("let x = 1");
    assert_eq!(err.expected, "';'");
    assert_eq!(err.line, 1);
}

// ─────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_arithmetic_precedence() {
    let program = parse_src("1 + 2 * 3;");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::Binary { op, rhs, .. } => {
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(
                rhs.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn test_logical_precedence() {
    let program = parse_src("a || b && c == d;");
    let expr = expr_of(only_stmt(&program));
    // `||` is the loosest binder.
    assert!(matches!(
        expr.kind,
        ExprKind::Binary {
            op: BinaryOp::Or,
            ..
        }
    ));
}

#[test]
fn test_unary_and_postfix_chain() {
    let program = parse_src("!nodes[0].running;");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::Unary { op, operand } => {
            assert_eq!(*op, UnaryOp::Not);
            assert!(matches!(operand.kind, ExprKind::Member { .. }));
        }
        other => panic!("expected unary, got {other:?}"),
    }
}

#[test]
fn test_call_member_index_chaining() {
    let program = parse_src("registry.lookup(\"a\")[0].id;");
    let expr = expr_of(only_stmt(&program));
    assert!(matches!(expr.kind, ExprKind::Member { .. }));
}

#[test]
fn test_static_access() {
    let program = parse_src("Registry::default;");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::StaticAccess { target, member } => {
            assert_eq!(target.name, "Registry");
            assert_eq!(member.name, "default");
        }
        other => panic!("expected static access, got {other:?}"),
    }
}

#[test]
fn test_array_and_object_literals() {
    let program = parse_src("let a = [1, 2, 3]; let o = { id: 1, tags: [\"x\"] };");
    assert_eq!(program.items.len(), 2);
    match only_two(&program) {
        (Stmt::Let(a), Stmt::Let(o)) => {
            assert!(matches!(&a.value.kind, ExprKind::Array(items) if items.len() == 3));
            assert!(matches!(&o.value.kind, ExprKind::Object(props) if props.len() == 2));
        }
        other => panic!("expected two lets, got {other:?}"),
    }
}

fn only_two(program: &Program) -> (&Stmt, &Stmt) {
    match (&program.items[0], &program.items[1]) {
        (Item::Stmt(a), Item::Stmt(b)) => (a, b),
        other => panic!("expected two statements, got {other:?}"),
    }
}

#[test]
fn test_duration_and_algorithm_literals() {
    let program = parse_src("let t = 5s; let a = Consensus::PBFT;");
    match only_two(&program) {
        (Stmt::Let(t), Stmt::Let(a)) => {
            assert!(matches!(t.value.kind, ExprKind::Duration { value: 5, .. }));
            assert_eq!(a.value.kind, ExprKind::Algorithm("Consensus::PBFT".into()));
        }
        other => panic!("expected two lets, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Consensus expressions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_consensus_with_options_block() {
    let program = parse_src("value <!> { validators: 3, timeout: 5s };");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::Consensus(c) => {
            assert_eq!(c.op, ConsensusOp::Propose);
            assert!(c.operand.is_none());
            assert_eq!(c.options.len(), 2);
            assert_eq!(c.options[0].key.name, "validators");
            assert_eq!(c.options[1].key.name, "timeout");
        }
        other => panic!("expected consensus, got {other:?}"),
    }
}

#[test]
fn test_consensus_binds_over_entire_expression() {
    // `a + b <!> { ... }` proposes `a + b`, not just `b`.
    let program = parse_src("a + b <!> { validators: 3 };");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::Consensus(c) => {
            assert!(matches!(
                c.target.kind,
                ExprKind::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            ));
        }
        other => panic!("expected consensus, got {other:?}"),
    }
}

#[test]
fn test_merge_with_operand() {
    let program = parse_src("counter <#> counter + 1;");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::Consensus(c) => {
            assert_eq!(c.op, ConsensusOp::Merge);
            assert_eq!(c.target.kind, ExprKind::Identifier("counter".into()));
            let operand = c.operand.as_ref().unwrap();
            assert!(matches!(
                operand.kind,
                ExprKind::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            ));
            assert!(c.options.is_empty());
        }
        other => panic!("expected consensus, got {other:?}"),
    }
}

#[test]
fn test_bare_consensus_suffix() {
    let program = parse_src("votes <@>;");
    let expr = expr_of(only_stmt(&program));
    match &expr.kind {
        ExprKind::Consensus(c) => {
            assert_eq!(c.op, ConsensusOp::Query);
            assert!(c.operand.is_none());
            assert!(c.options.is_empty());
        }
        other => panic!("expected consensus, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_function_declaration() {
    let program = parse_src("function add(a: u64, b: u64) -> u64 { return a + b; }");
    match only_decl(&program) {
        Decl::Function(f) => {
            assert_eq!(f.name.name, "add");
            assert_eq!(f.params.len(), 2);
            assert_eq!(f.return_ty.as_ref().unwrap().name, "u64");
        }
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn test_node_declaration() {
    let source = r#"
        node Validator {
            state counter: u64 = 0;
            state peers: vec<string> = [];

            function increment() {
                counter <#> counter + 1;
            }

            on peer_discovered {
                broadcast("hello");
            }
        }
    "#;
    let program = parse_src(source);
    match only_decl(&program) {
        Decl::Node(n) => {
            assert_eq!(n.name.name, "Validator");
            assert_eq!(n.state.len(), 2);
            assert_eq!(n.state[1].ty.name, "vec");
            assert_eq!(n.state[1].ty.args[0].name, "string");
            assert_eq!(n.methods.len(), 1);
            assert_eq!(n.handlers.len(), 1);
            assert_eq!(n.handlers[0].event.name, "peer_discovered");
        }
        other => panic!("expected node, got {other:?}"),
    }
}

#[test]
fn test_cluster_declaration() {
    let source = r#"
        consensus cluster OrderBook {
            replicas: 5,
            consensus: Consensus::PBFT,
            zones: ["us-east", "eu-west"],

            state orders: map<string, u64> = {};

            service place_order(order: string) -> bool {
                return true;
            }
        }
    "#;
    let program = parse_src(source);
    match only_decl(&program) {
        Decl::Cluster(c) => {
            assert_eq!(c.name.name, "OrderBook");
            assert_eq!(c.properties.len(), 3);
            // `consensus` is a keyword, still valid as a property key.
            assert_eq!(c.properties[1].key.name, "consensus");
            assert_eq!(c.state.len(), 1);
            assert_eq!(c.methods.len(), 1);
            assert_eq!(c.methods[0].name.name, "place_order");
        }
        other => panic!("expected cluster, got {other:?}"),
    }
}

#[test]
fn test_pipeline_declaration_preserves_stage_order() {
    let source = r#"
        pipeline Ingest {
            input: "stream",
            stage clean { parallel: true, workers: 4 }
            stage enrich { gpu_workers: 2 }
            stage store { }
        }
    "#;
    let program = parse_src(source);
    match only_decl(&program) {
        Decl::Pipeline(p) => {
            assert_eq!(p.name.name, "Ingest");
            assert_eq!(p.properties.len(), 1);
            let names: Vec<&str> = p.stages.iter().map(|s| s.name.name.as_str()).collect();
            assert_eq!(names, vec!["clean", "enrich", "store"]);
            assert_eq!(p.stages[0].properties.len(), 2);
        }
        other => panic!("expected pipeline, got {other:?}"),
    }
}

#[test]
fn test_cross_chain_contract() {
    let source = r#"
        @cross_chain(ethereum, polygon)
        contract TokenBridge {
            state locked: u64 = 0;
            function transfer(amount: u64) {
                lock_tokens(amount);
            }
        }
    "#;
    let program = parse_src(source);
    match only_decl(&program) {
        Decl::Contract(c) => {
            assert_eq!(c.name.name, "TokenBridge");
            let chains: Vec<&str> = c.chains.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(chains, vec!["ethereum", "polygon"]);
            assert_eq!(c.annotations.len(), 1);
            assert_eq!(c.annotations[0].name.name, "cross_chain");
        }
        other => panic!("expected contract, got {other:?}"),
    }
}

#[test]
fn test_contract_without_annotation_defaults_to_local() {
    let program = parse_src("contract Escrow { function hold() { return 1; } }");
    match only_decl(&program) {
        Decl::Contract(c) => {
            let chains: Vec<&str> = c.chains.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(chains, vec!["local"]);
        }
        other => panic!("expected contract, got {other:?}"),
    }
}

#[test]
fn test_import_and_export() {
    let program = parse_src("import analytics.metrics; export function f() { return 1; }");
    assert_eq!(program.items.len(), 2);
    match &program.items[0] {
        Item::Decl(Decl::Import(i)) => assert_eq!(i.path, "analytics.metrics"),
        other => panic!("expected import, got {other:?}"),
    }
    match &program.items[1] {
        Item::Decl(Decl::Export(e)) => {
            assert!(matches!(e.inner.as_ref(), Decl::Function(_)));
        }
        other => panic!("expected export, got {other:?}"),
    }
}

#[test]
fn test_annotation_with_named_args() {
    let program = parse_src("@retry(attempts: 3, backoff: 2s) function flaky() { return 1; }");
    match only_decl(&program) {
        Decl::Function(f) => {
            assert_eq!(f.annotations.len(), 1);
            let annotation = &f.annotations[0];
            assert_eq!(annotation.name.name, "retry");
            assert_eq!(annotation.args.len(), 2);
            assert_eq!(annotation.args[0].name.as_ref().unwrap().name, "attempts");
        }
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn test_annotation_must_precede_declaration() {
    let err = parse_err("@tag let x = 1;");
    assert!(err.expected.contains("declaration"));
}

// ─────────────────────────────────────────────────────────────────────
// Strict vs lenient declaration bodies
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_member_is_error_in_strict_mode() {
    let source = "consensus cluster C { replicas: 3, ] }";
    let err = parse_err(source);
    assert!(err.expected.contains("cluster member"));
}

#[test]
fn test_unknown_member_skipped_in_lenient_mode() {
    let source = "consensus cluster C { replicas: 3, ] state n: u64 = 0; }";
    let tokens = tokenize(source).unwrap();
    let program = Parser::with_options(
        tokens,
        ParseOptions {
            lenient_declarations: true,
        },
    )
    .parse()
    .unwrap();
    match only_decl(&program) {
        Decl::Cluster(c) => {
            assert_eq!(c.properties.len(), 1);
            assert_eq!(c.state.len(), 1);
        }
        other => panic!("expected cluster, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Error reporting
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_syntax_error_carries_expected_actual_line() {
    let err = parse_err("node {\n}");
    assert_eq!(err.expected, "identifier");
    assert_eq!(err.actual, "'{'");
    assert_eq!(err.line, 1);
}

#[test]
fn test_error_line_tracks_source_position() {
    let err = parse_err("let a = 1;\nlet b = ;\n");
    assert_eq!(err.line, 2);
    assert_eq!(err.expected, "expression");
}

#[test]
fn test_consensus_without_cluster_keyword_fails() {
    // Top-level `consensus` must be followed by `cluster`; on its own it
    // is not an expression either.
    assert!(parse(tokenize("consensus Foo { }").unwrap()).is_err());
}

#[test]
fn test_ast_serializes_to_json() {
    let program = parse_src("let x = 1;");
    let json = serde_json::to_string(&program).unwrap();
    assert!(json.contains("\"Let\""));
    let back: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(back, program);
}

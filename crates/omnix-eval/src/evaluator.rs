//! The OMNIX tree-walking evaluator.
//!
//! One `Evaluator` owns everything observable about a run: the lexical
//! scope tree, the ordered `[Category] message` event log, the captured
//! `print` output, the consensus log, and the node/cluster registries.
//! Nothing is process-global, so independent evaluators never interfere.
//!
//! Consensus, broadcast, and cross-chain activity are simulated: they
//! execute deterministically, always succeed, and leave a log trail.

use crate::builtins;
use crate::env::Environment;
use crate::error::{EvalResult, OmnixError, RuntimeError};
use crate::value::{
    Callable, ClusterValue, ConsensusResult, ContractValue, FunctionValue, NodeBuiltin,
    NodeInstance, NodeTemplate, PipelineValue, StageValue, Value,
};
use omnix_types::ast::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One entry in the evaluator-owned consensus log.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusRecord {
    /// `PROPOSE`, `VOTE`, `MERGE`, or `QUERY`.
    pub operation: String,
    /// The operation's value, serialized.
    pub value: serde_json::Value,
    /// The evaluated options bag (recorded, never consulted).
    pub options: serde_json::Value,
    /// Wall-clock milliseconds.
    pub timestamp: u64,
}

/// Evaluator configuration.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    /// Total statement/expression budget; guards runaway loops.
    pub step_limit: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            step_limit: 1_000_000,
        }
    }
}

/// The OMNIX evaluator.
pub struct Evaluator {
    /// Root scope; the prelude natives live here.
    globals: Environment,
    /// Ordered `[Category] message` event lines.
    events: Vec<String>,
    /// Captured `print` output.
    printed: Vec<String>,
    /// Append-only consensus log.
    consensus_log: Vec<ConsensusRecord>,
    /// Live node instances by id.
    nodes: BTreeMap<String, Rc<NodeInstance>>,
    /// Declared clusters by name.
    clusters: BTreeMap<String, Rc<ClusterValue>>,
    next_node_id: u64,
    address_nonce: u64,
    steps: u64,
    options: EvalOptions,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Create an evaluator with default options.
    pub fn new() -> Self {
        Self::with_options(EvalOptions::default())
    }

    /// Create an evaluator with explicit options.
    pub fn with_options(options: EvalOptions) -> Self {
        let globals = Environment::new();
        builtins::install(&globals);
        Self {
            globals,
            events: Vec::new(),
            printed: Vec::new(),
            consensus_log: Vec::new(),
            nodes: BTreeMap::new(),
            clusters: BTreeMap::new(),
            next_node_id: 0,
            address_nonce: 0,
            steps: 0,
            options,
        }
    }

    // ── Observability ─────────────────────────────────────────────────────────

    /// Ordered `[Category] message` event lines.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Captured `print` output.
    pub fn printed(&self) -> &[String] {
        &self.printed
    }

    /// The consensus log.
    pub fn consensus_log(&self) -> &[ConsensusRecord] {
        &self.consensus_log
    }

    /// Ids of all node instances created so far, in creation order.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Names of all declared clusters.
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }

    pub(crate) fn capture_print(&mut self, line: String) {
        self.printed.push(line);
    }

    fn emit(&mut self, category: &str, message: String) {
        self.events.push(format!("[{category}] {message}"));
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.options.step_limit {
            Err(RuntimeError::StepLimitExceeded)
        } else {
            Ok(())
        }
    }

    // ── Entry points ──────────────────────────────────────────────────────────

    /// Lex, parse, and evaluate a source string.
    pub fn eval_source(&mut self, source: &str) -> Result<Value, OmnixError> {
        let tokens = omnix_lexer::tokenize(source).map_err(OmnixError::Lexical)?;
        let program = omnix_parser::parse(tokens).map_err(OmnixError::Syntax)?;
        self.eval_program(&program).map_err(OmnixError::Runtime)
    }

    /// Evaluate an already-parsed program against this evaluator's
    /// global scope. A top-level `return` short-circuits the rest.
    pub fn eval_program(&mut self, program: &Program) -> EvalResult<Value> {
        let globals = self.globals.clone();
        let mut last = Value::Null;
        for item in &program.items {
            match item {
                Item::Decl(decl) => self.eval_decl(decl, &globals)?,
                Item::Stmt(stmt) => match self.eval_stmt(stmt, &globals) {
                    Ok(value) => last = value,
                    Err(RuntimeError::Return(value)) => return Ok(value),
                    Err(err) => return Err(err),
                },
            }
        }
        Ok(last)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Declarations
    // ══════════════════════════════════════════════════════════════════════

    fn eval_decl(&mut self, decl: &Decl, env: &Environment) -> EvalResult<()> {
        match decl {
            Decl::Function(f) => {
                self.eval_function_decl(f, env);
                Ok(())
            }
            Decl::Node(n) => self.eval_node_decl(n, env),
            Decl::Cluster(c) => self.eval_cluster_decl(c, env),
            Decl::Pipeline(p) => self.eval_pipeline_decl(p, env),
            Decl::Contract(c) => self.eval_contract_decl(c, env),
            Decl::Import(i) => {
                self.emit("Module", format!("Importing {}", i.path));
                Ok(())
            }
            Decl::Export(e) => self.eval_decl(&e.inner, env),
        }
    }

    /// Register a function both as a named entry and a first-class value.
    fn eval_function_decl(&mut self, decl: &FunctionDecl, env: &Environment) {
        let function = FunctionValue {
            decl: Rc::new(decl.clone()),
            env: env.clone(),
            receiver: None,
        };
        env.define_function(&decl.name.name, Callable::Function(Rc::new(function)));
    }

    /// Evaluate state initializers once and bind a constructor value.
    fn eval_node_decl(&mut self, decl: &NodeDecl, env: &Environment) -> EvalResult<()> {
        let decl_env = env.child();

        let mut initial_state = Vec::new();
        for field in &decl.state {
            let value = match &field.init {
                Some(expr) => self.eval_expr(expr, &decl_env)?,
                None => Value::Null,
            };
            decl_env.define_state(&field.name.name, value.clone());
            initial_state.push((field.name.name.clone(), value));
        }
        // Config properties (ports, discovery, ...) become declaration
        // state so methods can read them.
        for prop in &decl.properties {
            let value = self.eval_expr(&prop.value, &decl_env)?;
            decl_env.define_state(&prop.key.name, value.clone());
            initial_state.push((prop.key.name.clone(), value));
        }

        let methods: BTreeMap<String, Rc<FunctionDecl>> = decl
            .methods
            .iter()
            .map(|m| (m.name.name.clone(), Rc::new(m.clone())))
            .collect();

        let template = Rc::new(NodeTemplate {
            name: decl.name.name.clone(),
            initial_state,
            methods,
            env: decl_env,
        });
        env.define(&decl.name.name, Value::Constructor(template));
        Ok(())
    }

    /// `new()`: allocate an instance with a fresh id, copy the initial
    /// state, and bind every method over the instance scope.
    fn instantiate_node(&mut self, template: &Rc<NodeTemplate>) -> Value {
        self.next_node_id += 1;
        let id = format!("node_{}", self.next_node_id);

        let state = template.env.child();
        for (name, value) in &template.initial_state {
            state.define_state(name, value.clone());
        }

        let instance = Rc::new(NodeInstance {
            id: id.clone(),
            running: Cell::new(false),
            cluster: RefCell::new(None),
            state: state.clone(),
            template: template.clone(),
        });

        for (name, method) in &template.methods {
            state.define_function(
                name,
                Callable::Function(Rc::new(FunctionValue {
                    decl: method.clone(),
                    env: state.clone(),
                    receiver: Some(instance.clone()),
                })),
            );
        }

        self.nodes.insert(id, instance.clone());
        Value::Node(instance)
    }

    /// Evaluate cluster properties once and bind a descriptor.
    fn eval_cluster_decl(&mut self, decl: &ClusterDecl, env: &Environment) -> EvalResult<()> {
        let decl_env = env.child();

        let mut properties = BTreeMap::new();
        for prop in &decl.properties {
            let value = self.eval_expr(&prop.value, &decl_env)?;
            properties.insert(prop.key.name.clone(), value);
        }
        for field in &decl.state {
            let value = match &field.init {
                Some(expr) => self.eval_expr(expr, &decl_env)?,
                None => Value::Null,
            };
            decl_env.define_state(&field.name.name, value);
        }

        let mut methods = BTreeMap::new();
        for method in &decl.methods {
            let rc = Rc::new(method.clone());
            methods.insert(method.name.name.clone(), rc.clone());
            decl_env.define_function(
                &method.name.name,
                Callable::Function(Rc::new(FunctionValue {
                    decl: rc,
                    env: decl_env.clone(),
                    receiver: None,
                })),
            );
        }

        let cluster = Rc::new(ClusterValue {
            name: decl.name.name.clone(),
            properties,
            methods,
            env: decl_env,
        });
        env.define(&decl.name.name, Value::Cluster(cluster.clone()));
        self.clusters
            .insert(decl.name.name.clone(), cluster.clone());

        let mut line = format!("Cluster {} configured", cluster.name);
        let mut details = Vec::new();
        if let Some(replicas) = cluster.properties.get("replicas") {
            details.push(format!("replicas: {replicas}"));
        }
        if let Some(algorithm) = cluster.properties.get("consensus") {
            details.push(format!("consensus: {algorithm}"));
        }
        if !details.is_empty() {
            line = format!("{line} ({})", details.join(", "));
        }
        self.emit("Cluster", line);
        Ok(())
    }

    /// Evaluate stage property bags and bind a descriptor.
    fn eval_pipeline_decl(&mut self, decl: &PipelineDecl, env: &Environment) -> EvalResult<()> {
        let mut properties = BTreeMap::new();
        for prop in &decl.properties {
            let value = self.eval_expr(&prop.value, env)?;
            properties.insert(prop.key.name.clone(), value);
        }

        let mut stages = Vec::new();
        for stage in &decl.stages {
            let mut stage_props = BTreeMap::new();
            for prop in &stage.properties {
                let value = self.eval_expr(&prop.value, env)?;
                stage_props.insert(prop.key.name.clone(), value);
            }
            stages.push(StageValue {
                name: stage.name.name.clone(),
                properties: stage_props,
            });
        }

        let pipeline = Rc::new(PipelineValue {
            name: decl.name.name.clone(),
            properties,
            stages,
        });
        self.emit(
            "Pipeline",
            format!(
                "Pipeline {} declared with {} stages",
                pipeline.name,
                pipeline.stages.len()
            ),
        );
        env.define(&decl.name.name, Value::Pipeline(pipeline));
        Ok(())
    }

    /// Bind a contract descriptor over its fixed chain list.
    fn eval_contract_decl(&mut self, decl: &ContractDecl, env: &Environment) -> EvalResult<()> {
        let decl_env = env.child();
        builtins::define(&decl_env, "lock_tokens", native_lock_tokens);
        builtins::define(&decl_env, "mint_tokens", native_mint_tokens);
        builtins::define(&decl_env, "emit", native_emit_event);

        for field in &decl.state {
            let value = match &field.init {
                Some(expr) => self.eval_expr(expr, &decl_env)?,
                None => Value::Null,
            };
            decl_env.define_state(&field.name.name, value);
        }

        let methods: BTreeMap<String, Rc<FunctionDecl>> = decl
            .methods
            .iter()
            .map(|m| (m.name.name.clone(), Rc::new(m.clone())))
            .collect();

        let contract = Rc::new(ContractValue {
            name: decl.name.name.clone(),
            chains: decl.chains.iter().map(|c| c.name.clone()).collect(),
            methods,
            env: decl_env,
        });
        // Sibling methods resolve to the fan-out callable as well.
        for name in contract.methods.keys() {
            contract.env.define_function(
                name,
                Callable::ContractMethod {
                    contract: contract.clone(),
                    method: name.clone(),
                },
            );
        }
        self.emit(
            "Contract",
            format!(
                "Contract {} registered on {}",
                contract.name,
                contract.chains.join(", ")
            ),
        );
        env.define(&decl.name.name, Value::Contract(contract));
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    /// Execute a block in a fresh child scope; yields the last evaluated
    /// statement value (the implicit return).
    fn eval_block(&mut self, block: &Block, env: &Environment) -> EvalResult<Value> {
        let scope = env.child();
        let mut last = Value::Null;
        for stmt in &block.stmts {
            last = self.eval_stmt(stmt, &scope)?;
        }
        Ok(last)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: &Environment) -> EvalResult<Value> {
        self.tick()?;
        match stmt {
            Stmt::Let(let_stmt) => {
                let value = self.eval_expr(&let_stmt.value, env)?;
                env.define(&let_stmt.name.name, value);
                Ok(Value::Null)
            }
            Stmt::Assign(assign) => {
                let value = self.eval_expr(&assign.value, env)?;
                self.assign_place(&assign.target, value, env)?;
                Ok(Value::Null)
            }
            Stmt::Return(ret) => {
                let value = match &ret.value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                Err(RuntimeError::Return(value))
            }
            Stmt::If(if_stmt) => self.eval_if(if_stmt, env),
            Stmt::When(when) => {
                if self.eval_expr(&when.condition, env)?.is_truthy() {
                    self.eval_block(&when.body, env)
                } else {
                    Ok(Value::Null)
                }
            }
            Stmt::Phase(phase) => {
                self.emit("Phase", format!("Entering phase {}", phase.name.name));
                self.eval_block(&phase.body, env)
            }
            Stmt::Broadcast(broadcast) => {
                let value = self.eval_expr(&broadcast.message, env)?;
                self.emit("Broadcast", format!("Broadcasting {}", value.to_json()));
                Ok(Value::Null)
            }
            Stmt::For(for_stmt) => self.eval_for(for_stmt, env),
            Stmt::While(while_stmt) => {
                while self.eval_expr(&while_stmt.condition, env)?.is_truthy() {
                    self.eval_block(&while_stmt.body, env)?;
                }
                Ok(Value::Null)
            }
            Stmt::Expr(expr_stmt) => self.eval_expr(&expr_stmt.expr, env),
        }
    }

    fn eval_if(&mut self, if_stmt: &IfStmt, env: &Environment) -> EvalResult<Value> {
        if self.eval_expr(&if_stmt.condition, env)?.is_truthy() {
            self.eval_block(&if_stmt.then_block, env)
        } else {
            match &if_stmt.else_branch {
                Some(ElseBranch::ElseIf(inner)) => self.eval_if(inner, env),
                Some(ElseBranch::Block(block)) => self.eval_block(block, env),
                None => Ok(Value::Null),
            }
        }
    }

    fn eval_for(&mut self, for_stmt: &ForStmt, env: &Environment) -> EvalResult<Value> {
        let iterable = self.eval_expr(&for_stmt.iterable, env)?;
        let items = match iterable {
            Value::Sequence(items) => items,
            other => {
                return Err(RuntimeError::TypeMismatch(format!(
                    "for loop requires a sequence, got {}",
                    other.type_name()
                )));
            }
        };

        let loop_env = env.child();
        let mut last = Value::Null;
        for item in items {
            self.tick()?;
            loop_env.define(&for_stmt.item.name, item);
            last = self.eval_block(&for_stmt.body, &loop_env)?;
        }
        Ok(last)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> EvalResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Number(*n as f64)),
            ExprKind::Float(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Duration { value, unit } => {
                Ok(Value::Number((value * unit.factor()) as f64))
            }
            ExprKind::Algorithm(name) => {
                let bare = name.strip_prefix("Consensus::").unwrap_or(name.as_str());
                if omnix_lexer::ALGORITHMS.contains(&bare) {
                    Ok(Value::Str(name.clone()))
                } else {
                    Err(RuntimeError::UnknownAlgorithm(name.clone()))
                }
            }
            ExprKind::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval_expr(element, env)?);
                }
                Ok(Value::Sequence(items))
            }
            ExprKind::Object(entries) => {
                let mut fields = BTreeMap::new();
                for entry in entries {
                    let value = self.eval_expr(&entry.value, env)?;
                    fields.insert(entry.key.name.clone(), value);
                }
                Ok(Value::Record(fields))
            }
            ExprKind::Identifier(name) => env
                .get(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),
            ExprKind::StaticAccess { target, member } => self.eval_static_access(target, member, env),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, env),
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-value.as_number("negation")?)),
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            ExprKind::Consensus(consensus) => self.eval_consensus(consensus, env),
            ExprKind::Call { callee, args } => {
                let callee_value = self.eval_expr(callee, env)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, env)?);
                }
                match callee_value {
                    Value::Callable(callable) => self.call_value(&callable, arg_values),
                    other => Err(RuntimeError::NotCallable(callee_label(callee, &other))),
                }
            }
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, env)?;
                self.member_value(&object, &property.name)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                self.index_value(&object, &index)
            }
        }
    }

    fn eval_static_access(
        &mut self,
        target: &Ident,
        member: &Ident,
        env: &Environment,
    ) -> EvalResult<Value> {
        let unknown = || RuntimeError::UnknownStaticMethod {
            target: target.name.clone(),
            member: member.name.clone(),
        };
        let value = env.get(&target.name).ok_or_else(unknown)?;
        match value {
            Value::Cluster(_) | Value::Contract(_) | Value::Pipeline(_) | Value::Constructor(_) => {
                self.member_value(&value, &member.name).map_err(|_| unknown())
            }
            _ => Err(unknown()),
        }
    }

    // ── Operators ─────────────────────────────────────────────────────────────

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        env: &Environment,
    ) -> EvalResult<Value> {
        // Short-circuit logical operators.
        if op == BinaryOp::And {
            let left = self.eval_expr(lhs, env)?;
            if !left.is_truthy() {
                return Ok(Value::Bool(false));
            }
            let right = self.eval_expr(rhs, env)?;
            return Ok(Value::Bool(right.is_truthy()));
        }
        if op == BinaryOp::Or {
            let left = self.eval_expr(lhs, env)?;
            if left.is_truthy() {
                return Ok(Value::Bool(true));
            }
            let right = self.eval_expr(rhs, env)?;
            return Ok(Value::Bool(right.is_truthy()));
        }

        let left = self.eval_expr(lhs, env)?;
        let right = self.eval_expr(rhs, env)?;

        match op {
            BinaryOp::Add => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{left}{right}")))
                }
                _ => Err(RuntimeError::TypeMismatch(format!(
                    "cannot add {} and {}",
                    left.type_name(),
                    right.type_name()
                ))),
            },
            BinaryOp::Sub => self.numeric(op, &left, &right, |a, b| a - b),
            BinaryOp::Mul => self.numeric(op, &left, &right, |a, b| a * b),
            BinaryOp::Div => {
                let b = right.as_number("'/'")?;
                if b == 0.0 {
                    return Err(RuntimeError::Arithmetic("division by zero".into()));
                }
                Ok(Value::Number(left.as_number("'/'")? / b))
            }
            BinaryOp::Mod => {
                let b = right.as_number("'%'")?;
                if b == 0.0 {
                    return Err(RuntimeError::Arithmetic("modulo by zero".into()));
                }
                Ok(Value::Number(left.as_number("'%'")? % b))
            }
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::NotEq => Ok(Value::Bool(left != right)),
            BinaryOp::Greater => self.compare(op, &left, &right),
            BinaryOp::GreaterEq => self.compare(op, &left, &right),
            BinaryOp::Less => self.compare(op, &left, &right),
            BinaryOp::LessEq => self.compare(op, &left, &right),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn numeric(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
        apply: fn(f64, f64) -> f64,
    ) -> EvalResult<Value> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(apply(*a, *b))),
            _ => Err(RuntimeError::TypeMismatch(format!(
                "cannot apply '{}' to {} and {}",
                op.as_str(),
                left.type_name(),
                right.type_name()
            ))),
        }
    }

    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        let ordering = match (left, right) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => {
                return Err(RuntimeError::TypeMismatch(format!(
                    "cannot compare {} and {}",
                    left.type_name(),
                    right.type_name()
                )));
            }
        };
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(false));
        };
        let result = match op {
            BinaryOp::Greater => ordering.is_gt(),
            BinaryOp::GreaterEq => ordering.is_ge(),
            BinaryOp::Less => ordering.is_lt(),
            BinaryOp::LessEq => ordering.is_le(),
            _ => unreachable!("compare called with non-comparison operator"),
        };
        Ok(Value::Bool(result))
    }

    // ── Consensus ─────────────────────────────────────────────────────────────

    /// Evaluate a consensus expression: log, record, and succeed
    /// unconditionally. A merge with an operand writes the evaluated
    /// value back into its target place.
    fn eval_consensus(&mut self, consensus: &ConsensusExpr, env: &Environment) -> EvalResult<Value> {
        let value = match &consensus.operand {
            Some(operand) => self.eval_expr(operand, env)?,
            None => self.eval_expr(&consensus.target, env)?,
        };

        let mut options = BTreeMap::new();
        for option in &consensus.options {
            let evaluated = self.eval_expr(&option.value, env)?;
            options.insert(option.key.name.clone(), evaluated);
        }

        let value_json = value.to_json();
        let options_json = serde_json::Value::Object(
            options
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        );

        let mut line = format!("{} value={value_json}", consensus.op.as_str());
        if !options.is_empty() {
            line.push_str(&format!(" options={options_json}"));
        }
        self.emit("Consensus", line);
        self.consensus_log.push(ConsensusRecord {
            operation: consensus.op.as_str().to_string(),
            value: value_json,
            options: options_json,
            timestamp: now_millis(),
        });

        if consensus.op == ConsensusOp::Merge
            && consensus.operand.is_some()
            && is_place(&consensus.target)
        {
            self.assign_place(&consensus.target, value.clone(), env)?;
        }

        Ok(Value::Consensus(ConsensusResult {
            value: Box::new(value),
            accepted: true,
        }))
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    pub(crate) fn call_value(&mut self, callable: &Callable, args: Vec<Value>) -> EvalResult<Value> {
        self.tick()?;
        match callable {
            Callable::Function(function) => {
                let call_env = function.env.child();
                if let Some(receiver) = &function.receiver {
                    call_env.define("self", Value::Node(receiver.clone()));
                }
                for (i, param) in function.decl.params.iter().enumerate() {
                    // Unmatched parameters are null; extra arguments are
                    // ignored.
                    call_env.define(
                        &param.name.name,
                        args.get(i).cloned().unwrap_or(Value::Null),
                    );
                }
                match self.eval_block(&function.decl.body, &call_env) {
                    Ok(value) => Ok(value),
                    Err(RuntimeError::Return(value)) => Ok(value),
                    Err(err) => Err(err),
                }
            }
            Callable::Native(native) => (native.func)(self, args),
            Callable::Constructor(template) => {
                let template = template.clone();
                Ok(self.instantiate_node(&template))
            }
            Callable::NodeBuiltin { node, builtin } => {
                let node = node.clone();
                match builtin {
                    NodeBuiltin::Start => {
                        node.running.set(true);
                        self.emit("Node", format!("Node {} Started", node.id));
                        Ok(Value::Bool(true))
                    }
                    NodeBuiltin::JoinCluster => {
                        let name = args
                            .first()
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        *node.cluster.borrow_mut() = Some(name.clone());
                        self.emit(
                            "Node",
                            format!("Node {} Joined cluster: {name}", node.id),
                        );
                        Ok(Value::Bool(true))
                    }
                    // Stand-in for a real synchronization barrier.
                    NodeBuiltin::Synchronized => Ok(Value::Bool(true)),
                }
            }
            Callable::ContractMethod { contract, method } => {
                let contract = contract.clone();
                let method = method.clone();
                self.run_contract_method(&contract, &method, args)
            }
            Callable::PipelineExecute(pipeline) => {
                let pipeline = pipeline.clone();
                let input = args.into_iter().next().unwrap_or(Value::Null);
                self.run_pipeline(&pipeline, input)
            }
        }
    }

    // ── Member & index access ─────────────────────────────────────────────────

    fn member_value(&self, object: &Value, member: &str) -> EvalResult<Value> {
        let invalid = || RuntimeError::InvalidMember {
            target: object.type_name().to_string(),
            member: member.to_string(),
        };

        match object {
            Value::Record(fields) => fields.get(member).cloned().ok_or_else(invalid),
            Value::Sequence(items) => match member {
                "length" => Ok(Value::Number(items.len() as f64)),
                _ => Err(invalid()),
            },
            Value::Str(s) => match member {
                "length" => Ok(Value::Number(s.chars().count() as f64)),
                _ => Err(invalid()),
            },
            Value::Node(node) => match member {
                "id" => Ok(Value::Str(node.id.clone())),
                "running" => Ok(Value::Bool(node.running.get())),
                "cluster" => Ok(node
                    .cluster
                    .borrow()
                    .clone()
                    .map(Value::Str)
                    .unwrap_or(Value::Null)),
                "start" => Ok(node_builtin(node, NodeBuiltin::Start)),
                "join_cluster" => Ok(node_builtin(node, NodeBuiltin::JoinCluster)),
                "synchronized" => Ok(node_builtin(node, NodeBuiltin::Synchronized)),
                _ => node.state.get_local(member).ok_or_else(|| {
                    RuntimeError::InvalidMember {
                        target: format!("node {}", node.id),
                        member: member.to_string(),
                    }
                }),
            },
            Value::Cluster(cluster) => {
                if let Some(value) = cluster.properties.get(member) {
                    return Ok(value.clone());
                }
                cluster.env.get_local(member).ok_or_else(|| {
                    RuntimeError::InvalidMember {
                        target: format!("cluster {}", cluster.name),
                        member: member.to_string(),
                    }
                })
            }
            Value::Pipeline(pipeline) => match member {
                "name" => Ok(Value::Str(pipeline.name.clone())),
                "execute" => Ok(Value::Callable(Callable::PipelineExecute(pipeline.clone()))),
                "stages" => Ok(Value::Sequence(
                    pipeline
                        .stages
                        .iter()
                        .map(|s| Value::Str(s.name.clone()))
                        .collect(),
                )),
                _ => Err(invalid()),
            },
            Value::Contract(contract) => match member {
                "name" => Ok(Value::Str(contract.name.clone())),
                "chains" => Ok(Value::Sequence(
                    contract
                        .chains
                        .iter()
                        .map(|c| Value::Str(c.clone()))
                        .collect(),
                )),
                _ => {
                    if member == "deploy" || contract.methods.contains_key(member) {
                        Ok(Value::Callable(Callable::ContractMethod {
                            contract: contract.clone(),
                            method: member.to_string(),
                        }))
                    } else if let Some(value) = contract.env.get_local(member) {
                        Ok(value)
                    } else {
                        Err(RuntimeError::InvalidMember {
                            target: format!("contract {}", contract.name),
                            member: member.to_string(),
                        })
                    }
                }
            },
            Value::Constructor(template) => match member {
                "new" => Ok(Value::Callable(Callable::Constructor(template.clone()))),
                _ => Err(RuntimeError::InvalidMember {
                    target: format!("node constructor {}", template.name),
                    member: member.to_string(),
                }),
            },
            Value::Consensus(result) => match member {
                "value" => Ok((*result.value).clone()),
                "accepted" => Ok(Value::Bool(result.accepted)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    fn index_value(&self, object: &Value, index: &Value) -> EvalResult<Value> {
        match object {
            Value::Sequence(items) => {
                let i = index.as_number("index")?;
                let i = i as i64;
                if i < 0 || i as usize >= items.len() {
                    Ok(Value::Null)
                } else {
                    Ok(items[i as usize].clone())
                }
            }
            Value::Record(fields) => match index {
                Value::Str(key) => Ok(fields.get(key).cloned().unwrap_or(Value::Null)),
                other => Err(RuntimeError::TypeMismatch(format!(
                    "record index requires a string, got {}",
                    other.type_name()
                ))),
            },
            Value::Str(s) => {
                let i = index.as_number("index")? as i64;
                let ch = if i < 0 {
                    None
                } else {
                    s.chars().nth(i as usize)
                };
                Ok(ch.map(|c| Value::Str(c.to_string())).unwrap_or(Value::Null))
            }
            other => Err(RuntimeError::NotIndexable(other.type_name().to_string())),
        }
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    fn assign_place(&mut self, target: &Expr, value: Value, env: &Environment) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                if env.assign(name, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::UndefinedVariable(name.clone()))
                }
            }
            ExprKind::Member { object, property } => {
                // Node instances have identity: mutate their state
                // directly instead of rebuilding by value.
                let object_value = self.eval_expr(object, env)?;
                if let Value::Node(node) = object_value {
                    if !node.state.assign(&property.name, value.clone()) {
                        node.state.define_state(&property.name, value);
                    }
                    return Ok(());
                }
                self.assign_path(target, value, env)
            }
            ExprKind::Index { .. } => self.assign_path(target, value, env),
            _ => Err(RuntimeError::InvalidAssignment),
        }
    }

    /// `a.b[i].c = v` on by-value data: rebuild the path from the root
    /// variable and store the updated root back.
    fn assign_path(&mut self, target: &Expr, value: Value, env: &Environment) -> EvalResult<()> {
        let mut segments = Vec::new();
        let mut current = target;
        loop {
            match &current.kind {
                ExprKind::Member { object, property } => {
                    segments.push(PathSegment::Field(property.name.clone()));
                    current = object;
                }
                ExprKind::Index { object, index } => {
                    let index = self.eval_expr(index, env)?;
                    segments.push(PathSegment::Index(index));
                    current = object;
                }
                ExprKind::Identifier(name) => {
                    segments.reverse();
                    let root = env
                        .get(name)
                        .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone()))?;
                    let updated = self.set_nested(&root, &segments, value)?;
                    if !env.assign(name, updated) {
                        return Err(RuntimeError::UndefinedVariable(name.clone()));
                    }
                    return Ok(());
                }
                _ => return Err(RuntimeError::InvalidAssignment),
            }
        }
    }

    fn set_nested(
        &self,
        current: &Value,
        path: &[PathSegment],
        value: Value,
    ) -> EvalResult<Value> {
        let Some(segment) = path.first() else {
            return Ok(value);
        };

        match (segment, current) {
            (PathSegment::Field(field), Value::Record(fields)) => {
                let mut updated = fields.clone();
                if path.len() == 1 {
                    updated.insert(field.clone(), value);
                } else {
                    let inner = fields.get(field).ok_or_else(|| RuntimeError::InvalidMember {
                        target: "record".to_string(),
                        member: field.clone(),
                    })?;
                    let rebuilt = self.set_nested(inner, &path[1..], value)?;
                    updated.insert(field.clone(), rebuilt);
                }
                Ok(Value::Record(updated))
            }
            (PathSegment::Field(field), Value::Node(node)) => {
                if path.len() == 1 {
                    if !node.state.assign(field, value.clone()) {
                        node.state.define_state(field, value);
                    }
                } else {
                    let inner =
                        node.state
                            .get_local(field)
                            .ok_or_else(|| RuntimeError::InvalidMember {
                                target: format!("node {}", node.id),
                                member: field.clone(),
                            })?;
                    let rebuilt = self.set_nested(&inner, &path[1..], value)?;
                    node.state.assign(field, rebuilt);
                }
                Ok(current.clone())
            }
            (PathSegment::Index(index), Value::Sequence(items)) => {
                let i = index.as_number("index")? as i64;
                if i < 0 || i as usize >= items.len() {
                    return Err(RuntimeError::Arithmetic(format!(
                        "index {i} out of range for sequence of length {}",
                        items.len()
                    )));
                }
                let mut updated = items.clone();
                let slot = i as usize;
                if path.len() == 1 {
                    updated[slot] = value;
                } else {
                    updated[slot] = self.set_nested(&items[slot], &path[1..], value)?;
                }
                Ok(Value::Sequence(updated))
            }
            (PathSegment::Index(index), Value::Record(fields)) => {
                let Value::Str(key) = index else {
                    return Err(RuntimeError::TypeMismatch(
                        "record index requires a string".to_string(),
                    ));
                };
                let mut updated = fields.clone();
                if path.len() == 1 {
                    updated.insert(key.clone(), value);
                } else {
                    let inner = fields.get(key).ok_or_else(|| RuntimeError::InvalidMember {
                        target: "record".to_string(),
                        member: key.clone(),
                    })?;
                    updated.insert(key.clone(), self.set_nested(inner, &path[1..], value)?);
                }
                Ok(Value::Record(updated))
            }
            (_, other) => Err(RuntimeError::TypeMismatch(format!(
                "cannot assign into {}",
                other.type_name()
            ))),
        }
    }

    // ── Pipelines ─────────────────────────────────────────────────────────────

    /// Run stages strictly in declaration order. `parallel` / `workers` /
    /// `gpu_workers` only change the log text; real dispatch belongs to
    /// an external scheduler.
    fn run_pipeline(&mut self, pipeline: &Rc<PipelineValue>, input: Value) -> EvalResult<Value> {
        self.emit("Pipeline", format!("Executing pipeline {}", pipeline.name));

        let mut data = input;
        for stage in &pipeline.stages {
            self.tick()?;
            self.emit("Pipeline", format!("Stage {} processing", stage.name));
            if let Some(gpu) = stage.properties.get("gpu_workers") {
                self.emit(
                    "Pipeline",
                    format!("Stage {} scheduled on {gpu} GPU workers", stage.name),
                );
            } else if let Some(workers) = stage.properties.get("workers") {
                self.emit(
                    "Pipeline",
                    format!("Stage {} scheduled on {workers} workers", stage.name),
                );
            }
            if stage
                .properties
                .get("parallel")
                .is_some_and(Value::is_truthy)
            {
                self.emit(
                    "Pipeline",
                    format!("Stage {} running in parallel", stage.name),
                );
            }

            data = match stage.properties.get("process") {
                Some(Value::Callable(process)) => {
                    let process = process.clone();
                    self.call_value(&process, vec![data])?
                }
                Some(other) => {
                    return Err(RuntimeError::NotCallable(format!(
                        "stage {} process ({})",
                        stage.name,
                        other.type_name()
                    )));
                }
                None => match data {
                    // Pass-through with provenance tagging.
                    Value::Sequence(items) => Value::Sequence(
                        items
                            .into_iter()
                            .map(|item| tag_with_provenance(item, &stage.name))
                            .collect(),
                    ),
                    other => other,
                },
            };
        }

        Ok(data)
    }

    // ── Contracts ─────────────────────────────────────────────────────────────

    /// Execute a contract method once per chain, in order, collecting
    /// per-chain results.
    fn run_contract_method(
        &mut self,
        contract: &Rc<ContractValue>,
        method: &str,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let chains_value = Value::Sequence(
            contract
                .chains
                .iter()
                .map(|c| Value::Str(c.clone()))
                .collect(),
        );

        if method == "deploy" {
            let mut addresses = BTreeMap::new();
            for chain in &contract.chains {
                let address = self.synth_address(&contract.name, chain);
                self.emit(
                    "Contract",
                    format!("{} deployed on {chain} at {address}", contract.name),
                );
                addresses.insert(chain.clone(), Value::Str(address));
            }
            return Ok(success_record(addresses, chains_value));
        }

        let decl = contract
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| RuntimeError::InvalidMember {
                target: format!("contract {}", contract.name),
                member: method.to_string(),
            })?;

        let mut results = BTreeMap::new();
        for chain in &contract.chains {
            self.emit(
                "Contract",
                format!("{}.{method} executing on {chain}", contract.name),
            );
            let chain_env = contract.env.child();
            chain_env.define("current_chain", Value::Str(chain.clone()));
            let call_env = chain_env.child();
            for (i, param) in decl.params.iter().enumerate() {
                call_env.define(
                    &param.name.name,
                    args.get(i).cloned().unwrap_or(Value::Null),
                );
            }
            let result = match self.eval_block(&decl.body, &call_env) {
                Ok(value) => value,
                Err(RuntimeError::Return(value)) => value,
                Err(err) => return Err(err),
            };
            results.insert(chain.clone(), result);
        }

        Ok(success_record(results, chains_value))
    }

    /// Placeholder deployment address: hex of a contract/chain/nonce hash.
    fn synth_address(&mut self, contract: &str, chain: &str) -> String {
        self.address_nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(format!("{contract}:{chain}:{}", self.address_nonce));
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(20).map(|b| format!("{b:02x}")).collect();
        format!("0x{hex}")
    }
}

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

enum PathSegment {
    Field(String),
    Index(Value),
}

fn node_builtin(node: &Rc<NodeInstance>, builtin: NodeBuiltin) -> Value {
    Value::Callable(Callable::NodeBuiltin {
        node: node.clone(),
        builtin,
    })
}

fn is_place(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
    )
}

/// Label for "not callable" errors, preferring the source name.
fn callee_label(callee: &Expr, value: &Value) -> String {
    match &callee.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Member { property, .. } => property.name.clone(),
        ExprKind::StaticAccess { target, member } => {
            format!("{}::{}", target.name, member.name)
        }
        _ => value.type_name().to_string(),
    }
}

/// Default stage transform: every element gains `processedBy` and
/// `timestamp`; non-record elements are wrapped.
fn tag_with_provenance(item: Value, stage: &str) -> Value {
    let mut fields = match item {
        Value::Record(fields) => fields,
        other => {
            let mut fields = BTreeMap::new();
            fields.insert("value".to_string(), other);
            fields
        }
    };
    fields.insert("processedBy".to_string(), Value::Str(stage.to_string()));
    fields.insert(
        "timestamp".to_string(),
        Value::Number(now_millis() as f64),
    );
    Value::Record(fields)
}

fn success_record(results: BTreeMap<String, Value>, chains: Value) -> Value {
    let mut out = BTreeMap::new();
    out.insert("success".to_string(), Value::Bool(true));
    out.insert("results".to_string(), Value::Record(results));
    out.insert("chains".to_string(), chains);
    Value::Record(out)
}

// ─────────────────────────────────────────────────────────────────────
// Contract natives
// ─────────────────────────────────────────────────────────────────────

/// `lock_tokens(amount)`: log-only, no ledger effect.
fn native_lock_tokens(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let amount = args.first().cloned().unwrap_or(Value::Number(0.0));
    eval.emit("Contract", format!("Locked {amount} tokens"));
    let mut out = BTreeMap::new();
    out.insert("success".to_string(), Value::Bool(true));
    out.insert("locked".to_string(), amount);
    Ok(Value::Record(out))
}

/// `mint_tokens(amount)`: log-only, no ledger effect.
fn native_mint_tokens(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let amount = args.first().cloned().unwrap_or(Value::Number(0.0));
    eval.emit("Contract", format!("Minted {amount} tokens"));
    let mut out = BTreeMap::new();
    out.insert("success".to_string(), Value::Bool(true));
    out.insert("minted".to_string(), amount);
    Ok(Value::Record(out))
}

/// `emit(event, payload?)`: log-only event emission.
fn native_emit_event(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let event = args
        .first()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "event".to_string());
    eval.emit("Contract", format!("Event {event} emitted"));
    let mut out = BTreeMap::new();
    out.insert("success".to_string(), Value::Bool(true));
    Ok(Value::Record(out))
}

//! Lexical environments for the OMNIX evaluator.
//!
//! An environment is one scope in a parent-linked chain, holding three
//! maps: plain variables, named functions, and declared state. Scopes are
//! shared via `Rc` so closures, node instances, and descriptors can keep
//! their declaring scope alive; a chain is freed when the last reference
//! drops. Chains form a tree, a scope never references its descendants.

use crate::value::{Callable, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

struct Frame {
    vars: BTreeMap<String, Value>,
    functions: BTreeMap<String, Callable>,
    state: BTreeMap<String, Value>,
    parent: Option<Environment>,
}

/// A shared handle to one lexical scope.
#[derive(Clone)]
pub struct Environment {
    inner: Rc<RefCell<Frame>>,
}

impl Environment {
    /// Create a root scope.
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    /// Create a child scope of `self`.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    fn with_parent(parent: Option<Environment>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Frame {
                vars: BTreeMap::new(),
                functions: BTreeMap::new(),
                state: BTreeMap::new(),
                parent,
            })),
        }
    }

    /// Define a variable in this scope, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.inner.borrow_mut().vars.insert(name.to_string(), value);
    }

    /// Register a named function in this scope.
    pub fn define_function(&self, name: &str, callable: Callable) {
        self.inner
            .borrow_mut()
            .functions
            .insert(name.to_string(), callable);
    }

    /// Declare a state variable in this scope.
    pub fn define_state(&self, name: &str, value: Value) {
        self.inner
            .borrow_mut()
            .state
            .insert(name.to_string(), value);
    }

    /// Look up a name, walking the parent chain. Variables shadow state,
    /// which shadows functions, within each scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.inner.borrow();
        if let Some(v) = frame.vars.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = frame.state.get(name) {
            return Some(v.clone());
        }
        if let Some(c) = frame.functions.get(name) {
            return Some(Value::Callable(c.clone()));
        }
        let parent = frame.parent.clone();
        drop(frame);
        parent.and_then(|p| p.get(name))
    }

    /// Look up a name in this scope only, without walking the chain.
    /// Used for member access on instances and descriptors, where outer
    /// bindings must not leak through.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        let frame = self.inner.borrow();
        if let Some(v) = frame.vars.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = frame.state.get(name) {
            return Some(v.clone());
        }
        frame.functions.get(name).map(|c| Value::Callable(c.clone()))
    }

    /// Update an existing variable or state entry, walking the parent
    /// chain. Returns `false` if the name is bound nowhere.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut frame = self.inner.borrow_mut();
        if frame.vars.contains_key(name) {
            frame.vars.insert(name.to_string(), value);
            return true;
        }
        if frame.state.contains_key(name) {
            frame.state.insert(name.to_string(), value);
            return true;
        }
        let parent = frame.parent.clone();
        drop(frame);
        match parent {
            Some(p) => p.assign(name, value),
            None => false,
        }
    }

    /// Snapshot of this scope's own state entries (not the chain's).
    pub fn state_entries(&self) -> BTreeMap<String, Value> {
        self.inner.borrow().state.clone()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.inner.borrow();
        f.debug_struct("Environment")
            .field("vars", &frame.vars.keys().collect::<Vec<_>>())
            .field("state", &frame.state.keys().collect::<Vec<_>>())
            .field("functions", &frame.functions.keys().collect::<Vec<_>>())
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

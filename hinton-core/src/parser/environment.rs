//! Environment for variable scopes
//!
//! Each scope is a separate node linked to its enclosing scope. Blocks and
//! calls create a child node; closures keep a reference to the node that was
//! active where they were defined, which keeps that node (and its chain)
//! alive for as long as the closure lives.

use crate::parser::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Shared, mutable scope node. Closures and child scopes hold clones.
pub type SharedEnvironment = Rc<RefCell<Environment>>;

/// How a name was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Variable,
    Constant,
    Function,
    Native,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub kind: DeclKind,
}

/// Why an assignment was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    /// The nearest binding is a constant
    Constant,
    /// No scope in the chain defines the name
    Undefined,
}

/// One scope in the chain
// TODO: a function declared in a scope it also captures forms an Rc cycle
// (scope -> function value -> scope), so such scopes are never freed. Break
// it by capturing the declaring scope weakly or by moving scopes to an arena.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Binding>,
    enclosing: Option<SharedEnvironment>,
}

impl Environment {
    /// Create a new global environment
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create a new global environment behind a shared handle
    pub fn new_shared() -> SharedEnvironment {
        Rc::new(RefCell::new(Environment::new()))
    }

    /// Create a child scope of `parent`
    pub fn child(parent: &SharedEnvironment) -> SharedEnvironment {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(parent.clone()),
        }))
    }

    /// Define a fresh binding in this scope, shadowing any outer one
    pub fn define(&mut self, name: impl Into<String>, value: Value, kind: DeclKind) {
        self.values.insert(name.into(), Binding { value, kind });
    }

    /// Look a name up, searching outward through enclosing scopes
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(binding) => Some(binding.value.clone()),
            None => self
                .enclosing
                .as_ref()
                .and_then(|parent| parent.borrow().get(name)),
        }
    }

    /// Rebind the nearest existing binding for `name`
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.values.get_mut(name) {
            if binding.kind == DeclKind::Constant {
                return Err(AssignError::Constant);
            }
            binding.value = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(parent) => parent.borrow_mut().assign(name, value),
            None => Err(AssignError::Undefined),
        }
    }

    /// All visible bindings, inner scopes shadowing outer ones, sorted by name
    pub fn all_bindings(&self) -> Vec<(String, Binding)> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        self.collect_bindings(&mut seen, &mut result);
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn collect_bindings(&self, seen: &mut HashSet<String>, out: &mut Vec<(String, Binding)>) {
        for (name, binding) in &self.values {
            if seen.insert(name.clone()) {
                out.push((name.clone(), binding.clone()));
            }
        }
        if let Some(parent) = &self.enclosing {
            parent.borrow().collect_bindings(seen, out);
        }
    }
}

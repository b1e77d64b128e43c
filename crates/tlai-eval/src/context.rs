//! Evaluation contexts
//!
//! A `Context` is one branch of evaluation: the result value computed so
//! far, a (possibly partial) state assignment, the visible definitions
//! and bindings, and the two mode flags that decide what `=` means.
//! Contexts are immutable by convention — every `with_*` returns a fresh
//! copy, and the persistent maps inside make that an O(log n) fork, so
//! one branch's updates are never observable from another.

use crate::state::State;
use crate::value::Value;
use im::OrdMap;
use std::sync::Arc;
use tlai_core::ast::{FunctionDef, OperatorDef};

/// A named definition visible to the evaluator
#[derive(Clone, Debug)]
pub enum Defn {
    /// Operator definition (possibly with parameters)
    Op(Arc<OperatorDef>),
    /// Function definition `f[x \in S] == e`
    Fcn(Arc<FunctionDef>),
}

/// One evaluation branch
#[derive(Clone)]
pub struct Context {
    /// Result value of the most recently evaluated expression
    pub result: Option<Value>,
    /// Current (partial) state assignment
    pub state: State,
    /// Operator and function definitions (extended by LET)
    defs: OrdMap<Arc<str>, Defn>,
    /// Quantifier and operator-parameter bindings
    bindings: OrdMap<Arc<str>, Value>,
    /// Constant values
    constants: OrdMap<Arc<str>, Value>,
    /// Previous function value, set while evaluating an EXCEPT RHS (`@`)
    pub prev_fcn: Option<Value>,
    /// Inside a `'` subtree: identifier lookup targets primed slots
    pub primed: bool,
    /// Init mode: `x = e` may assign an unassigned unprimed variable
    pub allow_unprimed: bool,
}

impl Context {
    /// A context with no definitions, bindings, or variables. Constant
    /// expressions evaluate in this.
    pub fn bare() -> Self {
        Context {
            result: None,
            state: State::empty(),
            defs: OrdMap::new(),
            bindings: OrdMap::new(),
            constants: OrdMap::new(),
            prev_fcn: None,
            primed: false,
            allow_unprimed: false,
        }
    }

    /// The root context for evaluating a predicate over `state`
    pub fn new(
        state: State,
        defs: OrdMap<Arc<str>, Defn>,
        constants: OrdMap<Arc<str>, Value>,
    ) -> Self {
        Context {
            result: None,
            state,
            defs,
            bindings: OrdMap::new(),
            constants,
            prev_fcn: None,
            primed: false,
            allow_unprimed: false,
        }
    }

    pub fn defn(&self, name: &str) -> Option<&Defn> {
        self.defs.get(name)
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn with_result(&self, value: Value) -> Context {
        Context {
            result: Some(value),
            ..self.clone()
        }
    }

    pub fn with_state(&self, state: State) -> Context {
        Context {
            state,
            ..self.clone()
        }
    }

    pub fn with_binding(&self, name: impl Into<Arc<str>>, value: Value) -> Context {
        Context {
            bindings: self.bindings.update(name.into(), value),
            ..self.clone()
        }
    }

    pub fn with_def(&self, name: impl Into<Arc<str>>, defn: Defn) -> Context {
        Context {
            defs: self.defs.update(name.into(), defn),
            ..self.clone()
        }
    }

    pub fn with_prev_fcn(&self, value: Option<Value>) -> Context {
        Context {
            prev_fcn: value,
            ..self.clone()
        }
    }

    pub fn with_primed(&self, primed: bool) -> Context {
        Context {
            primed,
            ..self.clone()
        }
    }

    pub fn with_allow_unprimed(&self, allow: bool) -> Context {
        Context {
            allow_unprimed: allow,
            ..self.clone()
        }
    }

    /// Keep this branch's result and state, but restore the
    /// scope-dependent fields (definitions, bindings, flags, `@`) from
    /// `parent`. Used when branches leave a binding scope: the
    /// assignments persist, the scope does not.
    pub fn rescope(self, parent: &Context) -> Context {
        Context {
            result: self.result,
            state: self.state,
            defs: parent.defs.clone(),
            bindings: parent.bindings.clone(),
            constants: parent.constants.clone(),
            prev_fcn: parent.prev_fcn.clone(),
            primed: parent.primed,
            allow_unprimed: parent.allow_unprimed,
        }
    }

    /// Whether `branch` assigned any variable this context has not
    pub fn assigned_beyond(&self, branch: &Context) -> bool {
        branch
            .state
            .iter()
            .any(|(name, b)| b.value().is_some() && !self.state.is_assigned(name))
    }
}

//! State enumeration: initial states, successor states, reachability
//!
//! The enumerators are a thin loop over the evaluator. Init evaluation
//! runs with unprimed assignment allowed over a fully unassigned state;
//! next evaluation runs per action over the current state extended with
//! one unassigned primed slot per variable. A next-state branch that
//! comes back TRUE but leaves a primed variable unassigned is discarded,
//! not an error.
//!
//! Reachability is a plain worklist search (BFS by default, DFS on
//! request) deduplicating on state fingerprints and recording
//! predecessor/successor edges. Errors are fail-fast; callers can opt
//! into skipping actions that fail independently.

use crate::context::{Context, Defn};
use crate::error::{EvalError, EvalResult};
use crate::eval::eval;
use crate::state::{Fingerprint, State};
use crate::value::Value;
use im::OrdMap;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use tlai_core::ast::Expr;
use tlai_core::{SpecModule, Spanned};

/// Everything the enumerators need: declarations, definitions, constant
/// values, and the Init/Next bodies
#[derive(Clone, Debug)]
pub struct SpecEnv {
    variables: Vec<Arc<str>>,
    defs: OrdMap<Arc<str>, Defn>,
    constants: OrdMap<Arc<str>, Value>,
    init: Option<Spanned<Expr>>,
    next: Option<Spanned<Expr>>,
    actions: Vec<Spanned<Expr>>,
}

impl SpecEnv {
    /// Assemble from an extracted module and resolved constant values
    pub fn new(module: &SpecModule, constants: OrdMap<Arc<str>, Value>) -> Self {
        let mut defs: OrdMap<Arc<str>, Defn> = OrdMap::new();
        for def in &module.operators {
            defs.insert(
                Arc::from(def.name.node.as_str()),
                Defn::Op(Arc::new(def.clone())),
            );
        }
        for def in &module.functions {
            defs.insert(
                Arc::from(def.name.node.as_str()),
                Defn::Fcn(Arc::new(def.clone())),
            );
        }
        SpecEnv {
            variables: module
                .variables
                .iter()
                .map(|v| Arc::from(v.node.as_str()))
                .collect(),
            defs,
            constants,
            init: module.init.clone(),
            next: module.next.clone(),
            actions: module.actions.clone(),
        }
    }

    pub fn variables(&self) -> &[Arc<str>] {
        &self.variables
    }

    fn init_body(&self) -> EvalResult<&Spanned<Expr>> {
        self.init.as_ref().ok_or_else(|| EvalError::MissingDefinition {
            name: "Init".to_string(),
        })
    }

    fn require_next(&self) -> EvalResult<&[Spanned<Expr>]> {
        if self.next.is_none() {
            return Err(EvalError::MissingDefinition {
                name: "Next".to_string(),
            });
        }
        Ok(&self.actions)
    }

    /// Root context over `state`
    fn context(&self, state: State) -> Context {
        Context::new(state, self.defs.clone(), self.constants.clone())
    }
}

/// Enumeration options (reachability bound, search order, error policy)
#[derive(Debug, Clone, Default)]
pub struct ReachOptions {
    /// Stop after discovering this many states (None = unbounded)
    pub max_states: Option<usize>,
    /// Depth-first instead of breadth-first
    pub dfs: bool,
    /// Skip actions whose evaluation fails instead of failing the whole
    /// enumeration
    pub continue_on_action_error: bool,
}

/// The reachable fragment of the state graph
#[derive(Debug, Clone)]
pub struct Reachable {
    /// Discovered states in discovery order
    pub states: Vec<State>,
    /// (predecessor, successor) fingerprint pairs, deduplicated
    pub edges: Vec<(Fingerprint, Fingerprint)>,
    /// False when the max-states bound cut the search short
    pub complete: bool,
}

/// All states satisfying Init, deduplicated by fingerprint in branch
/// order
pub fn init_states(env: &SpecEnv) -> EvalResult<Vec<State>> {
    let body = env.init_body()?;
    let state = State::unassigned(env.variables.iter().cloned());
    let ctx = env.context(state).with_allow_unprimed(true);
    let branches = eval(body, &ctx)?;

    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for branch in branches {
        if !matches!(branch.result, Some(Value::Bool(true))) {
            continue;
        }
        if let Some(name) = branch.state.unassigned_names().next() {
            return Err(EvalError::UnassignedVariable {
                name: name.to_string(),
                span: Some(body.span),
            });
        }
        if seen.insert(branch.state.fingerprint()) {
            out.push(branch.state);
        }
    }
    Ok(out)
}

/// All successors of `state` under Next, per action in source order,
/// deduplicated by fingerprint
pub fn next_states(env: &SpecEnv, state: &State, opts: &ReachOptions) -> EvalResult<Vec<State>> {
    let actions = env.require_next()?;
    let mut base = state.clone();
    for v in &env.variables {
        base = base.with_unassigned(format!("{}'", v));
    }
    let ctx = env.context(base);

    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for action in actions {
        let branches = match eval(action, &ctx) {
            Ok(branches) => branches,
            Err(_) if opts.continue_on_action_error => continue,
            Err(e) => return Err(e),
        };
        for branch in branches {
            if !matches!(branch.result, Some(Value::Bool(true))) {
                continue;
            }
            // A TRUE branch with an unassigned primed slot is discarded
            if branch.state.unassigned_names().next().is_some() {
                continue;
            }
            let succ = branch.state.deprime();
            if seen.insert(succ.fingerprint()) {
                out.push(succ);
            }
        }
    }
    Ok(out)
}

/// Worklist reachability from the initial states
pub fn reachable(env: &SpecEnv, opts: &ReachOptions) -> EvalResult<Reachable> {
    let initial = init_states(env)?;
    env.require_next()?;

    let mut seen: FxHashSet<Fingerprint> = FxHashSet::default();
    let mut seen_edges: FxHashSet<(Fingerprint, Fingerprint)> = FxHashSet::default();
    let mut states = Vec::new();
    let mut edges = Vec::new();
    let mut frontier: VecDeque<State> = VecDeque::new();
    let mut complete = true;

    let at_bound = |n: usize| opts.max_states.map(|max| n >= max).unwrap_or(false);

    for state in initial {
        if at_bound(states.len()) {
            complete = false;
            break;
        }
        if seen.insert(state.fingerprint()) {
            states.push(state.clone());
            frontier.push_back(state);
        }
    }

    'search: while let Some(state) = if opts.dfs {
        frontier.pop_back()
    } else {
        frontier.pop_front()
    } {
        let fp = state.fingerprint();
        for succ in next_states(env, &state, opts)? {
            let succ_fp = succ.fingerprint();
            if seen_edges.insert((fp, succ_fp)) {
                edges.push((fp, succ_fp));
            }
            if !seen.contains(&succ_fp) {
                if at_bound(states.len()) {
                    complete = false;
                    break 'search;
                }
                seen.insert(succ_fp);
                states.push(succ.clone());
                frontier.push_back(succ);
            }
        }
    }

    Ok(Reachable {
        states,
        edges,
        complete,
    })
}

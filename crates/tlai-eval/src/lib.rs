//! Symbolic evaluator and state enumerators for the TLAI interpreter
//!
//! The public surface is three entry points over (module text, constant
//! bindings): [`compute_initial_states`], [`compute_next_states`], and
//! [`compute_reachable_states`]. Each runs the full pipeline — rewrite,
//! parse, extract, bind constants, evaluate. [`Interpreter`] keeps the
//! loaded module around when a caller needs more than one query (the CLI
//! does), plus the source mapping back to original positions.

pub mod context;
pub mod enumerate;
pub mod error;
pub mod eval;
pub mod fingerprint;
pub mod itf;
pub mod state;
pub mod value;

pub use context::{Context, Defn};
pub use enumerate::{ReachOptions, Reachable, SpecEnv};
pub use error::{EvalError, EvalResult};
pub use state::{Fingerprint, State};
pub use value::{FcnValue, SetValue, Value};

use im::OrdMap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tlai_core::module::ExtractError;
use tlai_core::rewrite::{RewriteError, Rewritten};
use tlai_core::{LineCol, Span};

/// Any failure from load through enumeration
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("no value given for constant {name}")]
    MissingConstant { name: String },

    #[error("constant {name}: {message}")]
    Constant { name: String, message: String },
}

/// A loaded module, ready to answer state queries
#[derive(Debug)]
pub struct Interpreter {
    env: SpecEnv,
    rewritten: Rewritten,
}

impl Interpreter {
    /// Run the front half of the pipeline: rewrite, parse, extract, and
    /// bind constants. `constants` maps each declared constant name to a
    /// TLA+ expression text, evaluated in an otherwise-empty context.
    pub fn load(
        source: &str,
        constants: &HashMap<String, String>,
    ) -> Result<Interpreter, InterpreterError> {
        let rewritten = tlai_core::rewrite_module(source)?;
        // The rewriter reached a fixpoint, so this parse succeeds; an
        // error here points at a rewriter bug and still gets reported
        // against the original source.
        let module = tlai_core::parse_module(&rewritten.text).map_err(|e| {
            RewriteError::Parse {
                message: e.message.clone(),
                pos: rewritten.original_span_pos(e.span),
            }
        })?;
        let spec = tlai_core::extract(&module)?;

        let mut values: OrdMap<Arc<str>, Value> = OrdMap::new();
        for name in &spec.constants {
            let text = constants
                .get(&name.node)
                .ok_or_else(|| InterpreterError::MissingConstant {
                    name: name.node.clone(),
                })?;
            let value = eval_constant(&name.node, text)?;
            values.insert(Arc::from(name.node.as_str()), value);
        }

        Ok(Interpreter {
            env: SpecEnv::new(&spec, values),
            rewritten,
        })
    }

    pub fn env(&self) -> &SpecEnv {
        &self.env
    }

    /// All states satisfying Init
    pub fn initial_states(&self) -> Result<Vec<State>, InterpreterError> {
        Ok(enumerate::init_states(&self.env)?)
    }

    /// All successors of `state` under Next
    pub fn next_states(&self, state: &State) -> Result<Vec<State>, InterpreterError> {
        Ok(enumerate::next_states(
            &self.env,
            state,
            &ReachOptions::default(),
        )?)
    }

    /// The reachable state graph from Init under Next
    pub fn reachable(&self, opts: &ReachOptions) -> Result<Reachable, InterpreterError> {
        Ok(enumerate::reachable(&self.env, opts)?)
    }

    /// Map an evaluation-error span (rewritten text) back to an original
    /// source position
    pub fn original_pos(&self, span: Span) -> LineCol {
        self.rewritten.original_span_pos(span)
    }
}

/// Evaluate one constant binding in an empty context
fn eval_constant(name: &str, text: &str) -> Result<Value, InterpreterError> {
    let wrap = |message: String| InterpreterError::Constant {
        name: name.to_string(),
        message,
    };
    let rewritten = tlai_core::rewrite_expression(text).map_err(|e| wrap(e.to_string()))?;
    let expr = tlai_core::parse_expression(&rewritten.text).map_err(|e| wrap(e.to_string()))?;
    eval::eval_value(&expr, &Context::bare()).map_err(|e| wrap(e.to_string()))
}

/// Evaluate `Init`: every satisfying valuation of the declared variables
pub fn compute_initial_states(
    source: &str,
    constants: &HashMap<String, String>,
) -> Result<Vec<State>, InterpreterError> {
    Interpreter::load(source, constants)?.initial_states()
}

/// Evaluate `Next` from `state`: every successor valuation
pub fn compute_next_states(
    source: &str,
    constants: &HashMap<String, String>,
    state: &State,
) -> Result<Vec<State>, InterpreterError> {
    Interpreter::load(source, constants)?.next_states(state)
}

/// Drive `Next` from the initial states to closure (or the bound)
pub fn compute_reachable_states(
    source: &str,
    constants: &HashMap<String, String>,
    opts: &ReachOptions,
) -> Result<Reachable, InterpreterError> {
    Interpreter::load(source, constants)?.reachable(opts)
}

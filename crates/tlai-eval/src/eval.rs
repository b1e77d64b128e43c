//! The symbolic expression evaluator
//!
//! `eval` takes a normalized syntax node and a [`Context`] and returns a
//! non-empty list of contexts, one per evaluation branch. Most
//! expressions evaluate to a single context carrying a value; the
//! disjunctive constructs (`\/`, bullet lists, `\E`) fork, and `=`
//! against an unassigned (primed, or unprimed-in-init) variable binds it
//! in the branch's state.
//!
//! Branch merging follows one rule: after a disjunctive construct has
//! evaluated its sub-branches, the branches are kept apart only if one
//! of them assigned a state variable the parent had not; otherwise they
//! collapse to a single boolean context. Conjunctions thread state left
//! to right and short-circuit per branch on a false conjunct.
//!
//! The evaluator expects rewriter output: quantifiers bind exactly one
//! pattern and `\in`/`\notin` expressions are gone. Encountering either
//! anyway is an internal error, not a feature.

use crate::context::{Context, Defn};
use crate::error::{EvalError, EvalResult};
use crate::value::{FcnValue, SetValue, Value};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::sync::Arc;
use tlai_core::ast::{BoundPattern, BoundVar, Expr, ExceptPathElem};
use tlai_core::{Span, Spanned};

/// Sets above this cardinality refuse to materialize (powersets,
/// function sets, ranges)
const MAX_SET_SIZE: usize = 1 << 20;

/// Evaluate `expr` under `ctx`, returning one context per branch
pub fn eval(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<Vec<Context>> {
    let span = expr.span;
    match &expr.node {
        // === Literals ===
        Expr::Bool(b) => value_one(ctx, Value::Bool(*b)),
        Expr::Int(n) => value_one(ctx, Value::Int(n.clone())),
        Expr::Str(s) => value_one(ctx, Value::str(s)),
        Expr::BooleanSet => value_one(
            ctx,
            Value::set([Value::Bool(false), Value::Bool(true)]),
        ),

        // === Names ===
        Expr::Ident(name) => eval_ident(name, ctx, span),
        Expr::Apply(name, args) => eval_apply(name, args, ctx, span),

        // === Logic ===
        Expr::And(l, r) => eval_conjunction(&[l.as_ref(), r.as_ref()], ctx),
        Expr::AndList(items) => {
            let refs: Vec<&Spanned<Expr>> = items.iter().collect();
            eval_conjunction(&refs, ctx)
        }
        Expr::Or(l, r) => eval_disjunction(&[l.as_ref(), r.as_ref()], ctx),
        Expr::OrList(items) => {
            let refs: Vec<&Spanned<Expr>> = items.iter().collect();
            eval_disjunction(&refs, ctx)
        }
        Expr::Not(e) => {
            // A forking operand collapses to any-branch-true before the
            // negation; assignments made inside never escape
            let subs = require_bool_results(eval(e, ctx)?, e.span)?;
            let any = subs
                .iter()
                .any(|s| matches!(s.result, Some(Value::Bool(true))));
            value_one(ctx, Value::Bool(!any))
        }
        Expr::Implies(l, r) => {
            // Plain boolean logic: only /\ and \/ propagate assignments
            let value = if !eval_bool(l, ctx)? {
                true
            } else {
                eval_bool(r, ctx)?
            };
            value_one(ctx, Value::Bool(value))
        }

        // === Quantifiers ===
        Expr::Forall(bounds, body) => eval_forall(bounds, body, ctx, span),
        Expr::Exists(bounds, body) => eval_exists(bounds, body, ctx, span),
        Expr::Choose(bound, body) => eval_choose(bound, body, ctx, span),

        // === Sets ===
        Expr::SetEnum(items) => {
            let elems: Vec<Value> = items
                .iter()
                .map(|e| eval_value(e, ctx))
                .collect::<EvalResult<_>>()?;
            value_one(ctx, Value::Set(SetValue::from_iter(elems)))
        }
        Expr::SetBuilder(body, bounds) => {
            let mut elems = Vec::new();
            enumerate_bindings(bounds, ctx, &mut |c, _| {
                elems.push(eval_value(body, c)?);
                Ok(())
            })?;
            value_one(ctx, Value::Set(SetValue::from_iter(elems)))
        }
        Expr::SetFilter(bound, pred) => {
            let (pattern, domain) = (&bound.patterns[0], &bound.domain);
            let set = eval_set(domain, ctx)?;
            let mut kept = Vec::new();
            for elem in set.iter() {
                let c = bind_pattern(ctx, pattern, elem)?;
                if eval_bool(pred, &c)? {
                    kept.push(elem.clone());
                }
            }
            value_one(ctx, Value::Set(SetValue::from_iter(kept)))
        }
        Expr::In(_, _) | Expr::NotIn(_, _) => Err(EvalError::internal(
            "membership expression survived normalization",
            Some(span),
        )),
        Expr::Union(l, r) => {
            let a = eval_set(l, ctx)?;
            let b = eval_set(r, ctx)?;
            value_one(ctx, Value::Set(a.union(&b)))
        }
        Expr::Intersect(l, r) => {
            let a = eval_set(l, ctx)?;
            let b = eval_set(r, ctx)?;
            value_one(ctx, Value::Set(a.intersection(&b)))
        }
        Expr::SetMinus(l, r) => {
            let a = eval_set(l, ctx)?;
            let b = eval_set(r, ctx)?;
            value_one(ctx, Value::Set(a.difference(&b)))
        }
        Expr::Times(factors) => eval_times(factors, ctx, span),
        Expr::Powerset(e) => eval_powerset(e, ctx, span),
        Expr::Domain(e) => {
            let v = eval_value(e, ctx)?;
            let domain = v.domain().map_err(|err| err.with_span(span))?;
            value_one(ctx, Value::Set(domain))
        }

        // === Functions and records ===
        Expr::FcnLit(bounds, body) => {
            let single = binder_units(bounds).len() == 1;
            let mut pairs = Vec::new();
            enumerate_bindings(bounds, ctx, &mut |c, args| {
                let arg = if single {
                    args[0].clone()
                } else {
                    Value::tuple(args.to_vec())
                };
                pairs.push((arg, eval_value(body, c)?));
                Ok(())
            })?;
            value_one(ctx, Value::Fcn(FcnValue::from_pairs(pairs)))
        }
        Expr::FcnApply(f, args) => {
            let fv = eval_value(f, ctx)?;
            let arg = eval_fcn_arg(args, ctx)?;
            let result = fv.apply(&arg).map_err(|e| e.with_span(span))?;
            value_one(ctx, result)
        }
        Expr::FcnSet(dom, cod) => eval_fcn_set(dom, cod, ctx, span),
        Expr::SingletonFcn(d, v) => {
            let key = eval_value(d, ctx)?;
            let val = eval_value(v, ctx)?;
            value_one(ctx, Value::Fcn(FcnValue::from_pairs([(key, val)])))
        }
        Expr::FcnMerge(l, r) => {
            let f = eval_fcn(l, ctx)?;
            let g = eval_fcn(r, ctx)?;
            value_one(ctx, Value::Fcn(f.compose(&g)))
        }
        Expr::RecordLit(fields) => {
            let mut pairs = Vec::new();
            for (name, value) in fields {
                pairs.push((name.node.clone(), eval_value(value, ctx)?));
            }
            value_one(ctx, Value::Fcn(FcnValue::record(pairs)))
        }
        Expr::RecordSet(fields) => eval_record_set(fields, ctx, span),
        Expr::RecordAccess(e, field) => {
            let v = eval_value(e, ctx)?;
            let result = v
                .apply(&Value::str(&field.node))
                .map_err(|err| err.with_span(span))?;
            value_one(ctx, result)
        }
        Expr::Except(f, specs) => eval_except(f, specs, ctx, span),
        Expr::At => match &ctx.prev_fcn {
            Some(v) => value_one(ctx, v.clone()),
            None => Err(EvalError::internal("@ used outside EXCEPT", Some(span))),
        },

        // === Tuples ===
        Expr::Tuple(items) => {
            let elems: Vec<Value> = items
                .iter()
                .map(|e| eval_value(e, ctx))
                .collect::<EvalResult<_>>()?;
            value_one(ctx, Value::tuple(elems))
        }

        // === Actions ===
        Expr::Prime(inner) => {
            let subs = eval(inner, &ctx.with_primed(true))?;
            Ok(subs.into_iter().map(|s| s.rescope(ctx)).collect())
        }
        Expr::Enabled(arg) => {
            // Approximation: surface the argument's boolean; successor
            // existence is not checked independently
            let subs = require_bool_results(eval(arg, ctx)?, arg.span)?;
            let any = subs
                .iter()
                .any(|s| matches!(s.result, Some(Value::Bool(true))));
            value_one(ctx, Value::Bool(any))
        }
        Expr::Unchanged(arg) => eval_unchanged(arg, ctx),

        // === Control ===
        Expr::If(cond, then_arm, else_arm) => {
            if eval_bool(cond, ctx)? {
                eval(then_arm, ctx)
            } else {
                eval(else_arm, ctx)
            }
        }
        Expr::Case(arms, other) => {
            for arm in arms {
                if eval_bool(&arm.guard, ctx)? {
                    return eval(&arm.body, ctx);
                }
            }
            match other {
                Some(e) => eval(e, ctx),
                None => Err(EvalError::NonexhaustiveCase { span: Some(span) }),
            }
        }
        Expr::Let(defs, body) => {
            let mut scoped = ctx.clone();
            for def in defs {
                scoped = scoped.with_def(def.name.node.clone(), Defn::Op(Arc::new(def.clone())));
            }
            let subs = eval(body, &scoped)?;
            Ok(subs.into_iter().map(|s| s.rescope(ctx)).collect())
        }

        // === Comparison ===
        Expr::Eq(l, r) => eval_eq(l, r, ctx),
        Expr::Neq(l, r) => {
            let a = eval_value(l, ctx)?;
            let b = eval_value(r, ctx)?;
            value_one(ctx, Value::Bool(a.fingerprint() != b.fingerprint()))
        }
        Expr::Lt(l, r) => eval_int_cmp(l, r, ctx, |o| o == std::cmp::Ordering::Less),
        Expr::Leq(l, r) => eval_int_cmp(l, r, ctx, |o| o != std::cmp::Ordering::Greater),
        Expr::Gt(l, r) => eval_int_cmp(l, r, ctx, |o| o == std::cmp::Ordering::Greater),
        Expr::Geq(l, r) => eval_int_cmp(l, r, ctx, |o| o != std::cmp::Ordering::Less),

        // === Arithmetic ===
        Expr::Add(l, r) => eval_int_op(l, r, ctx, |a, b| Ok(a + b)),
        Expr::Sub(l, r) => eval_int_op(l, r, ctx, |a, b| Ok(a - b)),
        Expr::Mul(l, r) => eval_int_op(l, r, ctx, |a, b| Ok(a * b)),
        Expr::Mod(l, r) => {
            let a = eval_int(l, ctx)?;
            let b = eval_int(r, ctx)?;
            if b.is_zero() {
                return Err(EvalError::ModuloByZero { span: Some(span) });
            }
            if b.is_negative() {
                return Err(EvalError::TypeMismatch {
                    expected: "positive divisor",
                    got: "negative integer",
                    span: Some(r.span),
                });
            }
            value_one(ctx, Value::Int(a.mod_floor(&b)))
        }
        Expr::Neg(e) => {
            let n = eval_int(e, ctx)?;
            value_one(ctx, Value::Int(-n))
        }
        Expr::Range(l, r) => {
            let lo = eval_int(l, ctx)?;
            let hi = eval_int(r, ctx)?;
            let size = &hi - &lo + BigInt::one();
            if size > BigInt::from(MAX_SET_SIZE) {
                return Err(EvalError::SetTooLarge { span: Some(span) });
            }
            let mut elems = Vec::with_capacity(size.to_usize().unwrap_or(0));
            let mut i = lo;
            while i <= hi {
                elems.push(Value::Int(i.clone()));
                i += BigInt::one();
            }
            value_one(ctx, Value::Set(SetValue::from_iter(elems)))
        }

        // === Sequences ===
        Expr::Concat(l, r) => {
            let mut a = eval_seq(l, ctx)?;
            let b = eval_seq(r, ctx)?;
            a.extend(b);
            value_one(ctx, Value::tuple(a))
        }
    }
}

/// Evaluate and demand a single branch carrying a value
pub fn eval_value(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<Value> {
    let mut branches = eval(expr, ctx)?;
    if branches.len() != 1 {
        return Err(EvalError::internal(
            "expression forked where a single value is required",
            Some(expr.span),
        ));
    }
    branches
        .pop()
        .and_then(|c| c.result)
        .ok_or_else(|| EvalError::internal("expression produced no value", Some(expr.span)))
}

/// Evaluate and demand a single boolean
pub fn eval_bool(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<bool> {
    eval_value(expr, ctx)?
        .as_bool()
        .map_err(|e| e.with_span(expr.span))
}

fn eval_int(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<BigInt> {
    Ok(eval_value(expr, ctx)?
        .as_int()
        .map_err(|e| e.with_span(expr.span))?
        .clone())
}

fn eval_set(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<SetValue> {
    Ok(eval_value(expr, ctx)?
        .as_set()
        .map_err(|e| e.with_span(expr.span))?
        .clone())
}

fn eval_seq(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<Vec<Value>> {
    eval_value(expr, ctx)?
        .as_seq()
        .map_err(|e| e.with_span(expr.span))
}

fn eval_fcn(expr: &Spanned<Expr>, ctx: &Context) -> EvalResult<FcnValue> {
    eval_value(expr, ctx)?
        .to_fcn()
        .map_err(|e| e.with_span(expr.span))
}

fn ok_one(ctx: Context) -> EvalResult<Vec<Context>> {
    Ok(vec![ctx])
}

fn value_one(ctx: &Context, value: Value) -> EvalResult<Vec<Context>> {
    ok_one(ctx.with_result(value))
}

/// Check every branch carries a boolean result, normalizing the value
fn require_bool_results(branches: Vec<Context>, span: Span) -> EvalResult<Vec<Context>> {
    branches
        .into_iter()
        .map(|c| {
            let b = c
                .result
                .as_ref()
                .ok_or_else(|| EvalError::internal("branch produced no value", Some(span)))?
                .as_bool()
                .map_err(|e| e.with_span(span))?;
            Ok(c.with_result(Value::Bool(b)))
        })
        .collect()
}

/// The branch merging rule: keep sub-branches apart only when one of
/// them assigned a state variable the parent had not; otherwise collapse
/// to a single any-branch-true boolean
fn merge_branches(parent: &Context, branches: Vec<Context>) -> Vec<Context> {
    if branches.iter().any(|b| parent.assigned_beyond(b)) {
        branches
    } else {
        let any = branches
            .iter()
            .any(|b| matches!(b.result, Some(Value::Bool(true))));
        vec![parent.with_result(Value::Bool(any))]
    }
}

/// Conjunction: thread state left to right, short-circuit per branch
fn eval_conjunction(items: &[&Spanned<Expr>], ctx: &Context) -> EvalResult<Vec<Context>> {
    let mut branches = vec![ctx.with_result(Value::Bool(true))];
    for item in items {
        let mut next = Vec::new();
        for branch in branches {
            if matches!(branch.result, Some(Value::Bool(false))) {
                // Already false: keep the branch but stop extending it
                next.push(branch);
                continue;
            }
            let subs = require_bool_results(eval(item, &branch)?, item.span)?;
            next.extend(subs);
        }
        branches = next;
    }
    Ok(branches)
}

/// Disjunction: evaluate every disjunct from the parent context, then
/// apply the merge rule
fn eval_disjunction(items: &[&Spanned<Expr>], ctx: &Context) -> EvalResult<Vec<Context>> {
    let mut all = Vec::new();
    for item in items {
        all.extend(require_bool_results(eval(item, ctx)?, item.span)?);
    }
    Ok(merge_branches(ctx, all))
}

/// `=`: assignment when the left side is an assignable, unassigned
/// variable slot; fingerprint comparison otherwise
fn eval_eq(
    lhs: &Spanned<Expr>,
    rhs: &Spanned<Expr>,
    ctx: &Context,
) -> EvalResult<Vec<Context>> {
    if let Some(target) = assign_target(lhs, ctx) {
        if !ctx.state.is_assigned(&target) {
            let subs = eval(rhs, ctx)?;
            let mut out = Vec::with_capacity(subs.len());
            for sub in subs {
                let v = sub.result.clone().ok_or_else(|| {
                    EvalError::internal("assignment right side produced no value", Some(rhs.span))
                })?;
                let state = sub.state.with_var(Arc::clone(&target), v);
                out.push(sub.with_state(state).with_result(Value::Bool(true)));
            }
            return Ok(out);
        }
    }
    let a = eval_value(lhs, ctx)?;
    let b = eval_value(rhs, ctx)?;
    value_one(ctx, Value::Bool(a.fingerprint() == b.fingerprint()))
}

/// The state slot `lhs` can assign, if any: a primed variable, an
/// unprimed identifier inside a `'` subtree, or an unprimed variable
/// when init-mode assignment is allowed
fn assign_target(lhs: &Spanned<Expr>, ctx: &Context) -> Option<Arc<str>> {
    match &lhs.node {
        Expr::Prime(inner) => {
            let name = inner.node.as_ident()?;
            let key = format!("{}'", name);
            ctx.state.has(&key).then(|| Arc::from(key.as_str()))
        }
        Expr::Ident(name) => {
            if ctx.primed {
                let key = format!("{}'", name);
                ctx.state.has(&key).then(|| Arc::from(key.as_str()))
            } else if ctx.allow_unprimed && ctx.state.has(name) {
                Some(Arc::from(name.as_str()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Identifier resolution: state variable (honoring the primed flag),
/// then quantifier binding, then definition, then constant
fn eval_ident(name: &str, ctx: &Context, span: Span) -> EvalResult<Vec<Context>> {
    let state_key = if ctx.primed {
        format!("{}'", name)
    } else {
        name.to_string()
    };
    if ctx.state.has(&state_key) {
        return match ctx.state.get(&state_key) {
            Some(v) => value_one(ctx, v.clone()),
            None => Err(EvalError::UnboundIdentifier {
                name: state_key,
                span: Some(span),
            }),
        };
    }
    if let Some(v) = ctx.binding(name) {
        return value_one(ctx, v.clone());
    }
    if let Some(defn) = ctx.defn(name) {
        return match defn.clone() {
            Defn::Op(def) => {
                if !def.params.is_empty() {
                    return Err(EvalError::ArityMismatch {
                        op: name.to_string(),
                        expected: def.params.len(),
                        got: 0,
                        span: Some(span),
                    });
                }
                let subs = eval(&def.body, ctx)?;
                Ok(subs.into_iter().map(|s| s.rescope(ctx)).collect())
            }
            Defn::Fcn(def) => {
                let single = binder_units(&def.bounds).len() == 1;
                let mut pairs = Vec::new();
                enumerate_bindings(&def.bounds, ctx, &mut |c, args| {
                    let arg = if single {
                        args[0].clone()
                    } else {
                        Value::tuple(args.to_vec())
                    };
                    pairs.push((arg, eval_value(&def.body, c)?));
                    Ok(())
                })?;
                value_one(ctx, Value::Fcn(FcnValue::from_pairs(pairs)))
            }
        };
    }
    if let Some(v) = ctx.constant(name) {
        return value_one(ctx, v.clone());
    }
    Err(EvalError::UnboundIdentifier {
        name: name.to_string(),
        span: Some(span),
    })
}

/// Operator application: user definitions first, then the built-in
/// operators of the standard modules
fn eval_apply(
    name: &Spanned<String>,
    args: &[Spanned<Expr>],
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    if let Some(Defn::Fcn(_)) = ctx.defn(&name.node) {
        return Err(EvalError::TypeMismatch {
            expected: "operator",
            got: "function definition",
            span: Some(span),
        });
    }
    if let Some(Defn::Op(def)) = ctx.defn(&name.node).cloned() {
        if def.params.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                op: name.node.clone(),
                expected: def.params.len(),
                got: args.len(),
                span: Some(span),
            });
        }
        let mut scoped = ctx.clone();
        for (param, arg) in def.params.iter().zip(args) {
            let v = eval_value(arg, ctx)?;
            scoped = scoped.with_binding(param.node.clone(), v);
        }
        let subs = eval(&def.body, &scoped)?;
        return Ok(subs.into_iter().map(|s| s.rescope(ctx)).collect());
    }

    let builtin_arity = |expected: usize| -> EvalResult<()> {
        if args.len() != expected {
            Err(EvalError::ArityMismatch {
                op: name.node.clone(),
                expected,
                got: args.len(),
                span: Some(span),
            })
        } else {
            Ok(())
        }
    };

    match name.node.as_str() {
        "Cardinality" => {
            builtin_arity(1)?;
            let s = eval_set(&args[0], ctx)?;
            value_one(ctx, Value::int(s.len() as i64))
        }
        "Len" => {
            builtin_arity(1)?;
            let s = eval_seq(&args[0], ctx)?;
            value_one(ctx, Value::int(s.len() as i64))
        }
        "Head" => {
            builtin_arity(1)?;
            let s = eval_seq(&args[0], ctx)?;
            match s.first() {
                Some(v) => value_one(ctx, v.clone()),
                None => Err(EvalError::EmptySeq {
                    op: "Head",
                    span: Some(span),
                }),
            }
        }
        "Tail" => {
            builtin_arity(1)?;
            let s = eval_seq(&args[0], ctx)?;
            if s.is_empty() {
                return Err(EvalError::EmptySeq {
                    op: "Tail",
                    span: Some(span),
                });
            }
            value_one(ctx, Value::tuple(s[1..].to_vec()))
        }
        "Append" => {
            builtin_arity(2)?;
            let mut s = eval_seq(&args[0], ctx)?;
            s.push(eval_value(&args[1], ctx)?);
            value_one(ctx, Value::tuple(s))
        }
        _ => Err(EvalError::UnboundIdentifier {
            name: name.node.clone(),
            span: Some(span),
        }),
    }
}

/// Flatten binder groups into (pattern, domain) units
fn binder_units(bounds: &[BoundVar]) -> Vec<(&Spanned<BoundPattern>, &Spanned<Expr>)> {
    bounds
        .iter()
        .flat_map(|b| b.patterns.iter().map(move |p| (p, b.domain.as_ref())))
        .collect()
}

/// Bind a pattern to one value
fn bind_pattern(
    ctx: &Context,
    pattern: &Spanned<BoundPattern>,
    value: &Value,
) -> EvalResult<Context> {
    match &pattern.node {
        BoundPattern::Name(name) => Ok(ctx.with_binding(name.clone(), value.clone())),
        BoundPattern::Tuple(names) => {
            let elems = value
                .as_seq()
                .map_err(|e| e.with_span(pattern.span))?;
            if elems.len() != names.len() {
                return Err(EvalError::TypeMismatch {
                    expected: "tuple matching the pattern arity",
                    got: "tuple",
                    span: Some(pattern.span),
                });
            }
            let mut c = ctx.clone();
            for (name, elem) in names.iter().zip(elems) {
                c = c.with_binding(name.node.clone(), elem);
            }
            Ok(c)
        }
    }
}

/// Enumerate all combinations of binder values, left to right; later
/// domains are evaluated under earlier bindings
fn enumerate_bindings(
    bounds: &[BoundVar],
    ctx: &Context,
    f: &mut impl FnMut(&Context, &[Value]) -> EvalResult<()>,
) -> EvalResult<()> {
    let units = binder_units(bounds);
    let mut acc = Vec::with_capacity(units.len());
    go(&units, 0, ctx, &mut acc, f)
}

fn go(
    units: &[(&Spanned<BoundPattern>, &Spanned<Expr>)],
    idx: usize,
    ctx: &Context,
    acc: &mut Vec<Value>,
    f: &mut impl FnMut(&Context, &[Value]) -> EvalResult<()>,
) -> EvalResult<()> {
    if idx == units.len() {
        return f(ctx, acc);
    }
    let (pattern, domain) = units[idx];
    let set = eval_set(domain, ctx)?;
    for elem in set.iter() {
        let c = bind_pattern(ctx, pattern, elem)?;
        acc.push(elem.clone());
        go(units, idx + 1, &c, acc, f)?;
        acc.pop();
    }
    Ok(())
}

fn single_binder<'a>(
    bounds: &'a [BoundVar],
    span: Span,
) -> EvalResult<(&'a Spanned<BoundPattern>, &'a Spanned<Expr>)> {
    if bounds.len() == 1 && bounds[0].is_single() {
        Ok((&bounds[0].patterns[0], &bounds[0].domain))
    } else {
        Err(EvalError::internal(
            "composite quantifier survived normalization",
            Some(span),
        ))
    }
}

/// `\A`: true iff the body holds for every element; never forks
fn eval_forall(
    bounds: &[BoundVar],
    body: &Spanned<Expr>,
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let (pattern, domain) = single_binder(bounds, span)?;
    let set = eval_set(domain, ctx)?;
    for elem in set.iter() {
        let c = bind_pattern(ctx, pattern, elem)?;
        if !eval_bool(body, &c)? {
            return value_one(ctx, Value::Bool(false));
        }
    }
    value_one(ctx, Value::Bool(true))
}

/// `\E`: the disjunctive union of one evaluation per element
fn eval_exists(
    bounds: &[BoundVar],
    body: &Spanned<Expr>,
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let (pattern, domain) = single_binder(bounds, span)?;
    let set = eval_set(domain, ctx)?;
    let mut all = Vec::new();
    for elem in set.iter() {
        let c = bind_pattern(ctx, pattern, elem)?;
        let subs = require_bool_results(eval(body, &c)?, body.span)?;
        all.extend(subs.into_iter().map(|s| s.rescope(ctx)));
    }
    Ok(merge_branches(ctx, all))
}

/// `CHOOSE`: first witness in fingerprint order; deterministic per run
fn eval_choose(
    bound: &BoundVar,
    body: &Spanned<Expr>,
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let (pattern, domain) = single_binder(std::slice::from_ref(bound), span)?;
    let set = eval_set(domain, ctx)?;
    for elem in set.iter() {
        let c = bind_pattern(ctx, pattern, elem)?;
        if eval_bool(body, &c)? {
            return value_one(ctx, elem.clone());
        }
    }
    Err(EvalError::NoWitness { span: Some(span) })
}

/// `\X`: flat n-ary cartesian product as a set of tuples
fn eval_times(
    factors: &[Spanned<Expr>],
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let sets: Vec<SetValue> = factors
        .iter()
        .map(|f| eval_set(f, ctx))
        .collect::<EvalResult<_>>()?;
    check_product_size(sets.iter().map(|s| s.len()), span)?;
    let mut tuples: Vec<Value> = vec![Value::tuple(Vec::new())];
    for set in &sets {
        let mut next = Vec::with_capacity(tuples.len() * set.len());
        for prefix in &tuples {
            let Value::Tuple(elems) = prefix else { unreachable!() };
            for elem in set.iter() {
                let mut t = elems.to_vec();
                t.push(elem.clone());
                next.push(Value::tuple(t));
            }
        }
        tuples = next;
    }
    value_one(ctx, Value::Set(SetValue::from_iter(tuples)))
}

/// `SUBSET`: the powerset, materialized
fn eval_powerset(
    e: &Spanned<Expr>,
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let set = eval_set(e, ctx)?;
    let n = set.len();
    if n >= 20 || (1usize << n) > MAX_SET_SIZE {
        return Err(EvalError::SetTooLarge { span: Some(span) });
    }
    let elems = set.elems();
    let mut subsets = Vec::with_capacity(1 << n);
    for mask in 0u32..(1u32 << n) {
        let members = elems
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, v)| v.clone());
        subsets.push(Value::Set(SetValue::from_iter(members)));
    }
    value_one(ctx, Value::Set(SetValue::from_iter(subsets)))
}

/// `[S -> T]`: every function from S to T
fn eval_fcn_set(
    dom: &Spanned<Expr>,
    cod: &Spanned<Expr>,
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let domain = eval_set(dom, ctx)?;
    let codomain = eval_set(cod, ctx)?;
    let n = domain.len();
    let m = codomain.len();
    if n == 0 {
        return value_one(
            ctx,
            Value::set([Value::Fcn(FcnValue::empty())]),
        );
    }
    if m == 0 {
        return value_one(ctx, Value::Set(SetValue::empty()));
    }
    match m.checked_pow(n as u32) {
        Some(total) if total <= MAX_SET_SIZE => {}
        _ => return Err(EvalError::SetTooLarge { span: Some(span) }),
    }

    // Odometer over codomain choices, one digit per domain element
    let mut fcns = Vec::new();
    let mut digits = vec![0usize; n];
    loop {
        let pairs = domain
            .elems()
            .iter()
            .zip(&digits)
            .map(|(k, &d)| (k.clone(), codomain.elems()[d].clone()));
        fcns.push(Value::Fcn(FcnValue::from_pairs(pairs)));
        let mut i = 0;
        loop {
            if i == n {
                return value_one(ctx, Value::Set(SetValue::from_iter(fcns)));
            }
            digits[i] += 1;
            if digits[i] < m {
                break;
            }
            digits[i] = 0;
            i += 1;
        }
    }
}

/// `[a : S, b : T]`: every record drawing each field from its set
fn eval_record_set(
    fields: &[(Spanned<String>, Spanned<Expr>)],
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let sets: Vec<(String, SetValue)> = fields
        .iter()
        .map(|(name, e)| Ok((name.node.clone(), eval_set(e, ctx)?)))
        .collect::<EvalResult<_>>()?;
    check_product_size(sets.iter().map(|(_, s)| s.len()), span)?;
    let mut records: Vec<Vec<(String, Value)>> = vec![Vec::new()];
    for (name, set) in &sets {
        let mut next = Vec::with_capacity(records.len() * set.len());
        for prefix in &records {
            for elem in set.iter() {
                let mut r = prefix.clone();
                r.push((name.clone(), elem.clone()));
                next.push(r);
            }
        }
        records = next;
    }
    value_one(
        ctx,
        Value::Set(SetValue::from_iter(
            records
                .into_iter()
                .map(|r| Value::Fcn(FcnValue::record(r))),
        )),
    )
}

/// Refuse cartesian constructions whose size overflows or exceeds the
/// enumeration limit
fn check_product_size(sizes: impl Iterator<Item = usize>, span: Span) -> EvalResult<()> {
    let mut total = 1usize;
    for n in sizes {
        total = total
            .checked_mul(n)
            .ok_or(EvalError::SetTooLarge { span: Some(span) })?;
        if total > MAX_SET_SIZE {
            return Err(EvalError::SetTooLarge { span: Some(span) });
        }
    }
    Ok(())
}

/// The argument of `f[a]` / `f[a, b]`: one value, or a tuple of them
fn eval_fcn_arg(args: &[Spanned<Expr>], ctx: &Context) -> EvalResult<Value> {
    if args.len() == 1 {
        eval_value(&args[0], ctx)
    } else {
        let elems: Vec<Value> = args
            .iter()
            .map(|a| eval_value(a, ctx))
            .collect::<EvalResult<_>>()?;
        Ok(Value::tuple(elems))
    }
}

/// `EXCEPT`: updates compose left to right on a running value; `@` in a
/// right side resolves to the previous value at that path
fn eval_except(
    f: &Spanned<Expr>,
    specs: &[tlai_core::ast::ExceptSpec],
    ctx: &Context,
    span: Span,
) -> EvalResult<Vec<Context>> {
    let mut running = eval_value(f, ctx)?;
    for spec in specs {
        let mut path = Vec::with_capacity(spec.path.len());
        for elem in &spec.path {
            match elem {
                ExceptPathElem::Field(name) => path.push(Value::str(&name.node)),
                ExceptPathElem::Index(args) => path.push(eval_fcn_arg(args, ctx)?),
            }
        }
        let prev = running
            .apply_path(&path)
            .map_err(|e| e.with_span(span))?;
        let rhs_ctx = ctx.with_prev_fcn(Some(prev));
        let v = eval_value(&spec.value, &rhs_ctx)?;
        running = running
            .update_path(&path, v)
            .map_err(|e| e.with_span(span))?;
    }
    value_one(ctx, running)
}

/// `UNCHANGED`: bind each primed slot to the current value. Definition
/// names expand and re-apply; tuples distribute.
fn eval_unchanged(arg: &Spanned<Expr>, ctx: &Context) -> EvalResult<Vec<Context>> {
    match &arg.node {
        Expr::Tuple(items) => {
            let mut current = ctx.with_result(Value::Bool(true));
            let mut all_true = true;
            for item in items {
                let mut subs = eval_unchanged(item, &current)?;
                let sub = subs.pop().ok_or_else(|| {
                    EvalError::internal("UNCHANGED produced no branch", Some(item.span))
                })?;
                all_true &= matches!(sub.result, Some(Value::Bool(true)));
                current = sub;
            }
            Ok(vec![current.with_result(Value::Bool(all_true))])
        }
        Expr::Ident(name) => {
            if ctx.state.has(name.as_str()) {
                let primed = format!("{}'", name);
                if !ctx.state.has(&primed) {
                    return Err(EvalError::internal(
                        "UNCHANGED outside next-state evaluation",
                        Some(arg.span),
                    ));
                }
                let current = ctx.state.get(name.as_str()).cloned().ok_or_else(|| {
                    EvalError::UnboundIdentifier {
                        name: name.clone(),
                        span: Some(arg.span),
                    }
                })?;
                if let Some(existing) = ctx.state.get(&primed) {
                    // Already assigned: UNCHANGED degenerates to equality
                    let same = existing.fingerprint() == current.fingerprint();
                    return value_one(ctx, Value::Bool(same));
                }
                let state = ctx.state.with_var(primed, current);
                return ok_one(ctx.with_state(state).with_result(Value::Bool(true)));
            }
            if let Some(Defn::Op(def)) = ctx.defn(name).cloned() {
                if def.params.is_empty() {
                    return eval_unchanged(&def.body, ctx);
                }
            }
            Err(EvalError::UnboundIdentifier {
                name: name.clone(),
                span: Some(arg.span),
            })
        }
        _ => Err(EvalError::internal(
            "UNCHANGED expects a variable or tuple of variables",
            Some(arg.span),
        )),
    }
}

fn eval_int_op(
    l: &Spanned<Expr>,
    r: &Spanned<Expr>,
    ctx: &Context,
    f: impl FnOnce(BigInt, BigInt) -> EvalResult<BigInt>,
) -> EvalResult<Vec<Context>> {
    let a = eval_int(l, ctx)?;
    let b = eval_int(r, ctx)?;
    value_one(ctx, Value::Int(f(a, b)?))
}

fn eval_int_cmp(
    l: &Spanned<Expr>,
    r: &Spanned<Expr>,
    ctx: &Context,
    f: impl FnOnce(std::cmp::Ordering) -> bool,
) -> EvalResult<Vec<Context>> {
    let a = eval_int(l, ctx)?;
    let b = eval_int(r, ctx)?;
    value_one(ctx, Value::Bool(f(a.cmp(&b))))
}

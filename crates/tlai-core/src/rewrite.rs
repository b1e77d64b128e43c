//! Source-to-source normalization of TLA+ modules
//!
//! The evaluator only handles one case per construct, so before a module
//! reaches it the rewriter normalizes the source text in a fixpoint loop:
//!
//! 1. Comments are erased (blanked to spaces, preserving byte positions).
//! 2. Composite quantifiers are split: `\E x, y \in S, z \in T : P`
//!    becomes `\E x \in S : \E y \in S : \E z \in T : P`.
//! 3. Membership is desugared: `e \in S` becomes `(\E k \in S : e = k)`
//!    with `k` fresh for this rewriter instance, and `e \notin S` becomes
//!    the negation. Binder `\in`s are part of quantifier syntax and are
//!    left alone.
//!
//! Each round parses the current text, batches all non-overlapping
//! rewrites, applies them right-to-left, and repeats until a parse
//! produces no more candidates. All rewrites are single-line edits, so
//! line numbers are stable across the whole loop; the accumulated
//! [`SourceMap`] maps rewritten columns back to original columns
//! best-effort.

use crate::ast::{BoundVar, CaseArm, Expr, ExceptPathElem, Module, Unit};
use crate::span::{LineCol, LineIndex, Span, Spanned};
use crate::syntax::lexer::Token;
use crate::syntax::parser::{parse_expression, parse_module, ParseError};
use logos::Logos;
use std::collections::HashSet;
use thiserror::Error;

/// Rounds after which the fixpoint loop is declared broken. Every round
/// strictly reduces the number of composite quantifiers and membership
/// nodes, so hitting this means a rewriter bug.
const MAX_ROUNDS: usize = 100;

/// A rewriter failure
#[derive(Debug, Clone, Error)]
pub enum RewriteError {
    /// The (partially rewritten) module no longer parses
    #[error("parse error at line {}, column {}: {message}", .pos.line + 1, .pos.col + 1)]
    Parse {
        message: String,
        /// Position in the original source
        pos: LineCol,
    },

    /// A non-comment rewrite would span multiple lines
    #[error("cannot rewrite multi-line expression at line {}", .pos.line + 1)]
    MultiLine { pos: LineCol },

    /// The rewrite loop failed to converge
    #[error("rewriter failed to reach a fixpoint after {rounds} rounds")]
    FixpointOverflow { rounds: usize },
}

/// One textual edit, in the coordinates of the text it applies to
#[derive(Debug, Clone)]
struct Rewrite {
    start: u32,
    end: u32,
    replacement: String,
}

/// A column-level edit record for the source map
#[derive(Debug, Clone, Copy)]
struct Edit {
    col: u32,
    old_len: u32,
    new_len: u32,
}

/// Best-effort mapping from rewritten positions back to the original
/// source. Line numbers are exact (rewrites never add or remove lines);
/// columns unwind the recorded edits and clamp when a position falls
/// inside replaced text.
#[derive(Debug, Clone)]
pub struct SourceMap {
    /// Per-line edits, in application order
    line_edits: Vec<Vec<Edit>>,
    orig_index: LineIndex,
}

impl SourceMap {
    fn new(source: &str) -> Self {
        let orig_index = LineIndex::new(source);
        SourceMap {
            line_edits: vec![Vec::new(); orig_index.line_count()],
            orig_index,
        }
    }

    fn record(&mut self, line: u32, edit: Edit) {
        self.line_edits[line as usize].push(edit);
    }

    /// Map a rewritten line/column back to an original line/column
    pub fn to_original(&self, line: u32, col: u32) -> LineCol {
        let mut col = col;
        if let Some(edits) = self.line_edits.get(line as usize) {
            for edit in edits.iter().rev() {
                if col >= edit.col + edit.new_len {
                    col = col - edit.new_len + edit.old_len;
                } else if col >= edit.col {
                    col = edit.col;
                }
            }
        }
        LineCol {
            line,
            col: col.min(self.orig_index.line_len(line)),
        }
    }
}

/// The result of rewriting: normalized text plus the way back
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub text: String,
    map: SourceMap,
    index: LineIndex,
}

impl Rewritten {
    /// Map a byte offset in the rewritten text to an original position
    pub fn original_pos(&self, offset: u32) -> LineCol {
        let lc = self.index.line_col(offset);
        self.map.to_original(lc.line, lc.col)
    }

    /// Map a span in the rewritten text to an original position
    pub fn original_span_pos(&self, span: Span) -> LineCol {
        self.original_pos(span.start)
    }
}

/// Fresh-name generator: `k1`, `k2`, ... skipping every identifier that
/// occurs in the source
struct FreshNames {
    used: HashSet<String>,
    counter: usize,
}

impl FreshNames {
    fn new(source: &str) -> Self {
        let mut used = HashSet::new();
        for (result, range) in Token::lexer(source).spanned() {
            if result == Ok(Token::Ident) {
                used.insert(source[range].to_string());
            }
        }
        FreshNames { used, counter: 0 }
    }

    fn fresh(&mut self) -> String {
        loop {
            self.counter += 1;
            let name = format!("k{}", self.counter);
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }
}

/// Normalize a module source text to the evaluator's input form
pub fn rewrite_module(source: &str) -> Result<Rewritten, RewriteError> {
    rewrite(source, RewriteTarget::Module)
}

/// Normalize a standalone expression (constant bindings)
pub fn rewrite_expression(source: &str) -> Result<Rewritten, RewriteError> {
    rewrite(source, RewriteTarget::Expression)
}

#[derive(Clone, Copy)]
enum RewriteTarget {
    Module,
    Expression,
}

fn rewrite(source: &str, target: RewriteTarget) -> Result<Rewritten, RewriteError> {
    let mut text = blank_comments(source);
    let mut map = SourceMap::new(source);
    let mut fresh = FreshNames::new(&text);

    for _round in 0..MAX_ROUNDS {
        let index = LineIndex::new(&text);
        let to_original =
            |err: &ParseError| map.to_original(index.line_col(err.span.start).line, index.line_col(err.span.start).col);

        let mut rewrites = Vec::new();
        match target {
            RewriteTarget::Module => {
                let module = parse_module(&text).map_err(|e| RewriteError::Parse {
                    message: e.message.clone(),
                    pos: to_original(&e),
                })?;
                collect_module_rewrites(&module, &text, &mut fresh, &mut rewrites);
            }
            RewriteTarget::Expression => {
                let expr = parse_expression(&text).map_err(|e| RewriteError::Parse {
                    message: e.message.clone(),
                    pos: to_original(&e),
                })?;
                collect_expr_rewrites(&expr, &text, &mut fresh, &mut rewrites);
            }
        }

        if rewrites.is_empty() {
            let index = LineIndex::new(&text);
            return Ok(Rewritten { text, map, index });
        }

        // Keep the earliest-starting of any overlapping pair; inner
        // rewrites get picked up on a later round.
        rewrites.sort_by_key(|r| (r.start, r.end));
        let mut kept: Vec<Rewrite> = Vec::new();
        for r in rewrites {
            if kept.last().map(|prev| r.start >= prev.end).unwrap_or(true) {
                kept.push(r);
            }
        }

        // Single-line check, then apply right-to-left so earlier offsets
        // stay valid.
        for r in &kept {
            if text[r.start as usize..r.end as usize].contains('\n') {
                let lc = index.line_col(r.start);
                return Err(RewriteError::MultiLine {
                    pos: map.to_original(lc.line, lc.col),
                });
            }
        }
        for r in kept.iter().rev() {
            let lc = index.line_col(r.start);
            map.record(
                lc.line,
                Edit {
                    col: lc.col,
                    old_len: r.end - r.start,
                    new_len: r.replacement.len() as u32,
                },
            );
            text.replace_range(r.start as usize..r.end as usize, &r.replacement);
        }
    }

    Err(RewriteError::FixpointOverflow { rounds: MAX_ROUNDS })
}

/// Blank every comment to spaces, keeping newlines so positions and
/// line structure survive
fn blank_comments(source: &str) -> String {
    let mut bytes = source.as_bytes().to_vec();
    for (result, range) in Token::lexer(source).spanned() {
        if matches!(result, Ok(t) if t.is_comment()) {
            for b in &mut bytes[range] {
                if *b != b'\n' {
                    *b = b' ';
                }
            }
        }
    }
    // The lexer only produces valid ranges over the original UTF-8, and
    // blanking replaces whole comment spans, so this cannot fail.
    String::from_utf8(bytes).expect("comment blanking preserved UTF-8")
}

fn collect_module_rewrites(
    module: &Module,
    text: &str,
    fresh: &mut FreshNames,
    out: &mut Vec<Rewrite>,
) {
    for unit in &module.units {
        match &unit.node {
            Unit::Operator(def) => collect_expr_rewrites(&def.body, text, fresh, out),
            Unit::Function(def) => {
                for bound in &def.bounds {
                    collect_expr_rewrites(&bound.domain, text, fresh, out);
                }
                collect_expr_rewrites(&def.body, text, fresh, out);
            }
            Unit::Variables(_) | Unit::Constants(_) | Unit::Separator => {}
        }
    }
}

/// Whether a quantifier's bounds need splitting
fn is_composite(bounds: &[BoundVar]) -> bool {
    bounds.len() > 1 || bounds.iter().any(|b| !b.is_single())
}

/// Build the normalized binder chain `\E p1 \in S1 : \E p2 \in S1 : ... :`
fn binder_chain(keyword: &str, bounds: &[BoundVar], text: &str) -> String {
    let mut parts = Vec::new();
    for bound in bounds {
        let domain = bound.domain.span.text(text);
        for pattern in &bound.patterns {
            parts.push(format!(
                "{} {} \\in {} : ",
                keyword,
                pattern.span.text(text),
                domain
            ));
        }
    }
    let mut chain = parts.concat();
    chain.pop(); // drop the trailing space, keep the final `: `→`:`
    chain
}

/// Find the end offset of the `:` separating a quantifier's binders from
/// its body
fn colon_end(bounds: &[BoundVar], body_start: u32, text: &str) -> u32 {
    let from = bounds.last().map(|b| b.domain.span.end).unwrap_or(body_start) as usize;
    let colon = text[from..body_start as usize]
        .find(':')
        .map(|i| from + i + 1)
        .unwrap_or(body_start as usize);
    colon as u32
}

fn collect_expr_rewrites(
    expr: &Spanned<Expr>,
    text: &str,
    fresh: &mut FreshNames,
    out: &mut Vec<Rewrite>,
) {
    match &expr.node {
        Expr::Exists(bounds, body) | Expr::Forall(bounds, body) => {
            if is_composite(bounds) {
                let keyword = if matches!(expr.node, Expr::Exists(..)) {
                    "\\E"
                } else {
                    "\\A"
                };
                out.push(Rewrite {
                    start: expr.span.start,
                    end: colon_end(bounds, body.span.start, text),
                    replacement: binder_chain(keyword, bounds, text),
                });
            }
            for bound in bounds {
                collect_expr_rewrites(&bound.domain, text, fresh, out);
            }
            collect_expr_rewrites(body, text, fresh, out);
        }
        Expr::In(lhs, rhs) => {
            let k = fresh.fresh();
            out.push(Rewrite {
                start: expr.span.start,
                end: expr.span.end,
                replacement: format!(
                    "(\\E {} \\in {} : {} = {})",
                    k,
                    rhs.span.text(text),
                    lhs.span.text(text),
                    k
                ),
            });
            collect_expr_rewrites(lhs, text, fresh, out);
            collect_expr_rewrites(rhs, text, fresh, out);
        }
        Expr::NotIn(lhs, rhs) => {
            let k = fresh.fresh();
            out.push(Rewrite {
                start: expr.span.start,
                end: expr.span.end,
                replacement: format!(
                    "(~(\\E {} \\in {} : {} = {}))",
                    k,
                    rhs.span.text(text),
                    lhs.span.text(text),
                    k
                ),
            });
            collect_expr_rewrites(lhs, text, fresh, out);
            collect_expr_rewrites(rhs, text, fresh, out);
        }

        // Everything below just recurses
        Expr::Bool(_)
        | Expr::Int(_)
        | Expr::Str(_)
        | Expr::BooleanSet
        | Expr::Ident(_)
        | Expr::At => {}
        Expr::Apply(_, args) => {
            for arg in args {
                collect_expr_rewrites(arg, text, fresh, out);
            }
        }
        Expr::And(l, r)
        | Expr::Or(l, r)
        | Expr::Implies(l, r)
        | Expr::Eq(l, r)
        | Expr::Neq(l, r)
        | Expr::Lt(l, r)
        | Expr::Leq(l, r)
        | Expr::Gt(l, r)
        | Expr::Geq(l, r)
        | Expr::Add(l, r)
        | Expr::Sub(l, r)
        | Expr::Mul(l, r)
        | Expr::Mod(l, r)
        | Expr::Range(l, r)
        | Expr::Union(l, r)
        | Expr::Intersect(l, r)
        | Expr::SetMinus(l, r)
        | Expr::FcnSet(l, r)
        | Expr::SingletonFcn(l, r)
        | Expr::FcnMerge(l, r)
        | Expr::Concat(l, r) => {
            collect_expr_rewrites(l, text, fresh, out);
            collect_expr_rewrites(r, text, fresh, out);
        }
        Expr::Not(e)
        | Expr::Neg(e)
        | Expr::Powerset(e)
        | Expr::Domain(e)
        | Expr::Prime(e)
        | Expr::Enabled(e)
        | Expr::Unchanged(e) => collect_expr_rewrites(e, text, fresh, out),
        Expr::AndList(items) | Expr::OrList(items) | Expr::SetEnum(items) | Expr::Tuple(items)
        | Expr::Times(items) => {
            for item in items {
                collect_expr_rewrites(item, text, fresh, out);
            }
        }
        Expr::Choose(bound, body) => {
            collect_expr_rewrites(&bound.domain, text, fresh, out);
            collect_expr_rewrites(body, text, fresh, out);
        }
        Expr::SetBuilder(body, bounds) | Expr::FcnLit(bounds, body) => {
            collect_expr_rewrites(body, text, fresh, out);
            for bound in bounds {
                collect_expr_rewrites(&bound.domain, text, fresh, out);
            }
        }
        Expr::SetFilter(bound, pred) => {
            collect_expr_rewrites(&bound.domain, text, fresh, out);
            collect_expr_rewrites(pred, text, fresh, out);
        }
        Expr::FcnApply(f, args) => {
            collect_expr_rewrites(f, text, fresh, out);
            for arg in args {
                collect_expr_rewrites(arg, text, fresh, out);
            }
        }
        Expr::RecordLit(fields) | Expr::RecordSet(fields) => {
            for (_, value) in fields {
                collect_expr_rewrites(value, text, fresh, out);
            }
        }
        Expr::RecordAccess(e, _) => collect_expr_rewrites(e, text, fresh, out),
        Expr::Except(f, specs) => {
            collect_expr_rewrites(f, text, fresh, out);
            for spec in specs {
                for elem in &spec.path {
                    if let ExceptPathElem::Index(args) = elem {
                        for arg in args {
                            collect_expr_rewrites(arg, text, fresh, out);
                        }
                    }
                }
                collect_expr_rewrites(&spec.value, text, fresh, out);
            }
        }
        Expr::If(c, t, e) => {
            collect_expr_rewrites(c, text, fresh, out);
            collect_expr_rewrites(t, text, fresh, out);
            collect_expr_rewrites(e, text, fresh, out);
        }
        Expr::Case(arms, other) => {
            for CaseArm { guard, body } in arms {
                collect_expr_rewrites(guard, text, fresh, out);
                collect_expr_rewrites(body, text, fresh, out);
            }
            if let Some(other) = other {
                collect_expr_rewrites(other, text, fresh, out);
            }
        }
        Expr::Let(defs, body) => {
            for def in defs {
                collect_expr_rewrites(&def.body, text, fresh, out);
            }
            collect_expr_rewrites(body, text, fresh, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewritten_expr(src: &str) -> String {
        rewrite_expression(src).expect("rewrite failed").text
    }

    #[test]
    fn erases_line_comments_preserving_positions() {
        let src = "x = 1 \\* note\ny = 2";
        let out = blank_comments(src);
        assert_eq!(out, "x = 1        \ny = 2");
        assert_eq!(out.len(), src.len());
    }

    #[test]
    fn erases_multi_line_block_comments_per_line() {
        let src = "a (* one\ntwo *) b";
        let out = blank_comments(src);
        assert_eq!(out, "a       \n       b");
    }

    #[test]
    fn desugars_membership() {
        let out = rewritten_expr("x \\in {1, 2}");
        assert_eq!(out, "(\\E k1 \\in {1, 2} : x = k1)");
    }

    #[test]
    fn desugars_non_membership() {
        let out = rewritten_expr("x \\notin S");
        assert_eq!(out, "(~(\\E k1 \\in S : x = k1))");
    }

    #[test]
    fn splits_composite_quantifier() {
        let out = rewritten_expr("\\E x, y \\in S, z \\in T : x = z");
        assert_eq!(out, "\\E x \\in S : \\E y \\in S : \\E z \\in T : x = z");
    }

    #[test]
    fn splits_forall_with_tuple_pattern_group() {
        let out = rewritten_expr("\\A <<a, b>> \\in S, c \\in T : a = c");
        assert_eq!(
            out,
            "\\A <<a, b>> \\in S : \\A c \\in T : a = c"
        );
    }

    #[test]
    fn leaves_binder_in_alone() {
        let out = rewritten_expr("\\E x \\in S : x = 1");
        assert_eq!(out, "\\E x \\in S : x = 1");
    }

    #[test]
    fn nested_membership_reaches_fixpoint() {
        // The desugared body introduces `x' = k`, no further \in nodes
        let out = rewritten_expr("x' \\in {x, x + 1}");
        assert_eq!(out, "(\\E k1 \\in {x, x + 1} : x' = k1)");
    }

    #[test]
    fn fresh_names_skip_used_identifiers() {
        let out = rewritten_expr("k1 \\in S");
        assert_eq!(out, "(\\E k2 \\in S : k1 = k2)");
    }

    #[test]
    fn membership_inside_quantifier_body() {
        let out = rewritten_expr("\\E x \\in S : x \\in T");
        assert_eq!(out, "\\E x \\in S : (\\E k1 \\in T : x = k1)");
    }

    #[test]
    fn rewrites_module_bodies() {
        let src = "---- MODULE M ----\nVARIABLE x\nInit == x \\in {1, 2}\n====";
        let out = rewrite_module(src).expect("rewrite failed");
        assert!(out.text.contains("(\\E k1 \\in {1, 2} : x = k1)"));
    }

    #[test]
    fn reports_parse_error_at_original_position() {
        let src = "---- MODULE M ----\nInit == x = \n====";
        let err = rewrite_module(src).unwrap_err();
        assert!(matches!(err, RewriteError::Parse { .. }));
    }

    #[test]
    fn source_map_unwinds_single_edit() {
        let src = "y = 1 /\\ x \\in {1, 2}";
        let out = rewrite_expression(src).expect("rewrite failed");
        // A position before the edit maps to itself
        assert_eq!(out.original_pos(2), LineCol { line: 0, col: 2 });
        // A position after the edit unwinds the length change
        let tail = out.text.len() as u32 - 1;
        let orig = out.original_pos(tail);
        assert_eq!(orig.line, 0);
        assert!(orig.col <= src.len() as u32);
    }

    #[test]
    fn rejects_multi_line_membership() {
        let src = "x \\in {1,\n2}";
        let err = rewrite_expression(src).unwrap_err();
        assert!(matches!(err, RewriteError::MultiLine { .. }));
    }
}

//! Module extraction: from a parsed module to evaluator inputs
//!
//! One walk over the top-level units collects constant and variable
//! declarations, operator and function definitions, and the action list
//! split out of `Next`.

use crate::ast::{Expr, FunctionDef, Module, OperatorDef, Unit};
use crate::span::{Span, Spanned};
use std::collections::HashSet;
use thiserror::Error;

/// Extraction failure
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("duplicate definition of `{name}`")]
    DuplicateDefinition { name: String, span: Span },

    #[error("`{name}` is declared twice")]
    DuplicateDeclaration { name: String, span: Span },
}

/// Everything the evaluator needs from a module
#[derive(Debug, Clone)]
pub struct SpecModule {
    pub name: String,
    /// Declared constant names, in declaration order
    pub constants: Vec<Spanned<String>>,
    /// Declared state variable names, in declaration order
    pub variables: Vec<Spanned<String>>,
    /// Operator definitions, in source order
    pub operators: Vec<OperatorDef>,
    /// Function definitions, in source order
    pub functions: Vec<FunctionDef>,
    /// Body of `Init`, if defined
    pub init: Option<Spanned<Expr>>,
    /// Body of `Next`, if defined
    pub next: Option<Spanned<Expr>>,
    /// The disjuncts of `Next` if its body is a top-level disjunction,
    /// otherwise the single body
    pub actions: Vec<Spanned<Expr>>,
}

/// Walk the module once and collect declarations and definitions
pub fn extract(module: &Module) -> Result<SpecModule, ExtractError> {
    let mut constants = Vec::new();
    let mut variables = Vec::new();
    let mut operators: Vec<OperatorDef> = Vec::new();
    let mut functions: Vec<FunctionDef> = Vec::new();
    let mut declared: HashSet<String> = HashSet::new();
    let mut defined: HashSet<String> = HashSet::new();

    for unit in &module.units {
        match &unit.node {
            Unit::Constants(names) => {
                for name in names {
                    if !declared.insert(name.node.clone()) {
                        return Err(ExtractError::DuplicateDeclaration {
                            name: name.node.clone(),
                            span: name.span,
                        });
                    }
                    constants.push(name.clone());
                }
            }
            Unit::Variables(names) => {
                for name in names {
                    if !declared.insert(name.node.clone()) {
                        return Err(ExtractError::DuplicateDeclaration {
                            name: name.node.clone(),
                            span: name.span,
                        });
                    }
                    variables.push(name.clone());
                }
            }
            Unit::Operator(def) => {
                if !defined.insert(def.name.node.clone()) {
                    return Err(ExtractError::DuplicateDefinition {
                        name: def.name.node.clone(),
                        span: def.name.span,
                    });
                }
                operators.push(def.clone());
            }
            Unit::Function(def) => {
                if !defined.insert(def.name.node.clone()) {
                    return Err(ExtractError::DuplicateDefinition {
                        name: def.name.node.clone(),
                        span: def.name.span,
                    });
                }
                functions.push(def.clone());
            }
            Unit::Separator => {}
        }
    }

    let init = operators
        .iter()
        .find(|d| d.name.node == "Init" && d.params.is_empty())
        .map(|d| d.body.clone());
    let next = operators
        .iter()
        .find(|d| d.name.node == "Next" && d.params.is_empty())
        .map(|d| d.body.clone());
    let actions = next.as_ref().map(split_actions).unwrap_or_default();

    Ok(SpecModule {
        name: module.name.node.clone(),
        constants,
        variables,
        operators,
        functions,
        init,
        next,
        actions,
    })
}

/// Split a `Next` body into actions: the disjuncts of a top-level
/// disjunction (bullet list or binary chain), else the body itself
fn split_actions(body: &Spanned<Expr>) -> Vec<Spanned<Expr>> {
    match &body.node {
        Expr::OrList(items) => items.clone(),
        Expr::Or(_, _) => {
            let mut out = Vec::new();
            flatten_or(body, &mut out);
            out
        }
        _ => vec![body.clone()],
    }
}

fn flatten_or(expr: &Spanned<Expr>, out: &mut Vec<Spanned<Expr>>) {
    match &expr.node {
        Expr::Or(l, r) => {
            flatten_or(l, out);
            flatten_or(r, out);
        }
        _ => out.push(expr.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse_module;

    fn extract_src(src: &str) -> Result<SpecModule, ExtractError> {
        extract(&parse_module(src).expect("parse failed"))
    }

    #[test]
    fn collects_declarations_and_definitions() {
        let spec = extract_src(
            "---- MODULE M ----\nCONSTANT N\nVARIABLES x, y\nInit == x = 0\nNext == x' = x\nInv == x < N\n====",
        )
        .unwrap();
        assert_eq!(spec.constants.len(), 1);
        assert_eq!(spec.variables.len(), 2);
        assert_eq!(spec.operators.len(), 3);
        assert!(spec.init.is_some());
        assert!(spec.next.is_some());
        assert_eq!(spec.actions.len(), 1);
    }

    #[test]
    fn splits_bullet_disjunction_into_actions() {
        let spec = extract_src(
            "---- MODULE M ----\nVARIABLE x\nNext == \\/ x' = 1\n        \\/ x' = 2\n        \\/ x' = 3\n====",
        )
        .unwrap();
        assert_eq!(spec.actions.len(), 3);
    }

    #[test]
    fn splits_inline_disjunction_chain() {
        let spec =
            extract_src("---- MODULE M ----\nVARIABLE x\nNext == x' = 1 \\/ x' = 2\n====").unwrap();
        assert_eq!(spec.actions.len(), 2);
    }

    #[test]
    fn conjunction_body_is_a_single_action() {
        let spec = extract_src(
            "---- MODULE M ----\nVARIABLE x\nNext == /\\ x' = x\n        /\\ x > 0\n====",
        )
        .unwrap();
        assert_eq!(spec.actions.len(), 1);
    }

    #[test]
    fn rejects_duplicate_next() {
        let err = extract_src(
            "---- MODULE M ----\nVARIABLE x\nNext == x' = 1\nNext == x' = 2\n====",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateDefinition { name, .. } if name == "Next"));
    }

    #[test]
    fn rejects_duplicate_variable() {
        let err =
            extract_src("---- MODULE M ----\nVARIABLE x\nVARIABLE x\n====").unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateDeclaration { name, .. } if name == "x"));
    }

    #[test]
    fn collects_function_definitions() {
        let spec =
            extract_src("---- MODULE M ----\nsq[i \\in 1..3] == i * i\n====").unwrap();
        assert_eq!(spec.functions.len(), 1);
        assert_eq!(spec.functions[0].name.node, "sq");
    }
}

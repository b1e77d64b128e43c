//! Evaluation errors
//!
//! Errors abort the current evaluation branch and propagate to the
//! enumerator; no partial successor list survives an error. Spans point
//! into the rewritten source; the facade maps them back to original
//! positions for display.

use crate::value::Value;
use thiserror::Error;
use tlai_core::Span;

/// Evaluation error
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// Identifier with no binding in scope
    #[error("unbound identifier: {name}")]
    UnboundIdentifier { name: String, span: Option<Span> },

    /// Type mismatch in an operation
    #[error("type error: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
        span: Option<Span>,
    },

    /// Function applied to an argument outside its domain
    #[error("function application error: {arg} not in domain")]
    DomainError { arg: String, span: Option<Span> },

    /// CHOOSE found no witness
    #[error("CHOOSE failed: no value satisfies predicate")]
    NoWitness { span: Option<Span> },

    /// CASE with no true guard and no OTHER
    #[error("CASE is not exhaustive: no guard is true")]
    NonexhaustiveCase { span: Option<Span> },

    /// Operator applied with the wrong number of arguments
    #[error("arity mismatch: {op} expects {expected} arguments, got {got}")]
    ArityMismatch {
        op: String,
        expected: usize,
        got: usize,
        span: Option<Span>,
    },

    /// Modulo with a non-positive divisor
    #[error("modulo by non-positive divisor")]
    ModuloByZero { span: Option<Span> },

    /// Head or Tail of the empty sequence
    #[error("{op} applied to the empty sequence")]
    EmptySeq {
        op: &'static str,
        span: Option<Span>,
    },

    /// A set construction too large to enumerate
    #[error("set too large to enumerate")]
    SetTooLarge { span: Option<Span> },

    /// Init left a declared variable without a value
    #[error("Init left variable {name} unassigned")]
    UnassignedVariable { name: String, span: Option<Span> },

    /// No definition to evaluate (Init/Next missing)
    #[error("no {name} definition in module")]
    MissingDefinition { name: String },

    /// Internal invariant broken; should be unreachable
    #[error("internal error: {message}")]
    Internal {
        message: String,
        span: Option<Span>,
    },
}

impl EvalError {
    pub fn type_error(expected: &'static str, got: &Value, span: Option<Span>) -> Self {
        EvalError::TypeMismatch {
            expected,
            got: got.type_name(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>, span: Option<Span>) -> Self {
        EvalError::Internal {
            message: message.into(),
            span,
        }
    }

    /// The span of the failing node, if known
    pub fn span(&self) -> Option<Span> {
        match self {
            EvalError::UnboundIdentifier { span, .. } => *span,
            EvalError::TypeMismatch { span, .. } => *span,
            EvalError::DomainError { span, .. } => *span,
            EvalError::NoWitness { span } => *span,
            EvalError::NonexhaustiveCase { span } => *span,
            EvalError::ArityMismatch { span, .. } => *span,
            EvalError::ModuloByZero { span } => *span,
            EvalError::EmptySeq { span, .. } => *span,
            EvalError::SetTooLarge { span } => *span,
            EvalError::UnassignedVariable { span, .. } => *span,
            EvalError::MissingDefinition { .. } => None,
            EvalError::Internal { span, .. } => *span,
        }
    }

    /// Fill in a span if the error was raised without one (value-layer
    /// errors carry no positions)
    pub fn with_span(mut self, new_span: Span) -> Self {
        let slot = match &mut self {
            EvalError::UnboundIdentifier { span, .. } => span,
            EvalError::TypeMismatch { span, .. } => span,
            EvalError::DomainError { span, .. } => span,
            EvalError::NoWitness { span } => span,
            EvalError::NonexhaustiveCase { span } => span,
            EvalError::ArityMismatch { span, .. } => span,
            EvalError::ModuloByZero { span } => span,
            EvalError::EmptySeq { span, .. } => span,
            EvalError::SetTooLarge { span } => span,
            EvalError::UnassignedVariable { span, .. } => span,
            EvalError::MissingDefinition { .. } => return self,
            EvalError::Internal { span, .. } => span,
        };
        if slot.is_none() {
            *slot = Some(new_span);
        }
        self
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn snapshot_type_error() {
        let err = EvalError::type_error("integer", &Value::set([Value::int(1)]), None);
        assert_snapshot!(err.to_string(), @"type error: expected integer, got set");
    }

    #[test]
    fn snapshot_unbound_identifier() {
        let err = EvalError::UnboundIdentifier {
            name: "clk".to_string(),
            span: None,
        };
        assert_snapshot!(err.to_string(), @"unbound identifier: clk");
    }

    #[test]
    fn snapshot_domain_error() {
        let err = EvalError::DomainError {
            arg: "42".to_string(),
            span: None,
        };
        assert_snapshot!(err.to_string(), @"function application error: 42 not in domain");
    }

    #[test]
    fn snapshot_no_witness() {
        let err = EvalError::NoWitness { span: None };
        assert_snapshot!(err.to_string(), @"CHOOSE failed: no value satisfies predicate");
    }

    #[test]
    fn with_span_fills_only_missing() {
        let span = Span::new(3, 7);
        let err = EvalError::NoWitness { span: None }.with_span(span);
        assert_eq!(err.span(), Some(span));

        let other = Span::new(9, 12);
        let kept = err.with_span(other);
        assert_eq!(kept.span(), Some(span));
    }
}

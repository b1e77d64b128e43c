//! Front end for the TLAI interpreter
//!
//! This crate takes TLA+ source text through the front half of the
//! pipeline: lexing, parsing, source-to-source normalization, and module
//! extraction. The output — a [`module::SpecModule`] over a normalized
//! AST — is what `tlai-eval` evaluates.

pub mod ast;
pub mod diagnostic;
pub mod module;
pub mod rewrite;
pub mod span;
pub mod syntax;

pub use ast::{Expr, Module};
pub use module::{extract, SpecModule};
pub use rewrite::{rewrite_expression, rewrite_module, RewriteError, Rewritten};
pub use span::{LineCol, LineIndex, Span, Spanned};
pub use syntax::parser::{parse_expression, parse_module, ParseError};

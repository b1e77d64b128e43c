//! Error rendering using ariadne
//!
//! Converts front-end errors into ariadne Reports against the original
//! source text.

use crate::rewrite::RewriteError;
use crate::span::LineIndex;
use crate::syntax::parser::ParseError;
use ariadne::{Color, Label, Report, ReportKind, Source};

/// A renderable diagnostic: message plus a byte range in the original
/// source
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub start: usize,
    pub end: usize,
    pub label: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, start: usize, end: usize) -> Self {
        Diagnostic {
            message: message.into(),
            start,
            end,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Build a diagnostic from a parse error against the same text the
    /// parser saw
    pub fn from_parse_error(err: &ParseError) -> Self {
        Diagnostic::new(
            err.message.clone(),
            err.span.start as usize,
            err.span.end.max(err.span.start + 1) as usize,
        )
    }

    /// Build a diagnostic from a rewrite error. Rewrite errors carry
    /// original line/column positions; this converts them back to byte
    /// offsets in the original source.
    pub fn from_rewrite_error(err: &RewriteError, source: &str) -> Self {
        let index = LineIndex::new(source);
        let (message, pos) = match err {
            RewriteError::Parse { message, pos } => (message.clone(), Some(*pos)),
            RewriteError::MultiLine { pos } => (
                "this expression cannot be rewritten across lines".to_string(),
                Some(*pos),
            ),
            RewriteError::FixpointOverflow { .. } => (err.to_string(), None),
        };
        let start = pos
            .map(|p| (index.line_start(p.line) + p.col) as usize)
            .unwrap_or(0);
        Diagnostic::new(message, start, start + 1)
    }

    /// Render to a string, without colors (for tests and logs)
    pub fn render(&self, path: &str, source: &str) -> String {
        let mut out = Vec::new();
        self.report(path)
            .write((path.to_string(), Source::from(source.to_string())), &mut out)
            .expect("report rendering failed");
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Render to stderr with colors
    pub fn eprint(&self, path: &str, source: &str) {
        self.report(path)
            .eprint((path.to_string(), Source::from(source.to_string())))
            .expect("report rendering failed");
    }

    fn report(&self, path: &str) -> Report<'static, (String, std::ops::Range<usize>)> {
        let span = (path.to_string(), self.start..self.end.max(self.start + 1));
        let mut label = Label::new(span.clone()).with_color(Color::Red);
        if let Some(text) = &self.label {
            label = label.with_message(text.clone());
        }
        Report::build(ReportKind::Error, span.0.clone(), self.start)
            .with_message(self.message.clone())
            .with_label(label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_position() {
        let source = "---- MODULE M ----\nInit == x =\n====";
        let diag = Diagnostic::new("expected an expression", 30, 34);
        let rendered = diag.render("M.tla", source);
        assert!(rendered.contains("expected an expression"));
        assert!(rendered.contains("M.tla"));
    }
}

//! Diagnostic codes and the error/warning sink.
//!
//! Semantic errors are non-fatal: the compiler reports them through a
//! [`DiagnosticSink`] and substitutes a plausible value so parsing can
//! continue. Compilation as a whole still fails if any error (as opposed
//! to a warning) was reported.

use mex_base::Span;
use std::fmt;

/// The closed set of diagnostic codes the front end can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Duplicate,
    Undeclared,
    TypeMismatch,
    InvalidRange,
    NotAFunction,
    NotAnLvalue,
    BadSubscript,
    WrongArgCount,
    DupLabel,
    RetType,
    UndefinedStruct,
    WarnMeaninglessExpr,
}

impl ErrorCode {
    /// `true` for diagnostics that do not cause compilation to fail.
    pub fn is_warning(self) -> bool {
        matches!(self, ErrorCode::WarnMeaninglessExpr)
    }

    fn template(self) -> &'static str {
        match self {
            ErrorCode::Duplicate => "'{0}' is already declared in this scope",
            ErrorCode::Undeclared => "'{0}' is not declared",
            ErrorCode::TypeMismatch => "cannot convert {0} to {1}",
            ErrorCode::InvalidRange => "invalid array range {0}..{1}",
            ErrorCode::NotAFunction => "'{0}' is not a function",
            ErrorCode::NotAnLvalue => "expression is not assignable",
            ErrorCode::BadSubscript => "subscript {0} is out of range {1}..{2}",
            ErrorCode::WrongArgCount => "expected {0} argument(s), found {1}",
            ErrorCode::DupLabel => "label '{0}' is already defined",
            ErrorCode::RetType => "return type mismatch: expected {0}",
            ErrorCode::UndefinedStruct => "struct '{0}' is declared but not defined",
            ErrorCode::WarnMeaninglessExpr => "expression statement has no effect",
        }
    }
}

/// Severity axis, independent of the error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single reported diagnostic: code, rendered message, and source span.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}: {} ({}..{})", self.message, self.span.start, self.span.end)
    }
}

/// Renders a diagnostic template by substituting `{0}`, `{1}`, ... with `args`.
fn render(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '{' {
            if let Some(end) = template[i..].find('}') {
                if let Ok(idx) = template[i + 1..i + end].parse::<usize>() {
                    if let Some(arg) = args.get(idx) {
                        out.push_str(&arg.to_string());
                        for _ in 0..end {
                            chars.next();
                        }
                        continue;
                    }
                }
            }
        }
        out.push(c);
    }
    out
}

/// The error sink external interface: `error(code, args...)`,
/// `warn(code, args...)`.
pub trait DiagnosticSink {
    fn report(&mut self, code: ErrorCode, span: Span, args: &[&dyn fmt::Display]);

    fn has_errors(&self) -> bool;
}

/// Default `Vec`-backed sink used by the CLI and by tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, code: ErrorCode, span: Span, args: &[&dyn fmt::Display]) {
        let severity = if code.is_warning() { Severity::Warning } else { Severity::Error };
        let message = render(code.template(), args);
        self.diagnostics.push(Diagnostic { code, severity, message, span });
    }

    fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_error_and_tracks_has_errors() {
        let mut sink = CollectingSink::new();
        assert!(!sink.has_errors());
        sink.report(ErrorCode::Undeclared, Span::new(0, 3), &[&"x"]);
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics[0].message, "'x' is not declared");
    }

    #[test]
    fn warning_does_not_count_as_error() {
        let mut sink = CollectingSink::new();
        sink.report(ErrorCode::WarnMeaninglessExpr, Span::new(0, 1), &[]);
        assert!(!sink.has_errors());
        assert_eq!(sink.diagnostics[0].severity, Severity::Warning);
    }
}

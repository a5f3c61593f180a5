//! Error types with source location tracking.
//!
//! Every error in the mex front end carries a [`Span`] indicating where in
//! the source text it occurred.

use crate::span::Span;
use std::fmt;

/// An error annotated with its source location.
#[derive(Debug, Clone)]
pub struct SpannedError {
    pub message: String,
    pub span: Span,
}

impl SpannedError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for SpannedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for SpannedError {}

/// Alias for `std::result::Result<T, SpannedError>`.
pub type Result<T> = std::result::Result<T, SpannedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanned_error_display() {
        let err = SpannedError::new("bad range", Span::new(5, 10));
        let display = format!("{}", err);
        assert!(display.contains("bad range"));
        assert!(display.contains("5..10"));
    }
}

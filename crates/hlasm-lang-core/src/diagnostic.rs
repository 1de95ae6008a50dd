//! Diagnostics for the conditional-assembly runtime.
//!
//! The macro runtime never throws for user errors: a bad subscript, a
//! malformed self-defining term, or an overflowing product produces a
//! [`Diagnostic`] attached to a still-well-typed value, and evaluation of
//! the surrounding statement continues. Diagnostics accumulate in a
//! [`DiagnosticSink`] that callers thread through evaluation explicitly.
//!
//! Error codes are a compatibility surface: downstream IDE clients match on
//! `code` verbatim, so codes are fixed and never rephrased.

use std::fmt;

use crate::span::Span;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Error — the produced value is a default/poisoned stand-in.
    Error,
    /// Warning — processing continues with the produced value.
    Warning,
    /// Informational.
    Info,
}

/// A diagnostic message with a fixed code and a source location.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Severity of the diagnostic.
    pub severity: Severity,
    /// Fixed error code (e.g. "E032", "EC05", "M010").
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Source location where the issue was found.
    pub span: Span,
    /// Optional suggestion for how to fix the issue.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            span,
            suggestion: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            span,
            suggestion: None,
        }
    }

    /// Create a new info diagnostic.
    pub fn info(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Info,
            code: code.into(),
            message: message.into(),
            span,
            suggestion: None,
        }
    }

    /// Add a suggestion to this diagnostic.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Replace a dummy span with `span`; a real span is kept.
    ///
    /// Poison diagnostics created deep inside the expression engine may not
    /// know their operand's location; the context manager re-ranges them to
    /// the call site before reporting.
    pub fn ranged_at(mut self, span: Span) -> Self {
        if self.span.is_dummy() {
            self.span = span;
        }
        self
    }

    /// Returns `true` if this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// A consumer of diagnostics.
///
/// Evaluation paths take `&mut dyn DiagnosticSink` instead of inheriting a
/// shared mutable collector, so each call site decides where reports land —
/// the analysis run's list, a test buffer, or a drain.
pub trait DiagnosticSink {
    /// Accept one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// A sink that drops everything; for probing evaluations whose diagnostics
/// are intentionally discarded (e.g. lookahead).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}
